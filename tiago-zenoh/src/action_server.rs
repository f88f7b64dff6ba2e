use crate::error::Result;
use crate::protocol::{ActionKeys, ActionReply};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tiago_controller::action_client::ActionError;
use tiago_controller::simulated_controller::SimulatedController;
use tiago_controller::trajectory::{FollowJointTrajectoryGoal, GoalId};
use zenoh::prelude::r#async::*;
use zenoh::queryable::Query;

fn decode_request<T: DeserializeOwned>(query: &Query) -> std::result::Result<T, ActionError> {
    let value = query
        .value()
        .ok_or_else(|| ActionError::Transport("request carried no payload".to_owned()))?;
    Ok(serde_json::from_slice(&value.payload.contiguous())?)
}

async fn reply<T: Serialize>(query: &Query, payload: &T) -> Result<()> {
    let json = serde_json::to_string(payload)?;
    let sample = Sample::new(query.key_expr().clone(), json);
    query.reply(Ok(sample)).res().await?;
    Ok(())
}

/// A client that went away must not take the server down with it
async fn reply_or_log<T: Serialize>(query: &Query, payload: &T) {
    if let Err(error) = reply(query, payload).await {
        tracing::error!("Failed to reply on {}: {}", query.key_expr(), error);
    }
}

/// Serves a simulated controller as a FollowJointTrajectory action.
pub struct ZenohActionServer {
    session: Arc<Session>,
    controller: Arc<SimulatedController>,
    keys: ActionKeys,
}

impl ZenohActionServer {
    pub fn new(session: Arc<Session>, controller: Arc<SimulatedController>, prefix: &str) -> Self {
        let keys = ActionKeys::new(prefix, controller.action_name());
        ZenohActionServer {
            session,
            controller,
            keys,
        }
    }

    pub fn keys(&self) -> &ActionKeys {
        &self.keys
    }

    /// Answer requests until the session goes away
    pub async fn run(&self) -> Result<()> {
        let server = self
            .session
            .declare_queryable(self.keys.server.as_str())
            .res()
            .await?;
        let send_goal = self
            .session
            .declare_queryable(self.keys.send_goal.as_str())
            .res()
            .await?;
        let get_result = self
            .session
            .declare_queryable(self.keys.get_result.as_str())
            .res()
            .await?;
        let cancel_goal = self
            .session
            .declare_queryable(self.keys.cancel_goal.as_str())
            .res()
            .await?;
        tracing::info!("Serving {} on {}", self.controller.action_name(), self.keys.server);

        loop {
            tokio::select! {
                query = server.recv_async() => {
                    let Ok(query) = query else { break };
                    reply_or_log(&query, &self.controller.action_name()).await;
                }
                query = send_goal.recv_async() => {
                    let Ok(query) = query else { break };
                    let response = match decode_request::<FollowJointTrajectoryGoal>(&query) {
                        Ok(goal) => Ok(self.controller.handle_goal(goal).await),
                        Err(error) => Err(error),
                    };
                    if let Ok(response) = &response {
                        tracing::debug!(
                            "Goal {} accepted: {}",
                            response.goal_id,
                            response.accepted
                        );
                    }
                    reply_or_log(&query, &ActionReply::from_result(response)).await;
                }
                query = get_result.recv_async() => {
                    let Ok(query) = query else { break };
                    // results block until the goal finishes
                    let controller = Arc::clone(&self.controller);
                    tokio::spawn(async move {
                        let result = match decode_request::<GoalId>(&query) {
                            Ok(goal_id) => controller.result(goal_id).await,
                            Err(error) => Err(error),
                        };
                        reply_or_log(&query, &ActionReply::from_result(result)).await;
                    });
                }
                query = cancel_goal.recv_async() => {
                    let Ok(query) = query else { break };
                    let outcome = match decode_request::<GoalId>(&query) {
                        Ok(goal_id) => self.controller.cancel(goal_id).await,
                        Err(error) => Err(error),
                    };
                    reply_or_log(&query, &ActionReply::from_result(outcome)).await;
                }
            }
        }
        tracing::warn!("Queryables for {} closed", self.controller.action_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_client::ZenohActionClient;
    use crate::transport::local_session;
    use std::time::Duration;
    use tiago_controller::action_client::TrajectoryActionClient;
    use tiago_controller::teleop_config::TeleopConfig;
    use tiago_controller::trajectory::{error_code, GoalStatus};

    fn torso_goal(position: f64, time_from_start: Duration) -> FollowJointTrajectoryGoal {
        FollowJointTrajectoryGoal::single_point(
            TeleopConfig::included().torso.joint_names(),
            vec![position],
            time_from_start,
        )
    }

    /// Torso controller served and a client connected to it on one session
    async fn torso_action(
        prefix: &str,
        time_scale: f64,
    ) -> (Arc<SimulatedController>, ZenohActionClient) {
        let session = local_session().await;
        let controller = Arc::new(SimulatedController::new(
            TeleopConfig::included().torso,
            time_scale,
        ));
        let server = ZenohActionServer::new(Arc::clone(&session), Arc::clone(&controller), prefix);
        tokio::spawn(async move { server.run().await });
        let client = ZenohActionClient::new(session, prefix, controller.action_name());
        client
            .wait_for_server(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        (controller, client)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn goal_executes_over_zenoh() {
        let (controller, client) = torso_action("test_goal", 0.0).await;
        let response = client
            .send_goal(torso_goal(0.3, Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(response.accepted);
        let result = client.get_result(response.goal_id).await.unwrap();
        assert!(result.is_success());
        assert_eq!(controller.positions().await, vec![0.3]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejection_travels_back() {
        let (_, client) = torso_action("test_reject", 0.0).await;
        let response = client
            .send_goal(torso_goal(2.0, Duration::ZERO))
            .await
            .unwrap();
        assert!(!response.accepted);
        let result = client.get_result(response.goal_id).await.unwrap();
        assert_eq!(result.status, GoalStatus::Aborted);
        assert_eq!(result.error_code, error_code::INVALID_GOAL);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_over_zenoh() {
        let (controller, client) = torso_action("test_cancel", 1.0).await;
        let response = client
            .send_goal(torso_goal(0.3, Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(response.accepted);
        client.cancel_goal(response.goal_id).await.unwrap();
        let result = client.get_result(response.goal_id).await.unwrap();
        assert_eq!(result.status, GoalStatus::Canceled);
        assert_eq!(controller.positions().await, vec![0.15]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_goal_is_reported() {
        let (_, client) = torso_action("test_unknown", 0.0).await;
        let goal_id = GoalId::random();
        assert!(matches!(
            client.cancel_goal(goal_id).await,
            Err(ActionError::UnknownGoal(id)) if id == goal_id
        ));
        assert!(matches!(
            client.get_result(goal_id).await,
            Err(ActionError::UnknownGoal(id)) if id == goal_id
        ));
        // server keeps answering after error replies
        let response = client
            .send_goal(torso_goal(0.2, Duration::ZERO))
            .await
            .unwrap();
        assert!(response.accepted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_server_times_out() {
        let session = local_session().await;
        let client = ZenohActionClient::new(
            session,
            "test_missing",
            "/arm_controller/follow_joint_trajectory",
        );
        let result = client
            .wait_for_server(Some(Duration::from_millis(100)))
            .await;
        assert!(matches!(result, Err(ActionError::ServerUnavailable(_))));
    }
}
