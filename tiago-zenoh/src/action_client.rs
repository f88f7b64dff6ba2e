use crate::protocol::{ActionKeys, ActionReply};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tiago_controller::action_client::{ActionError, Result, TrajectoryActionClient};
use tiago_controller::keys::ControllerGroup;
use tiago_controller::teleop_config::TeleopConfig;
use tiago_controller::trajectory::{
    FollowJointTrajectoryGoal, GoalId, GoalResponse, TrajectoryResult,
};
use zenoh::prelude::r#async::*;

const PING_TIMEOUT: Duration = Duration::from_millis(500);
const PING_RETRY: Duration = Duration::from_millis(200);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Results only arrive once the goal finished executing
const RESULT_TIMEOUT: Duration = Duration::from_secs(120);

fn transport_error(error: zenoh::Error) -> ActionError {
    ActionError::Transport(error.to_string())
}

/// FollowJointTrajectory client over zenoh queries
pub struct ZenohActionClient {
    session: Arc<Session>,
    action_name: String,
    keys: ActionKeys,
}

impl ZenohActionClient {
    pub fn new(session: Arc<Session>, prefix: &str, action_name: &str) -> Self {
        ZenohActionClient {
            session,
            action_name: action_name.to_owned(),
            keys: ActionKeys::new(prefix, action_name),
        }
    }

    /// First successful reply, `None` if nobody answered in time
    async fn query<Request: Serialize, Reply: DeserializeOwned>(
        &self,
        key: &str,
        request: &Request,
        timeout: Duration,
    ) -> Result<Option<Reply>> {
        let payload = serde_json::to_string(request)?;
        let replies = self
            .session
            .get(key)
            .with_value(payload)
            .timeout(timeout)
            .res()
            .await
            .map_err(transport_error)?;
        while let Ok(reply) = replies.recv_async().await {
            match reply.sample {
                Ok(sample) => {
                    let reply = serde_json::from_slice(&sample.value.payload.contiguous())?;
                    return Ok(Some(reply));
                }
                Err(error) => tracing::warn!("Error reply on {}: {:?}", key, error),
            }
        }
        Ok(None)
    }

    async fn request<Request: Serialize, Reply: DeserializeOwned>(
        &self,
        key: &str,
        request: &Request,
        timeout: Duration,
    ) -> Result<Reply> {
        self.query::<Request, ActionReply<Reply>>(key, request, timeout)
            .await?
            .ok_or_else(|| ActionError::ServerUnavailable(self.action_name.clone()))?
            .into_result()
    }
}

#[async_trait]
impl TrajectoryActionClient for ZenohActionClient {
    fn action_name(&self) -> &str {
        &self.action_name
    }

    async fn wait_for_server(&self, timeout: Option<Duration>) -> Result<()> {
        let start = Instant::now();
        loop {
            let reply: Option<String> = self.query(&self.keys.server, &(), PING_TIMEOUT).await?;
            if reply.is_some() {
                return Ok(());
            }
            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    return Err(ActionError::ServerUnavailable(self.action_name.clone()));
                }
            }
            tracing::debug!("Waiting for {}", self.action_name);
            tokio::time::sleep(PING_RETRY).await;
        }
    }

    async fn send_goal(&self, goal: FollowJointTrajectoryGoal) -> Result<GoalResponse> {
        self.request(&self.keys.send_goal, &goal, REQUEST_TIMEOUT)
            .await
    }

    async fn get_result(&self, goal_id: GoalId) -> Result<TrajectoryResult> {
        self.request(&self.keys.get_result, &goal_id, RESULT_TIMEOUT)
            .await
    }

    async fn cancel_goal(&self, goal_id: GoalId) -> Result<()> {
        self.request(&self.keys.cancel_goal, &goal_id, REQUEST_TIMEOUT)
            .await
    }
}

/// One zenoh client for every controller in the config
pub fn zenoh_clients(
    session: Arc<Session>,
    config: &TeleopConfig,
    prefix: &str,
) -> HashMap<ControllerGroup, Arc<dyn TrajectoryActionClient>> {
    ControllerGroup::ALL
        .iter()
        .map(|group| {
            let client: Arc<dyn TrajectoryActionClient> = Arc::new(ZenohActionClient::new(
                Arc::clone(&session),
                prefix,
                &config.controller(*group).action,
            ));
            (*group, client)
        })
        .collect()
}
