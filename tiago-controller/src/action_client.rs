use crate::keys::ControllerGroup;
use crate::simulated_controller::SimulatedController;
use crate::teleop_config::TeleopConfig;
use crate::trajectory::{FollowJointTrajectoryGoal, GoalId, GoalResponse, TrajectoryResult};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("action server {0} is not available")]
    ServerUnavailable(String),
    #[error("goal {0} is not known to the server")]
    UnknownGoal(GoalId),
    #[error("goal {0} ended without a result")]
    GoalLost(GoalId),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("error while encoding action message")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActionError>;

/// Client side of a FollowJointTrajectory action
#[async_trait]
pub trait TrajectoryActionClient: Send + Sync {
    fn action_name(&self) -> &str;
    /// Block until the server answers.
    /// `None` waits forever
    async fn wait_for_server(&self, timeout: Option<Duration>) -> Result<()>;
    async fn send_goal(&self, goal: FollowJointTrajectoryGoal) -> Result<GoalResponse>;
    /// Resolves once the goal reached a terminal state
    async fn get_result(&self, goal_id: GoalId) -> Result<TrajectoryResult>;
    async fn cancel_goal(&self, goal_id: GoalId) -> Result<()>;
}

/// In process client talking directly to a simulated controller.
///
/// A client without a controller behaves like a server that never comes up.
pub struct SimulatedActionClient {
    action_name: String,
    controller: Option<Arc<SimulatedController>>,
}

impl SimulatedActionClient {
    pub fn new(controller: Arc<SimulatedController>) -> Self {
        SimulatedActionClient {
            action_name: controller.action_name().to_owned(),
            controller: Some(controller),
        }
    }

    pub fn offline(action_name: &str) -> Self {
        SimulatedActionClient {
            action_name: action_name.to_owned(),
            controller: None,
        }
    }

    fn controller(&self) -> Result<&SimulatedController> {
        self.controller
            .as_deref()
            .ok_or_else(|| ActionError::ServerUnavailable(self.action_name.clone()))
    }
}

#[async_trait]
impl TrajectoryActionClient for SimulatedActionClient {
    fn action_name(&self) -> &str {
        &self.action_name
    }

    async fn wait_for_server(&self, timeout: Option<Duration>) -> Result<()> {
        if self.controller.is_some() {
            return Ok(());
        }
        match timeout {
            Some(timeout) => {
                tokio::time::sleep(timeout).await;
                Err(ActionError::ServerUnavailable(self.action_name.clone()))
            }
            None => std::future::pending().await,
        }
    }

    async fn send_goal(&self, goal: FollowJointTrajectoryGoal) -> Result<GoalResponse> {
        Ok(self.controller()?.handle_goal(goal).await)
    }

    async fn get_result(&self, goal_id: GoalId) -> Result<TrajectoryResult> {
        self.controller()?.result(goal_id).await
    }

    async fn cancel_goal(&self, goal_id: GoalId) -> Result<()> {
        self.controller()?.cancel(goal_id).await
    }
}

/// One in process simulated client for every controller in the config
pub fn simulated_clients(
    config: &TeleopConfig,
    time_scale: f64,
) -> HashMap<ControllerGroup, Arc<dyn TrajectoryActionClient>> {
    ControllerGroup::ALL
        .iter()
        .map(|group| {
            let controller = Arc::new(SimulatedController::new(
                config.controller(*group).clone(),
                time_scale,
            ));
            let client: Arc<dyn TrajectoryActionClient> =
                Arc::new(SimulatedActionClient::new(controller));
            (*group, client)
        })
        .collect()
}
