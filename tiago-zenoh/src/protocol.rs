//! Key expressions and reply envelope of the action protocol.
//!
//! Every action exposes four queryables under
//! `<prefix>/<action>/{server,send_goal,get_result,cancel_goal}`.
//! Requests and replies are JSON.

use serde::{Deserialize, Serialize};
use tiago_controller::action_client::ActionError;
use tiago_controller::trajectory::GoalId;

pub const DEFAULT_PREFIX: &str = "tiago";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionKeys {
    pub server: String,
    pub send_goal: String,
    pub get_result: String,
    pub cancel_goal: String,
}

impl ActionKeys {
    pub fn new(prefix: &str, action: &str) -> Self {
        let base = topic_key(prefix, action);
        ActionKeys {
            server: format!("{}/server", base),
            send_goal: format!("{}/send_goal", base),
            get_result: format!("{}/get_result", base),
            cancel_goal: format!("{}/cancel_goal", base),
        }
    }
}

/// Join a ROS style name onto the prefix, zenoh keys can't start or end with `/`
pub fn topic_key(prefix: &str, topic: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let topic = topic.trim_matches('/');
    if prefix.is_empty() {
        topic.to_owned()
    } else {
        format!("{}/{}", prefix, topic)
    }
}

/// Envelope every action server reply travels in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionReply<T> {
    Ok(T),
    UnknownGoal(GoalId),
    Failed(String),
}

impl<T> ActionReply<T> {
    pub fn from_result(result: Result<T, ActionError>) -> Self {
        match result {
            Ok(value) => ActionReply::Ok(value),
            Err(ActionError::UnknownGoal(goal_id)) => ActionReply::UnknownGoal(goal_id),
            Err(error) => ActionReply::Failed(error.to_string()),
        }
    }

    pub fn into_result(self) -> Result<T, ActionError> {
        match self {
            ActionReply::Ok(value) => Ok(value),
            ActionReply::UnknownGoal(goal_id) => Err(ActionError::UnknownGoal(goal_id)),
            ActionReply::Failed(message) => Err(ActionError::Transport(message)),
        }
    }
}
