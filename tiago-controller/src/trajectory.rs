//! FollowJointTrajectory action messages.
//!
//! Field names follow `control_msgs/action/FollowJointTrajectory` so the JSON
//! encoding can be mapped onto ROS 2 by a bridge.

use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrajectoryDuration {
    pub sec: i32,
    pub nanosec: u32,
}

impl From<Duration> for TrajectoryDuration {
    fn from(duration: Duration) -> Self {
        TrajectoryDuration {
            sec: duration.as_secs().min(i32::MAX as u64) as i32,
            nanosec: duration.subsec_nanos(),
        }
    }
}

impl From<TrajectoryDuration> for Duration {
    fn from(duration: TrajectoryDuration) -> Self {
        Duration::new(duration.sec.max(0) as u64, duration.nanosec)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointTrajectoryPoint {
    pub positions: Vec<f64>,
    pub time_from_start: TrajectoryDuration,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointTrajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<JointTrajectoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FollowJointTrajectoryGoal {
    pub trajectory: JointTrajectory,
}

impl FollowJointTrajectoryGoal {
    /// Goal with a single point reached after `time_from_start`
    pub fn single_point(
        joint_names: Vec<String>,
        positions: Vec<f64>,
        time_from_start: Duration,
    ) -> Self {
        FollowJointTrajectoryGoal {
            trajectory: JointTrajectory {
                joint_names,
                points: vec![JointTrajectoryPoint {
                    positions,
                    time_from_start: time_from_start.into(),
                }],
            },
        }
    }

    pub fn final_point(&self) -> Option<&JointTrajectoryPoint> {
        self.trajectory.points.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(pub Uuid);

impl GoalId {
    pub fn random() -> Self {
        GoalId(Uuid::new_v4())
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalResponse {
    pub goal_id: GoalId,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Accepted,
    Executing,
    Succeeded,
    Canceled,
    Aborted,
}

/// FollowJointTrajectory error codes
pub mod error_code {
    pub const SUCCESSFUL: i32 = 0;
    pub const INVALID_GOAL: i32 = -1;
    pub const INVALID_JOINTS: i32 = -2;
    pub const OLD_HEADER_TIMESTAMP: i32 = -3;
    pub const PATH_TOLERANCE_VIOLATED: i32 = -4;
    pub const GOAL_TOLERANCE_VIOLATED: i32 = -5;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryResult {
    pub status: GoalStatus,
    pub error_code: i32,
    pub error_string: String,
}

impl TrajectoryResult {
    pub fn succeeded() -> Self {
        TrajectoryResult {
            status: GoalStatus::Succeeded,
            error_code: error_code::SUCCESSFUL,
            error_string: String::new(),
        }
    }

    pub fn canceled(reason: &str) -> Self {
        TrajectoryResult {
            status: GoalStatus::Canceled,
            error_code: error_code::SUCCESSFUL,
            error_string: reason.to_owned(),
        }
    }

    pub fn aborted(error_code: i32, reason: &str) -> Self {
        TrajectoryResult {
            status: GoalStatus::Aborted,
            error_code,
            error_string: reason.to_owned(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == GoalStatus::Succeeded && self.error_code == error_code::SUCCESSFUL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_conversion() {
        let duration = TrajectoryDuration::from(Duration::from_millis(1500));
        assert_eq!(
            duration,
            TrajectoryDuration {
                sec: 1,
                nanosec: 500_000_000
            }
        );
        assert_eq!(Duration::from(duration), Duration::from_millis(1500));
    }

    #[test]
    fn negative_duration_saturates() {
        let duration = TrajectoryDuration { sec: -3, nanosec: 0 };
        assert_eq!(Duration::from(duration), Duration::ZERO);
    }

    #[test]
    fn goal_json_uses_ros_field_names() {
        let goal = FollowJointTrajectoryGoal::single_point(
            vec!["torso_lift_joint".to_owned()],
            vec![0.15],
            Duration::from_secs(1),
        );
        let json = serde_json::to_value(&goal).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "trajectory": {
                    "joint_names": ["torso_lift_joint"],
                    "points": [
                        { "positions": [0.15], "time_from_start": { "sec": 1, "nanosec": 0 } }
                    ]
                }
            })
        );
    }

    #[test]
    fn canceled_is_not_success() {
        assert!(TrajectoryResult::succeeded().is_success());
        assert!(!TrajectoryResult::canceled("preempted").is_success());
        assert!(!TrajectoryResult::aborted(error_code::INVALID_GOAL, "").is_success());
    }
}
