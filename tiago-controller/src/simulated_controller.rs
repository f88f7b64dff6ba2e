use crate::action_client::{ActionError, Result};
use crate::teleop_config::ControllerConfig;
use crate::trajectory::{
    error_code, FollowJointTrajectoryGoal, GoalId, GoalResponse, TrajectoryResult,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, info};

/// Finished goals kept around before old ones get pruned
const GOAL_HISTORY: usize = 256;

struct GoalEntry {
    result: watch::Receiver<Option<TrajectoryResult>>,
    cancel: Option<oneshot::Sender<&'static str>>,
}

impl GoalEntry {
    fn finished(&self) -> bool {
        self.result.borrow().is_some()
    }
}

/// `duration * scale`, saturating instead of overflowing
fn scaled(duration: Duration, scale: f64) -> Duration {
    if duration.is_zero() || scale == 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(duration.as_secs_f64() * scale).unwrap_or(Duration::MAX)
}

struct ControllerState {
    positions: Vec<f64>,
    goals: HashMap<GoalId, GoalEntry>,
    active: Option<GoalId>,
}

/// Kinematic stand in for a joint trajectory controller.
///
/// Goals are validated against the joint list and limits, then the joints
/// jump to the final point once its `time_from_start` elapsed.
pub struct SimulatedController {
    config: ControllerConfig,
    time_scale: f64,
    state: Arc<Mutex<ControllerState>>,
}

impl SimulatedController {
    pub fn new(config: ControllerConfig, time_scale: f64) -> Self {
        let positions = config.initial_positions();
        SimulatedController {
            config,
            time_scale: time_scale.max(0.0),
            state: Arc::new(Mutex::new(ControllerState {
                positions,
                goals: HashMap::new(),
                active: None,
            })),
        }
    }

    pub fn action_name(&self) -> &str {
        &self.config.action
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub async fn positions(&self) -> Vec<f64> {
        self.state.lock().await.positions.clone()
    }

    pub async fn active_goal(&self) -> Option<GoalId> {
        self.state.lock().await.active
    }

    pub async fn handle_goal(&self, goal: FollowJointTrajectoryGoal) -> GoalResponse {
        let goal_id = GoalId::random();
        let mut state = self.state.lock().await;
        if state.goals.len() > GOAL_HISTORY {
            state.goals.retain(|_, entry| !entry.finished());
        }

        let (target, duration) = match self.validate(&goal) {
            Ok(valid) => valid,
            Err(rejection) => {
                info!(
                    "{} rejected goal {}: {}",
                    self.config.action, goal_id, rejection.error_string
                );
                let (_, result) = watch::channel(Some(rejection));
                state.goals.insert(
                    goal_id,
                    GoalEntry {
                        result,
                        cancel: None,
                    },
                );
                return GoalResponse {
                    goal_id,
                    accepted: false,
                };
            }
        };

        if let Some(previous) = state.active.take() {
            if let Some(cancel) = state
                .goals
                .get_mut(&previous)
                .and_then(|entry| entry.cancel.take())
            {
                debug!("{} preempting goal {}", self.config.action, previous);
                let _ = cancel.send("preempted");
            }
        }

        let (result_sender, result) = watch::channel(None);
        let (cancel, cancel_receiver) = oneshot::channel();
        state.goals.insert(
            goal_id,
            GoalEntry {
                result,
                cancel: Some(cancel),
            },
        );
        state.active = Some(goal_id);
        drop(state);

        let execution_time = scaled(duration, self.time_scale);
        let shared_state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = tokio::time::sleep(execution_time) => None,
                reason = cancel_receiver => Some(reason.unwrap_or("canceled")),
            };
            let mut state = shared_state.lock().await;
            if state.active == Some(goal_id) {
                state.active = None;
            }
            let result = match outcome {
                None => {
                    state.positions = target;
                    TrajectoryResult::succeeded()
                }
                Some(reason) => TrajectoryResult::canceled(reason),
            };
            if let Some(entry) = state.goals.get_mut(&goal_id) {
                entry.cancel = None;
            }
            let _ = result_sender.send(Some(result));
        });

        GoalResponse {
            goal_id,
            accepted: true,
        }
    }

    pub async fn cancel(&self, goal_id: GoalId) -> Result<()> {
        let mut state = self.state.lock().await;
        let entry = state
            .goals
            .get_mut(&goal_id)
            .ok_or(ActionError::UnknownGoal(goal_id))?;
        if let Some(cancel) = entry.cancel.take() {
            let _ = cancel.send("canceled");
        }
        Ok(())
    }

    pub async fn result(&self, goal_id: GoalId) -> Result<TrajectoryResult> {
        let mut receiver = self
            .state
            .lock()
            .await
            .goals
            .get(&goal_id)
            .map(|entry| entry.result.clone())
            .ok_or(ActionError::UnknownGoal(goal_id))?;
        loop {
            let current = receiver.borrow().clone();
            if let Some(result) = current {
                return Ok(result);
            }
            receiver
                .changed()
                .await
                .map_err(|_| ActionError::GoalLost(goal_id))?;
        }
    }

    /// Final positions in controller joint order and the time to reach them
    fn validate(
        &self,
        goal: &FollowJointTrajectoryGoal,
    ) -> std::result::Result<(Vec<f64>, Duration), TrajectoryResult> {
        let names = &goal.trajectory.joint_names;
        let joints = &self.config.joints;
        if names.len() != joints.len() {
            return Err(TrajectoryResult::aborted(
                error_code::INVALID_JOINTS,
                "joint count does not match controller",
            ));
        }
        let mut order = Vec::with_capacity(joints.len());
        for joint in joints {
            match names.iter().position(|name| name == &joint.name) {
                Some(index) => order.push(index),
                None => {
                    return Err(TrajectoryResult::aborted(
                        error_code::INVALID_JOINTS,
                        &format!("missing joint {}", joint.name),
                    ))
                }
            }
        }

        let final_point = goal.final_point().ok_or_else(|| {
            TrajectoryResult::aborted(error_code::INVALID_GOAL, "trajectory has no points")
        })?;
        if goal
            .trajectory
            .points
            .iter()
            .any(|point| point.positions.len() != joints.len())
        {
            return Err(TrajectoryResult::aborted(
                error_code::INVALID_GOAL,
                "point size does not match joint count",
            ));
        }
        for point in &goal.trajectory.points {
            for (joint, &index) in joints.iter().zip(&order) {
                if !joint.within_limits(point.positions[index]) {
                    return Err(TrajectoryResult::aborted(
                        error_code::INVALID_GOAL,
                        &format!(
                            "{} position {:.3} outside [{}, {}]",
                            joint.name, point.positions[index], joint.lower, joint.upper
                        ),
                    ));
                }
            }
        }

        let target = order
            .iter()
            .map(|&index| final_point.positions[index])
            .collect();
        Ok((target, final_point.time_from_start.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teleop_config::TeleopConfig;
    use crate::trajectory::GoalStatus;
    use approx::assert_relative_eq;

    fn gripper_goal(position: f64, time_from_start: Duration) -> FollowJointTrajectoryGoal {
        FollowJointTrajectoryGoal::single_point(
            TeleopConfig::included().gripper.joint_names(),
            vec![position, position],
            time_from_start,
        )
    }

    #[tokio::test]
    async fn accepted_goal_moves_joints() {
        let controller = SimulatedController::new(TeleopConfig::included().gripper, 0.0);
        let response = controller
            .handle_goal(gripper_goal(0.02, Duration::from_secs(1)))
            .await;
        assert!(response.accepted);
        let result = controller.result(response.goal_id).await.unwrap();
        assert_eq!(result.status, GoalStatus::Succeeded);
        let positions = controller.positions().await;
        assert_relative_eq!(positions[0], 0.02);
        assert_relative_eq!(positions[1], 0.02);
        assert_eq!(controller.active_goal().await, None);
    }

    #[tokio::test]
    async fn joint_order_is_mapped() {
        let config = TeleopConfig::included().gripper;
        let controller = SimulatedController::new(config, 0.0);
        let goal = FollowJointTrajectoryGoal::single_point(
            vec![
                "gripper_left_finger_joint".to_owned(),
                "gripper_right_finger_joint".to_owned(),
            ],
            vec![0.01, 0.03],
            Duration::ZERO,
        );
        let response = controller.handle_goal(goal).await;
        controller.result(response.goal_id).await.unwrap();
        assert_eq!(controller.positions().await, vec![0.03, 0.01]);
    }

    #[tokio::test]
    async fn wrong_joints_are_rejected() {
        let controller = SimulatedController::new(TeleopConfig::included().torso, 0.0);
        let response = controller
            .handle_goal(gripper_goal(0.01, Duration::ZERO))
            .await;
        assert!(!response.accepted);
        let result = controller.result(response.goal_id).await.unwrap();
        assert_eq!(result.error_code, error_code::INVALID_JOINTS);
    }

    #[tokio::test]
    async fn out_of_limits_is_rejected() {
        let controller = SimulatedController::new(TeleopConfig::included().gripper, 0.0);
        let response = controller
            .handle_goal(gripper_goal(0.5, Duration::ZERO))
            .await;
        assert!(!response.accepted);
        let result = controller.result(response.goal_id).await.unwrap();
        assert_eq!(result.error_code, error_code::INVALID_GOAL);
        assert_eq!(controller.positions().await, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn empty_trajectory_is_rejected() {
        let config = TeleopConfig::included().torso;
        let controller = SimulatedController::new(config.clone(), 0.0);
        let mut goal =
            FollowJointTrajectoryGoal::single_point(config.joint_names(), vec![0.2], Duration::ZERO);
        goal.trajectory.points.clear();
        let response = controller.handle_goal(goal).await;
        assert!(!response.accepted);
        let result = controller.result(response.goal_id).await.unwrap();
        assert_eq!(result.error_code, error_code::INVALID_GOAL);
    }

    #[tokio::test]
    async fn new_goal_preempts_active_goal() {
        let config = TeleopConfig::included().torso;
        let controller = SimulatedController::new(config.clone(), 1.0);
        let slow = FollowJointTrajectoryGoal::single_point(
            config.joint_names(),
            vec![0.3],
            Duration::from_secs(30),
        );
        let fast =
            FollowJointTrajectoryGoal::single_point(config.joint_names(), vec![0.1], Duration::ZERO);
        let first = controller.handle_goal(slow).await;
        let second = controller.handle_goal(fast).await;

        let preempted = controller.result(first.goal_id).await.unwrap();
        assert_eq!(preempted.status, GoalStatus::Canceled);
        assert_eq!(preempted.error_string, "preempted");
        let finished = controller.result(second.goal_id).await.unwrap();
        assert!(finished.is_success());
        assert_relative_eq!(controller.positions().await[0], 0.1);
    }

    #[tokio::test]
    async fn cancel_stops_goal() {
        let config = TeleopConfig::included().torso;
        let controller = SimulatedController::new(config.clone(), 1.0);
        let goal = FollowJointTrajectoryGoal::single_point(
            config.joint_names(),
            vec![0.3],
            Duration::from_secs(30),
        );
        let response = controller.handle_goal(goal).await;
        controller.cancel(response.goal_id).await.unwrap();
        let result = controller.result(response.goal_id).await.unwrap();
        assert_eq!(result.status, GoalStatus::Canceled);
        assert_relative_eq!(controller.positions().await[0], 0.15);
    }

    #[test]
    fn scaling_saturates() {
        assert_eq!(scaled(Duration::ZERO, f64::INFINITY), Duration::ZERO);
        assert_eq!(scaled(Duration::from_secs(2), 0.0), Duration::ZERO);
        assert_eq!(scaled(Duration::from_secs(2), 0.5), Duration::from_secs(1));
        assert_eq!(scaled(Duration::from_secs(1), f64::INFINITY), Duration::MAX);
        assert_eq!(
            scaled(Duration::from_secs(i32::MAX as u64), 1e300),
            Duration::MAX
        );
    }

    #[tokio::test]
    async fn infinite_time_scale_accepts_goals() {
        let config = TeleopConfig::included();
        let controller = SimulatedController::new(config.gripper.clone(), f64::INFINITY);
        let instant = controller.handle_goal(gripper_goal(0.02, Duration::ZERO)).await;
        assert!(instant.accepted);
        let result = controller.result(instant.goal_id).await.unwrap();
        assert!(result.is_success());

        let endless = controller
            .handle_goal(gripper_goal(0.01, Duration::from_secs(1)))
            .await;
        assert!(endless.accepted);
        controller.cancel(endless.goal_id).await.unwrap();
        let result = controller.result(endless.goal_id).await.unwrap();
        assert_eq!(result.status, GoalStatus::Canceled);
    }

    #[tokio::test]
    async fn unknown_goal_errors() {
        let controller = SimulatedController::new(TeleopConfig::included().torso, 0.0);
        let unknown = GoalId::random();
        assert!(matches!(
            controller.cancel(unknown).await,
            Err(ActionError::UnknownGoal(_))
        ));
        assert!(matches!(
            controller.result(unknown).await,
            Err(ActionError::UnknownGoal(_))
        ));
    }
}
