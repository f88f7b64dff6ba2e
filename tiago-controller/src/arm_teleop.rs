use crate::keys::{self, ControllerGroup, SelectedJoint, TeleopKey};
use crate::teleop_config::{ControllerConfig, TeleopConfig};
use crate::trajectory::FollowJointTrajectoryGoal;
use std::collections::HashMap;
use std::time::Instant;

pub const HELP_TEXT: &str = "Use keys 1-9 to select joint, A/D/W/S to adjust, W and S is for small turning 0.001, A and D is for 0.01, O and P is for fast turning 1.57, R to reselect, Q to exit.";

/// Status lines of the teleop window
pub const HELP_LINE: usize = 0;
pub const SELECTION_LINE: usize = 1;
pub const POSITION_LINE: usize = 2;
pub const GOAL_LINE: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Quit,
    Selected(SelectedJoint),
    MovementQueued,
    Reselect,
    Ignored,
}

/// Keyboard driven joint teleop.
///
/// Keeps the commanded position of every joint and turns key presses
/// into single point trajectory goals.
pub struct ArmTeleop {
    config: TeleopConfig,
    arm_positions: Vec<f64>,
    torso_position: f64,
    gripper_position: f64,
    selected: Option<SelectedJoint>,
    last_pressed: HashMap<TeleopKey, Instant>,
    /// Controllers with a goal waiting, oldest first
    pending: Vec<ControllerGroup>,
    status: HashMap<usize, String>,
}

impl ArmTeleop {
    pub fn new(config: TeleopConfig) -> Self {
        let arm_positions = config.arm.initial_positions();
        let torso_position = config.torso.joints[0].initial;
        let gripper_position = config.gripper.joints[0].initial;
        ArmTeleop {
            config,
            arm_positions,
            torso_position,
            gripper_position,
            selected: None,
            last_pressed: HashMap::new(),
            pending: vec![],
            status: HashMap::new(),
        }
    }

    pub fn config(&self) -> &TeleopConfig {
        &self.config
    }

    pub fn selected(&self) -> Option<SelectedJoint> {
        self.selected
    }

    pub fn arm_positions(&self) -> &[f64] {
        &self.arm_positions
    }

    pub fn torso_position(&self) -> f64 {
        self.torso_position
    }

    pub fn gripper_position(&self) -> f64 {
        self.gripper_position
    }

    pub fn goal_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn help_text(&self) -> &'static str {
        HELP_TEXT
    }

    /// Latest text for each status line that changed since last call
    pub fn take_status(&mut self) -> Vec<(usize, String)> {
        let mut lines: Vec<_> = self.status.drain().collect();
        lines.sort_by_key(|(line, _)| *line);
        lines
    }

    pub fn key_pressed(&mut self, key: TeleopKey, now: Instant) -> KeyOutcome {
        if key.is_quit() {
            return KeyOutcome::Quit;
        }
        if let Some(joint) = keys::joint_binding(key) {
            if let SelectedJoint::Arm(index) = joint {
                if index >= self.arm_positions.len() {
                    return KeyOutcome::Ignored;
                }
            }
            if self.selected != Some(joint) {
                // presses from this tick belong to the previous joint
                self.apply_held_keys(now);
            }
            self.selected = Some(joint);
            self.status
                .insert(SELECTION_LINE, format!("Selected Joint: {}", joint));
            return KeyOutcome::Selected(joint);
        }
        if keys::movement_binding(key).is_some() {
            return match self.selected {
                Some(joint) => {
                    self.last_pressed.insert(key, now);
                    self.status
                        .insert(POSITION_LINE, self.position_text(joint));
                    KeyOutcome::MovementQueued
                }
                None => KeyOutcome::Ignored,
            };
        }
        if key == TeleopKey::Char('r') {
            self.apply_held_keys(now);
            self.selected = None;
            self.status
                .insert(SELECTION_LINE, String::from("Reselect Joint"));
            return KeyOutcome::Reselect;
        }
        KeyOutcome::Ignored
    }

    /// Apply every movement key pressed within the key timeout.
    ///
    /// Recorded presses are consumed, each press moves the joint once.
    pub fn apply_held_keys(&mut self, now: Instant) {
        let timeout = self.config.key_timeout();
        let deltas: Vec<f64> = self
            .last_pressed
            .drain()
            .filter(|(_, pressed)| now.saturating_duration_since(*pressed) < timeout)
            .filter_map(|(key, _)| keys::movement_binding(key))
            .collect();
        let joint = match self.selected {
            Some(joint) => joint,
            None => return,
        };
        if deltas.is_empty() {
            return;
        }
        for delta in deltas {
            self.nudge(joint, delta);
        }
        self.status.insert(POSITION_LINE, self.position_text(joint));
        let group = joint.group();
        if !self.pending.contains(&group) {
            self.pending.push(group);
        }
    }

    /// Next pending goal, built from the current commanded positions
    pub fn take_goal(&mut self) -> Option<(ControllerGroup, FollowJointTrajectoryGoal)> {
        if self.pending.is_empty() {
            return None;
        }
        let group = self.pending.remove(0);
        let time_from_start = self.config.time_from_start();
        let goal = match group {
            ControllerGroup::Arm => FollowJointTrajectoryGoal::single_point(
                self.config.arm.joint_names(),
                self.arm_positions.clone(),
                time_from_start,
            ),
            ControllerGroup::Torso => FollowJointTrajectoryGoal::single_point(
                self.config.torso.joint_names(),
                vec![self.torso_position; self.config.torso.joints.len()],
                time_from_start,
            ),
            ControllerGroup::Gripper => FollowJointTrajectoryGoal::single_point(
                self.config.gripper.joint_names(),
                vec![self.gripper_position; self.config.gripper.joints.len()],
                time_from_start,
            ),
        };
        Some((group, goal))
    }

    fn nudge(&mut self, joint: SelectedJoint, delta: f64) {
        let clamp = self.config.clamp_to_limits;
        match joint {
            SelectedJoint::Arm(index) => {
                let target = self.arm_positions[index] + delta;
                self.arm_positions[index] = if clamp {
                    self.config.arm.joints[index].clamp(target)
                } else {
                    target
                };
            }
            SelectedJoint::Torso => {
                self.torso_position =
                    shared_position(&self.config.torso, self.torso_position + delta, clamp);
            }
            SelectedJoint::Gripper => {
                self.gripper_position =
                    shared_position(&self.config.gripper, self.gripper_position + delta, clamp);
            }
        }
    }

    fn position_text(&self, joint: SelectedJoint) -> String {
        match joint {
            SelectedJoint::Arm(index) => format!(
                "Joint {} Position: {:.2}",
                index + 1,
                self.arm_positions[index]
            ),
            SelectedJoint::Torso => format!("Torso Position: {:.2}", self.torso_position),
            SelectedJoint::Gripper => format!("Gripper Position: {:.2}", self.gripper_position),
        }
    }
}

/// Position shared by every joint of a controller, limited by the tightest joint
fn shared_position(controller: &ControllerConfig, target: f64, clamp: bool) -> f64 {
    if !clamp {
        return target;
    }
    let (lower, upper) = controller.shared_limits();
    // validated configs never get here with an empty range
    if lower > upper {
        return target;
    }
    target.clamp(lower, upper)
}
