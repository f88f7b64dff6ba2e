//! Keyboard bindings shared by the arm and base teleop.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key as seen by the teleop state machines.
///
/// Letters are always lower case, terminal backends normalize them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeleopKey {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    /// Ctrl+C while the terminal is in raw mode
    Interrupt,
}

impl TeleopKey {
    pub fn from_char(key: char) -> Self {
        TeleopKey::Char(key.to_ascii_lowercase())
    }

    pub fn is_quit(&self) -> bool {
        matches!(self, TeleopKey::Char('q') | TeleopKey::Interrupt)
    }
}

/// Action server a joint is commanded through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerGroup {
    Arm,
    Torso,
    Gripper,
}

impl ControllerGroup {
    pub const ALL: [ControllerGroup; 3] = [
        ControllerGroup::Arm,
        ControllerGroup::Torso,
        ControllerGroup::Gripper,
    ];
}

impl fmt::Display for ControllerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerGroup::Arm => write!(f, "arm"),
            ControllerGroup::Torso => write!(f, "torso"),
            ControllerGroup::Gripper => write!(f, "gripper"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedJoint {
    /// zero based arm joint index
    Arm(usize),
    Torso,
    Gripper,
}

impl SelectedJoint {
    pub fn group(&self) -> ControllerGroup {
        match self {
            SelectedJoint::Arm(_) => ControllerGroup::Arm,
            SelectedJoint::Torso => ControllerGroup::Torso,
            SelectedJoint::Gripper => ControllerGroup::Gripper,
        }
    }
}

impl fmt::Display for SelectedJoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectedJoint::Arm(index) => write!(f, "{}", index + 1),
            SelectedJoint::Torso => write!(f, "Torso"),
            SelectedJoint::Gripper => write!(f, "Gripper"),
        }
    }
}

/// Number keys 1-7 pick arm joints, 8 the torso and 9 the gripper
pub fn joint_binding(key: TeleopKey) -> Option<SelectedJoint> {
    match key {
        TeleopKey::Char(digit @ '1'..='7') => {
            Some(SelectedJoint::Arm(digit as usize - '1' as usize))
        }
        TeleopKey::Char('8') => Some(SelectedJoint::Torso),
        TeleopKey::Char('9') => Some(SelectedJoint::Gripper),
        _ => None,
    }
}

/// Position change applied to the selected joint
pub fn movement_binding(key: TeleopKey) -> Option<f64> {
    match key {
        TeleopKey::Char('a') => Some(-0.01),
        TeleopKey::Char('d') => Some(0.01),
        TeleopKey::Char('w') => Some(0.001),
        TeleopKey::Char('s') => Some(-0.001),
        TeleopKey::Char('o') => Some(-1.57),
        TeleopKey::Char('p') => Some(1.57),
        _ => None,
    }
}

/// (linear, angular) direction of an arrow key
pub fn base_binding(key: TeleopKey) -> Option<(f64, f64)> {
    match key {
        TeleopKey::Up => Some((1.0, 0.0)),
        TeleopKey::Down => Some((-1.0, 0.0)),
        TeleopKey::Left => Some((0.0, 1.0)),
        TeleopKey::Right => Some((0.0, -1.0)),
        _ => None,
    }
}
