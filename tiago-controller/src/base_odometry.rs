use crate::base_teleop::Twist;
use nalgebra as na;
use std::time::Duration;

/// Dead reckoning of a differential drive base
#[derive(Debug, Clone, PartialEq)]
pub struct BaseOdometry {
    pose: na::Isometry2<f64>,
}

impl Default for BaseOdometry {
    fn default() -> Self {
        BaseOdometry {
            pose: na::Isometry2::identity(),
        }
    }
}

impl BaseOdometry {
    pub fn pose(&self) -> &na::Isometry2<f64> {
        &self.pose
    }

    pub fn x(&self) -> f64 {
        self.pose.translation.x
    }

    pub fn y(&self) -> f64 {
        self.pose.translation.y
    }

    pub fn heading(&self) -> f64 {
        self.pose.rotation.angle()
    }

    /// Apply a velocity for `elapsed`, expressed in the base frame
    pub fn step(&mut self, twist: &Twist, elapsed: Duration) {
        let dt = elapsed.as_secs_f64();
        let motion = na::Isometry2::new(
            na::Vector2::new(twist.linear * dt, 0.0),
            twist.angular * dt,
        );
        self.pose *= motion;
    }
}
