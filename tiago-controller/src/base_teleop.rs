use crate::base_odometry::BaseOdometry;
use crate::keys::{self, TeleopKey};
use crate::teleop_config::BaseConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

pub const BASE_HELP_TEXT: &str = "Use arrow keys to move, q to exit.";
pub const VELOCITY_LINE: usize = 2;
pub const BASE_HELP_LINE: usize = 5;

/// Planar velocity command, x forward and yaw
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    /// m/s
    pub linear: f64,
    /// rad/s
    pub angular: f64,
}

impl Twist {
    pub fn new(linear: f64, angular: f64) -> Self {
        Twist { linear, angular }
    }

    pub fn zero() -> Self {
        Twist::default()
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to publish velocity: {0}")]
    Transport(String),
    #[error("error while encoding velocity")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait VelocityPublisher: Send + Sync {
    async fn publish(&self, twist: Twist) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseKeyOutcome {
    Quit,
    Moving,
    Ignored,
}

/// Arrow key base teleop.
///
/// Unlike the arm teleop presses are not consumed, a held key keeps
/// repeating so the base moves until the key was released for
/// `key_timeout`.
pub struct BaseTeleop {
    config: BaseConfig,
    key_timeout: Duration,
    last_pressed: HashMap<TeleopKey, Instant>,
}

impl BaseTeleop {
    pub fn new(config: BaseConfig, key_timeout: Duration) -> Self {
        BaseTeleop {
            config,
            key_timeout,
            last_pressed: HashMap::new(),
        }
    }

    pub fn key_pressed(&mut self, key: TeleopKey, now: Instant) -> BaseKeyOutcome {
        if key.is_quit() {
            return BaseKeyOutcome::Quit;
        }
        if keys::base_binding(key).is_some() {
            self.last_pressed.insert(key, now);
            return BaseKeyOutcome::Moving;
        }
        BaseKeyOutcome::Ignored
    }

    pub fn velocity(&self, now: Instant) -> Twist {
        let (linear, angular) = self
            .last_pressed
            .iter()
            .filter(|(_, pressed)| now.saturating_duration_since(**pressed) < self.key_timeout)
            .filter_map(|(key, _)| keys::base_binding(*key))
            .fold((0.0, 0.0), |(linear, angular), (dl, da)| {
                (linear + dl, angular + da)
            });
        let linear_rate = if linear > 0.0 {
            self.config.forward_rate
        } else {
            self.config.backward_rate
        };
        Twist::new(linear * linear_rate, angular * self.config.rotation_rate)
    }

    pub fn velocity_text(twist: &Twist) -> String {
        format!("Linear: {:.2}, Angular: {:.2}", twist.linear, twist.angular)
    }
}

/// Publisher driving a simulated base instead of a robot
pub struct OdometryPublisher {
    odometry: Arc<Mutex<BaseOdometry>>,
    last_publish: Mutex<Option<Instant>>,
}

impl OdometryPublisher {
    pub fn new(odometry: Arc<Mutex<BaseOdometry>>) -> Self {
        OdometryPublisher {
            odometry,
            last_publish: Mutex::new(None),
        }
    }
}

#[async_trait]
impl VelocityPublisher for OdometryPublisher {
    async fn publish(&self, twist: Twist) -> Result<(), PublishError> {
        let now = Instant::now();
        let mut last_publish = self.last_publish.lock().await;
        if let Some(last) = *last_publish {
            self.odometry
                .lock()
                .await
                .step(&twist, now.saturating_duration_since(last));
        }
        *last_publish = Some(now);
        Ok(())
    }
}
