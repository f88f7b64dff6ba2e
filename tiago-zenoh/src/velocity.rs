use crate::error::Result;
use crate::protocol::topic_key;
use async_trait::async_trait;
use std::{sync::Arc, time::Instant};
use tiago_controller::base_odometry::BaseOdometry;
use tiago_controller::base_teleop::{PublishError, Twist, VelocityPublisher};
use tokio::sync::Mutex;
use zenoh::prelude::r#async::*;

pub struct ZenohVelocityPublisher {
    session: Arc<Session>,
    key: String,
}

impl ZenohVelocityPublisher {
    pub fn new(session: Arc<Session>, prefix: &str, topic: &str) -> Self {
        ZenohVelocityPublisher {
            session,
            key: topic_key(prefix, topic),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl VelocityPublisher for ZenohVelocityPublisher {
    async fn publish(&self, twist: Twist) -> std::result::Result<(), PublishError> {
        let json = serde_json::to_string(&twist)?;
        self.session
            .put(self.key.as_str(), json)
            .res()
            .await
            .map_err(|error| PublishError::Transport(error.to_string()))
    }
}

/// Integrate every twist published on the velocity topic into `odometry`.
///
/// A twist drives the base until the next one arrives.
pub async fn follow_velocity(
    session: Arc<Session>,
    prefix: &str,
    topic: &str,
    odometry: Arc<Mutex<BaseOdometry>>,
) -> Result<()> {
    let key = topic_key(prefix, topic);
    let subscriber = session.declare_subscriber(key.as_str()).res().await?;
    tracing::info!("Following velocity commands on {}", key);

    let mut last: Option<(Twist, Instant)> = None;
    while let Ok(sample) = subscriber.recv_async().await {
        let twist: Twist = match serde_json::from_slice(&sample.value.payload.contiguous()) {
            Ok(twist) => twist,
            Err(error) => {
                tracing::warn!("Malformed twist on {}: {}", key, error);
                continue;
            }
        };
        let now = Instant::now();
        let mut odometry = odometry.lock().await;
        if let Some((previous, received)) = last {
            odometry.step(&previous, now.saturating_duration_since(received));
        }
        tracing::debug!(
            "Base at x {:.2} y {:.2} heading {:.2}",
            odometry.x(),
            odometry.y(),
            odometry.heading()
        );
        last = Some((twist, now));
    }
    Ok(())
}
