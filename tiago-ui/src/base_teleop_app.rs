use crate::text_window::TeleopInterface;
use anyhow::Result;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tiago_controller::base_teleop::{
    BaseKeyOutcome, BaseTeleop, Twist, VelocityPublisher, BASE_HELP_LINE, BASE_HELP_TEXT,
    VELOCITY_LINE,
};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Drive the base with the arrow keys, publishing a velocity every tick.
///
/// A zero velocity is sent on exit so the base stops.
pub async fn run_base_teleop<I: TeleopInterface>(
    interface: &mut I,
    mut teleop: BaseTeleop,
    publisher: &dyn VelocityPublisher,
    tick_period: Duration,
    keep_running: Arc<AtomicBool>,
) -> Result<()> {
    let mut ticker = interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    'control: while keep_running.load(Ordering::Acquire) {
        ticker.tick().await;
        let now = Instant::now();
        while let Some(key) = interface.read_key()? {
            if teleop.key_pressed(key, now) == BaseKeyOutcome::Quit {
                info!("Quit requested");
                break 'control;
            }
        }

        let twist = teleop.velocity(now);
        if let Err(error) = publisher.publish(twist).await {
            warn!("{}", error);
            interface.beep()?;
        }

        interface.clear()?;
        interface.write_line(VELOCITY_LINE, &BaseTeleop::velocity_text(&twist))?;
        interface.write_line(BASE_HELP_LINE, BASE_HELP_TEXT)?;
        interface.refresh()?;
    }

    publisher.publish(Twist::zero()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_teleop_app::tests::ScriptedInterface;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use tiago_controller::base_teleop::PublishError;
    use tiago_controller::keys::TeleopKey;
    use tiago_controller::teleop_config::BaseConfig;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        twists: Mutex<Vec<Twist>>,
    }

    #[async_trait]
    impl VelocityPublisher for RecordingPublisher {
        async fn publish(&self, twist: Twist) -> std::result::Result<(), PublishError> {
            self.twists.lock().await.push(twist);
            Ok(())
        }
    }

    #[tokio::test]
    async fn arrow_key_publishes_and_stops() {
        let publisher = RecordingPublisher::default();
        let mut interface =
            ScriptedInterface::new(vec![Some(TeleopKey::Up), None, Some(TeleopKey::Char('q'))]);
        run_base_teleop(
            &mut interface,
            BaseTeleop::new(BaseConfig::default(), Duration::from_millis(400)),
            &publisher,
            Duration::from_millis(10),
            Arc::new(AtomicBool::new(true)),
        )
        .await
        .unwrap();

        let twists = publisher.twists.lock().await;
        assert_relative_eq!(twists[0].linear, 0.8);
        assert_eq!(*twists.last().unwrap(), Twist::zero());
        assert!(interface.wrote("Linear: 0.80, Angular: 0.00"));
        assert!(interface.wrote(BASE_HELP_TEXT));
    }
}
