use crate::text_window::TeleopInterface;
use anyhow::Result;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;
use tiago_controller::arm_teleop::{ArmTeleop, KeyOutcome, GOAL_LINE, HELP_LINE};
use tiago_controller::goal_dispatcher::{GoalDispatcher, GoalEvent};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Lines the arm teleop window is split into
pub const WINDOW_LINES: usize = 10;

/// Run the arm teleop until `q` is pressed or `keep_running` is cleared.
///
/// Goals still running when the loop exits get canceled.
pub async fn run_arm_teleop<I: TeleopInterface>(
    interface: &mut I,
    mut teleop: ArmTeleop,
    dispatcher: &GoalDispatcher,
    mut events: mpsc::UnboundedReceiver<GoalEvent>,
    keep_running: Arc<AtomicBool>,
) -> Result<()> {
    interface.clear()?;
    interface.write_line(HELP_LINE, teleop.help_text())?;
    interface.refresh()?;

    let mut ticker = interval(teleop.config().tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    'control: while keep_running.load(Ordering::Acquire) {
        ticker.tick().await;
        let now = Instant::now();
        while let Some(key) = interface.read_key()? {
            if teleop.key_pressed(key, now) == KeyOutcome::Quit {
                info!("Quit requested");
                break 'control;
            }
        }

        teleop.apply_held_keys(now);
        while let Some((group, goal)) = teleop.take_goal() {
            interface.write_line(HELP_LINE, teleop.help_text())?;
            debug!("Dispatching {} goal", group);
            if let Err(error) = dispatcher.dispatch(group, goal) {
                warn!("{}", error);
                interface.write_line(GOAL_LINE, &error.to_string())?;
                interface.beep()?;
            }
        }

        while let Ok(event) = events.try_recv() {
            if matches!(event, GoalEvent::Rejected { .. } | GoalEvent::Failed { .. }) {
                interface.beep()?;
            }
            interface.write_line(GOAL_LINE, &event.to_string())?;
        }
        for (line, text) in teleop.take_status() {
            interface.write_line(line, &text)?;
        }
        interface.refresh()?;
    }

    let canceled = dispatcher.cancel_all().await;
    if canceled > 0 {
        info!("Canceled {} running goals", canceled);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::text_window::WindowError;
    use approx::assert_relative_eq;
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;
    use tiago_controller::arm_teleop::HELP_TEXT;
    use tiago_controller::{
        action_client::{SimulatedActionClient, TrajectoryActionClient},
        keys::{ControllerGroup, TeleopKey},
        simulated_controller::SimulatedController,
        teleop_config::TeleopConfig,
    };

    /// Interface fed from a script, `None` ends the keys of one tick
    pub(crate) struct ScriptedInterface {
        keys: VecDeque<Option<TeleopKey>>,
        pub lines: Vec<(usize, String)>,
        pub beeps: usize,
    }

    impl ScriptedInterface {
        pub(crate) fn new(keys: Vec<Option<TeleopKey>>) -> Self {
            ScriptedInterface {
                keys: keys.into(),
                lines: vec![],
                beeps: 0,
            }
        }

        pub(crate) fn wrote(&self, text: &str) -> bool {
            self.lines.iter().any(|(_, line)| line == text)
        }
    }

    impl TeleopInterface for ScriptedInterface {
        fn read_key(&mut self) -> std::result::Result<Option<TeleopKey>, WindowError> {
            Ok(self.keys.pop_front().flatten())
        }

        fn clear(&mut self) -> std::result::Result<(), WindowError> {
            Ok(())
        }

        fn write_line(
            &mut self,
            lineno: usize,
            message: &str,
        ) -> std::result::Result<(), WindowError> {
            if lineno >= WINDOW_LINES {
                return Err(WindowError::LineOutOfBounds {
                    lineno,
                    lines: WINDOW_LINES,
                });
            }
            self.lines.push((lineno, message.to_owned()));
            Ok(())
        }

        fn refresh(&mut self) -> std::result::Result<(), WindowError> {
            Ok(())
        }

        fn beep(&mut self) -> std::result::Result<(), WindowError> {
            self.beeps += 1;
            Ok(())
        }
    }

    fn key(key: char) -> Option<TeleopKey> {
        Some(TeleopKey::from_char(key))
    }

    fn fast_config() -> TeleopConfig {
        let mut config = TeleopConfig::included();
        config.rate_hz = 100.0;
        config
    }

    #[tokio::test]
    async fn torso_goal_reaches_controller() {
        let config = fast_config();
        let torso = Arc::new(SimulatedController::new(config.torso.clone(), 0.0));
        let client: Arc<dyn TrajectoryActionClient> =
            Arc::new(SimulatedActionClient::new(Arc::clone(&torso)));
        let mut clients = HashMap::new();
        clients.insert(ControllerGroup::Torso, client);
        let (dispatcher, events) = GoalDispatcher::new(clients, Duration::from_millis(10));

        let mut script = vec![key('8'), key('d'), None];
        script.extend(std::iter::repeat(None).take(10));
        script.push(key('q'));
        let mut interface = ScriptedInterface::new(script);

        run_arm_teleop(
            &mut interface,
            ArmTeleop::new(config),
            &dispatcher,
            events,
            Arc::new(AtomicBool::new(true)),
        )
        .await
        .unwrap();

        let help_lines = interface
            .lines
            .iter()
            .filter(|(line, text)| *line == HELP_LINE && text == HELP_TEXT)
            .count();
        assert_eq!(help_lines, 2, "help drawn at start and with the goal");
        assert!(interface.wrote("Selected Joint: Torso"));
        assert!(interface.wrote("Torso Position: 0.16"));
        assert!(interface.wrote("Goal accepted"));
        assert!(interface.wrote("Result: 0"));
        assert_relative_eq!(torso.positions().await[0], 0.16, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn missing_controller_beeps() {
        let (dispatcher, events) = GoalDispatcher::new(HashMap::new(), Duration::from_millis(10));
        let mut interface = ScriptedInterface::new(vec![key('1'), key('a'), None, key('q')]);

        run_arm_teleop(
            &mut interface,
            ArmTeleop::new(fast_config()),
            &dispatcher,
            events,
            Arc::new(AtomicBool::new(true)),
        )
        .await
        .unwrap();

        assert_eq!(interface.beeps, 1);
        assert!(interface.wrote("no action client for arm controller"));
    }

    #[tokio::test]
    async fn goal_goes_to_joint_selected_when_key_was_pressed() {
        let config = fast_config();
        let torso = Arc::new(SimulatedController::new(config.torso.clone(), 0.0));
        let arm = Arc::new(SimulatedController::new(config.arm.clone(), 0.0));
        let mut clients: HashMap<ControllerGroup, Arc<dyn TrajectoryActionClient>> =
            HashMap::new();
        clients.insert(
            ControllerGroup::Torso,
            Arc::new(SimulatedActionClient::new(Arc::clone(&torso))),
        );
        clients.insert(
            ControllerGroup::Arm,
            Arc::new(SimulatedActionClient::new(Arc::clone(&arm))),
        );
        let (dispatcher, events) = GoalDispatcher::new(clients, Duration::from_millis(10));

        let mut script = vec![key('8'), key('d'), key('2'), None];
        script.extend(std::iter::repeat(None).take(10));
        script.push(key('q'));
        let mut interface = ScriptedInterface::new(script);

        run_arm_teleop(
            &mut interface,
            ArmTeleop::new(config.clone()),
            &dispatcher,
            events,
            Arc::new(AtomicBool::new(true)),
        )
        .await
        .unwrap();

        assert!(interface.wrote("Selected Joint: 2"));
        assert_relative_eq!(torso.positions().await[0], 0.16, epsilon = 1e-9);
        assert_eq!(arm.positions().await, config.arm.initial_positions());
    }

    #[tokio::test]
    async fn cleared_flag_stops_loop() {
        let (dispatcher, events) = GoalDispatcher::new(HashMap::new(), Duration::from_millis(10));
        let mut interface = ScriptedInterface::new(vec![]);
        run_arm_teleop(
            &mut interface,
            ArmTeleop::new(fast_config()),
            &dispatcher,
            events,
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();
        assert_eq!(interface.lines.len(), 1);
    }
}
