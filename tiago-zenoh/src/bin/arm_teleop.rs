use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, time::Duration};
use tiago_controller::{
    action_client::simulated_clients, arm_teleop::ArmTeleop, goal_dispatcher::GoalDispatcher,
};
use tiago_ui::{
    arm_teleop_app::{run_arm_teleop, WINDOW_LINES},
    text_window::TextWindow,
};
use tiago_zenoh::{
    action_client::zenoh_clients,
    cli::{load_config, non_negative, stop_on_ctrl_c},
    logging,
    transport::{open_session, ZenohArgs},
};

/// Move the TIAGo arm, torso and gripper joint by joint from the keyboard
#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// Joint layout as json or yaml, defaults to the packaged TIAGo layout
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drive in-process simulated controllers instead of zenoh
    #[arg(long)]
    simulate: bool,

    /// Seconds to wait for an action server before giving up on a goal
    #[arg(long, default_value_t = 5.0, value_parser = non_negative)]
    server_timeout: f64,

    #[command(flatten)]
    zenoh: ZenohArgs,

    /// Write logs here instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_tracing(args.verbose, args.log_file.as_deref())?;

    let config = load_config(args.config.as_deref())?;
    let clients = if args.simulate {
        tracing::info!("Using simulated controllers");
        simulated_clients(&config, 1.0)
    } else {
        let session = open_session(&args.zenoh).await?;
        zenoh_clients(session, &config, &args.zenoh.prefix)
    };

    let server_timeout = Duration::try_from_secs_f64(args.server_timeout)?;
    let (dispatcher, events) = GoalDispatcher::new(clients, server_timeout);
    let teleop = ArmTeleop::new(config);
    let keep_running = stop_on_ctrl_c();

    let mut window = TextWindow::new(WINDOW_LINES)?;
    run_arm_teleop(&mut window, teleop, &dispatcher, events, keep_running).await?;
    drop(window);
    tracing::info!("Arm teleop stopped");
    Ok(())
}
