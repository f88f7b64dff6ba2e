use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tiago_controller::{
    base_odometry::BaseOdometry,
    base_teleop::{BaseTeleop, OdometryPublisher, VelocityPublisher},
};
use tiago_ui::{base_teleop_app::run_base_teleop, text_window::TextWindow};
use tiago_zenoh::{
    cli::{load_config, stop_on_ctrl_c},
    logging,
    transport::{open_session, ZenohArgs},
    velocity::ZenohVelocityPublisher,
};
use tokio::sync::Mutex;

const WINDOW_LINES: usize = 10;

/// Drive the TIAGo base with the arrow keys
#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// Rates and velocity topic as json or yaml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Integrate the velocity locally instead of publishing it
    #[arg(long)]
    simulate: bool,

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
    let odometry = Arc::new(Mutex::new(BaseOdometry::default()));
    let publisher: Box<dyn VelocityPublisher> = if args.simulate {
        Box::new(OdometryPublisher::new(Arc::clone(&odometry)))
    } else {
        let session = open_session(&args.zenoh).await?;
        let publisher =
            ZenohVelocityPublisher::new(session, &args.zenoh.prefix, &config.base.velocity_topic);
        tracing::info!("Publishing velocity on {}", publisher.key());
        Box::new(publisher)
    };

    let teleop = BaseTeleop::new(config.base.clone(), config.key_timeout());
    let keep_running = stop_on_ctrl_c();

    let mut window = TextWindow::new(WINDOW_LINES)?;
    run_base_teleop(
        &mut window,
        teleop,
        publisher.as_ref(),
        config.tick_period(),
        keep_running,
    )
    .await?;
    drop(window);

    if args.simulate {
        let odometry = odometry.lock().await;
        tracing::info!(
            "Simulated base ended at x {:.2} y {:.2} heading {:.2}",
            odometry.x(),
            odometry.y(),
            odometry.heading()
        );
    }
    Ok(())
}
