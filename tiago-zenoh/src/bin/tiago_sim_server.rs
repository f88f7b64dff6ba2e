use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::{path::PathBuf, sync::Arc};
use tiago_controller::{
    base_odometry::BaseOdometry, keys::ControllerGroup,
    simulated_controller::SimulatedController,
};
use tiago_zenoh::{
    action_server::ZenohActionServer,
    cli::{load_config, non_negative},
    logging,
    transport::{open_session, ZenohArgs},
    velocity::follow_velocity,
};
use tokio::{sync::Mutex, task::JoinSet};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ArmVariant {
    TiagoArm,
    NoArm,
}

/// Simulated TIAGo controllers served over zenoh
#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// Joint layout as json or yaml, defaults to the packaged TIAGo layout
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    zenoh: ZenohArgs,

    /// Name of the simulated world
    #[arg(long, default_value = "pick")]
    world_name: String,

    /// Arm fitted to the robot, no-arm also drops the gripper
    #[arg(long, value_enum, default_value_t = ArmVariant::TiagoArm)]
    arm: ArmVariant,

    /// Multiplier on trajectory execution time, 0 finishes goals immediately
    #[arg(long, default_value_t = 1.0, value_parser = non_negative)]
    time_scale: f64,

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
    // a server has no UI to protect, default to info
    logging::setup_tracing(args.verbose.saturating_add(1), args.log_file.as_deref())?;

    let config = load_config(args.config.as_deref())?;
    tracing::info!(
        "Starting simulated TIAGo in world {:?} with {:?}",
        args.world_name,
        args.arm
    );
    let session = open_session(&args.zenoh).await?;

    let mut tasks = JoinSet::new();
    for group in ControllerGroup::ALL {
        if args.arm == ArmVariant::NoArm && group != ControllerGroup::Torso {
            tracing::info!("No {} controller on a robot without arm", group);
            continue;
        }
        let controller = Arc::new(SimulatedController::new(
            config.controller(group).clone(),
            args.time_scale,
        ));
        let server = ZenohActionServer::new(Arc::clone(&session), controller, &args.zenoh.prefix);
        tasks.spawn(async move { server.run().await.map_err(anyhow::Error::from) });
    }

    let odometry = Arc::new(Mutex::new(BaseOdometry::default()));
    tasks.spawn({
        let session = Arc::clone(&session);
        let prefix = args.zenoh.prefix.clone();
        let topic = config.base.velocity_topic.clone();
        let odometry = Arc::clone(&odometry);
        async move {
            follow_velocity(session, &prefix, &topic, odometry)
                .await
                .map_err(anyhow::Error::from)
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Detected Ctrl+c");
        }
        Some(finished) = tasks.join_next() => {
            finished??;
            tracing::warn!("A server stopped unexpectedly");
        }
    }
    tasks.shutdown().await;

    let odometry = odometry.lock().await;
    tracing::info!(
        "Base ended at x {:.2} y {:.2} heading {:.2}",
        odometry.x(),
        odometry.y(),
        odometry.heading()
    );
    Ok(())
}
