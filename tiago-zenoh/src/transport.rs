use crate::error::{Result, WrapperError};
use crate::protocol::DEFAULT_PREFIX;
use std::sync::Arc;
use zenoh::config::EndPoint;
use zenoh::prelude::r#async::*;

/// Zenoh flags shared by every binary
#[derive(clap::Args, Debug, Clone)]
pub struct ZenohArgs {
    /// Endpoints to connect to, e.g. tcp/192.168.1.10:7447
    #[arg(long)]
    pub connect: Vec<String>,

    /// Endpoints to listen on
    #[arg(long)]
    pub listen: Vec<String>,

    /// Prefix of every key expression
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,
}

fn parse_endpoints(endpoints: &[String]) -> Result<Vec<EndPoint>> {
    endpoints
        .iter()
        .map(|endpoint| {
            endpoint
                .parse()
                .map_err(|_| WrapperError::InvalidEndpoint(endpoint.clone()))
        })
        .collect()
}

pub async fn open_session(args: &ZenohArgs) -> Result<Arc<Session>> {
    let mut config = zenoh_config::Config::default();
    if !args.connect.is_empty() {
        config.connect.endpoints = parse_endpoints(&args.connect)?;
    }
    if !args.listen.is_empty() {
        config.listen.endpoints = parse_endpoints(&args.listen)?;
    }
    let session = zenoh::open(config).res().await?;
    tracing::info!("Zenoh session open, key prefix {:?}", args.prefix);
    Ok(session.into_arc())
}

/// Peer session that stays on this machine, for loopback tests
#[cfg(test)]
pub(crate) async fn local_session() -> Arc<Session> {
    use zenoh::config::ValidatedMap;

    let mut config = zenoh_config::Config::default();
    config
        .insert_json5("scouting/multicast/enabled", "false")
        .unwrap();
    config
        .insert_json5("listen/endpoints", r#"["tcp/127.0.0.1:0"]"#)
        .unwrap();
    zenoh::open(config).res().await.unwrap().into_arc()
}
