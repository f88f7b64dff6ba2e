use anyhow::Result;
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tiago_controller::teleop_config::TeleopConfig;

/// The packaged TIAGo layout unless a json or yaml file is given
pub fn load_config(path: Option<&Path>) -> Result<TeleopConfig> {
    match path {
        Some(path) => {
            let path = path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("config path {:?} is not utf-8", path))?;
            let config = TeleopConfig::load(path)?;
            tracing::info!("Loaded config from {}", path);
            Ok(config)
        }
        None => Ok(TeleopConfig::included()),
    }
}

/// Value parser for flags that must be a finite, non negative number
pub fn non_negative(text: &str) -> std::result::Result<f64, String> {
    let value: f64 = text
        .parse()
        .map_err(|_| format!("{:?} is not a number", text))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("{} must be finite and not negative", value))
    }
}

/// Flag that drops to false on Ctrl+C
pub fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let keep_running = Arc::new(AtomicBool::new(true));
    tokio::spawn({
        let keep_running = keep_running.clone();
        async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to wait for Ctrl+c: {}", error);
                return;
            }
            tracing::info!("Detected Ctrl+c");
            keep_running.store(false, Ordering::Release);
        }
    });
    keep_running
}
