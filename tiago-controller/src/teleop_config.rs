use crate::keys::ControllerGroup;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error while accessing configuration")]
    IoError(#[from] std::io::Error),
    #[error("error while parsing json")]
    JsonError(#[from] serde_json::Error),
    #[error("error while parsing yaml")]
    YamlError(#[from] serde_yaml::Error),
    #[error("unsupported config extension {0:?}")]
    UnknownFormat(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Largest number of arm joints that can be bound to the number keys
pub const MAX_ARM_JOINTS: usize = 7;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointConfig {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    pub initial: f64,
}

impl JointConfig {
    pub fn new(name: &str, lower: f64, upper: f64, initial: f64) -> JointConfig {
        JointConfig {
            name: name.to_owned(),
            lower,
            upper,
            initial,
        }
    }

    pub fn clamp(&self, position: f64) -> f64 {
        position.clamp(self.lower, self.upper)
    }

    pub fn within_limits(&self, position: f64) -> bool {
        position >= self.lower && position <= self.upper
    }
}

/// A single FollowJointTrajectory action server and the joints it drives
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub action: String,
    pub joints: Vec<JointConfig>,
}

impl ControllerConfig {
    pub fn joint_names(&self) -> Vec<String> {
        self.joints.iter().map(|joint| joint.name.clone()).collect()
    }

    pub fn initial_positions(&self) -> Vec<f64> {
        self.joints.iter().map(|joint| joint.initial).collect()
    }

    /// Range every joint can reach when they all share one position
    pub fn shared_limits(&self) -> (f64, f64) {
        let lower = self
            .joints
            .iter()
            .map(|joint| joint.lower)
            .fold(f64::NEG_INFINITY, f64::max);
        let upper = self
            .joints
            .iter()
            .map(|joint| joint.upper)
            .fold(f64::INFINITY, f64::min);
        (lower, upper)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BaseConfig {
    /// m/s when driving forward
    pub forward_rate: f64,
    /// m/s when reversing
    pub backward_rate: f64,
    /// rad/s
    pub rotation_rate: f64,
    pub velocity_topic: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        BaseConfig {
            forward_rate: 0.8,
            backward_rate: 0.5,
            rotation_rate: 1.0,
            velocity_topic: String::from("key_vel"),
        }
    }
}

fn default_rate_hz() -> f64 {
    10.0
}

fn default_key_timeout() -> f64 {
    0.4
}

fn default_time_from_start() -> f64 {
    1.0
}

/// Seconds that fit a `Duration`, or why they don't
fn check_seconds(name: &str, seconds: f64) -> Result<()> {
    Duration::try_from_secs_f64(seconds)
        .map(|_| ())
        .map_err(|error| ConfigError::Invalid(format!("{} of {}: {}", name, seconds, error)))
}

fn default_clamp() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeleopConfig {
    pub arm: ControllerConfig,
    pub torso: ControllerConfig,
    pub gripper: ControllerConfig,
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,
    /// seconds a movement key press is considered held
    #[serde(default = "default_key_timeout")]
    pub key_timeout: f64,
    /// seconds placed into every trajectory point
    #[serde(default = "default_time_from_start")]
    pub time_from_start: f64,
    #[serde(default = "default_clamp")]
    pub clamp_to_limits: bool,
    #[serde(default)]
    pub base: BaseConfig,
}

lazy_static! {
    static ref INCLUDED: TeleopConfig = {
        let json = include_str!("../config/tiago.json");
        TeleopConfig::parse_json(json).unwrap()
    };
}

impl TeleopConfig {
    /// TIAGo layout packaged with the binary
    pub fn included() -> TeleopConfig {
        INCLUDED.clone()
    }

    pub fn controller(&self, group: ControllerGroup) -> &ControllerConfig {
        match group {
            ControllerGroup::Arm => &self.arm,
            ControllerGroup::Torso => &self.torso,
            ControllerGroup::Gripper => &self.gripper,
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    pub fn key_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.key_timeout)
    }

    pub fn time_from_start(&self) -> Duration {
        Duration::from_secs_f64(self.time_from_start)
    }

    pub fn validate(&self) -> Result<()> {
        if self.arm.joints.is_empty() || self.arm.joints.len() > MAX_ARM_JOINTS {
            return Err(ConfigError::Invalid(format!(
                "arm needs 1 to {} joints, got {}",
                MAX_ARM_JOINTS,
                self.arm.joints.len()
            )));
        }
        if self.torso.joints.is_empty() {
            return Err(ConfigError::Invalid("torso has no joints".to_owned()));
        }
        if self.gripper.joints.is_empty() {
            return Err(ConfigError::Invalid("gripper has no joints".to_owned()));
        }
        for joint in self
            .arm
            .joints
            .iter()
            .chain(&self.torso.joints)
            .chain(&self.gripper.joints)
        {
            if !(joint.lower <= joint.initial && joint.initial <= joint.upper) {
                return Err(ConfigError::Invalid(format!(
                    "joint {} initial position {} outside [{}, {}]",
                    joint.name, joint.initial, joint.lower, joint.upper
                )));
            }
        }
        // torso and gripper joints all receive the first joint's position
        for controller in [&self.torso, &self.gripper] {
            let (lower, upper) = controller.shared_limits();
            let initial = controller.joints[0].initial;
            if !(lower <= initial && initial <= upper) {
                return Err(ConfigError::Invalid(format!(
                    "joints of {} share no range containing {}",
                    controller.action, initial
                )));
            }
        }
        if !(self.rate_hz > 0.0) {
            return Err(ConfigError::Invalid("rate_hz must be positive".to_owned()));
        }
        check_seconds("tick period", 1.0 / self.rate_hz)?;
        if !(self.key_timeout > 0.0) {
            return Err(ConfigError::Invalid(
                "key_timeout must be positive".to_owned(),
            ));
        }
        check_seconds("key_timeout", self.key_timeout)?;
        check_seconds("time_from_start", self.time_from_start)?;
        Ok(())
    }

    pub fn parse_json(text: &str) -> Result<TeleopConfig> {
        let config: TeleopConfig = serde_json::from_str(text)?;
        Ok(config)
    }

    pub fn parse_yaml(text: &str) -> Result<TeleopConfig> {
        let config: TeleopConfig = serde_yaml::from_str(text)?;
        Ok(config)
    }

    pub fn serialize_to_json(&self) -> Result<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json)
    }

    pub fn serialize_to_yaml(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(yaml)
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        fs::write(path, self.serialize_to_json()?)?;
        Ok(())
    }

    pub fn save_yaml(&self, path: &str) -> Result<()> {
        fs::write(path, self.serialize_to_yaml()?)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<TeleopConfig> {
        let text = fs::read_to_string(path)?;
        let config = TeleopConfig::parse_json(&text)?;
        Ok(config)
    }

    pub fn load_yaml(path: &str) -> Result<TeleopConfig> {
        let text = fs::read_to_string(path)?;
        let config = TeleopConfig::parse_yaml(&text)?;
        Ok(config)
    }

    /// Load and validate a config, picking the format from the file extension
    pub fn load(path: &str) -> Result<TeleopConfig> {
        let extension = Path::new(path)
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let config = match extension.as_str() {
            "json" => TeleopConfig::load_json(path)?,
            "yaml" | "yml" => TeleopConfig::load_yaml(path)?,
            other => return Err(ConfigError::UnknownFormat(other.to_owned())),
        };
        config.validate()?;
        Ok(config)
    }
}
