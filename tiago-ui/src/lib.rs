#![doc = include_str!("../../doc_include.md")]

pub mod arm_teleop_app;
pub mod base_teleop_app;
pub mod text_window;
pub use tiago_controller::arm_teleop;
pub use tiago_controller::base_teleop;
pub use tiago_controller::keys;
pub use tiago_controller::teleop_config;
