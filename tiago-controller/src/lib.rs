#![doc = include_str!("../../doc_include.md")]

pub mod action_client;
pub mod arm_teleop;
pub mod base_odometry;
pub mod base_teleop;
pub mod goal_dispatcher;
pub mod keys;
pub mod simulated_controller;
pub mod teleop_config;
pub mod trajectory;
