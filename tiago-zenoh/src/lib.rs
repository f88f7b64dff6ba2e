#![doc = include_str!("../../doc_include.md")]

pub mod action_client;
pub mod action_server;
pub mod cli;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod transport;
pub mod velocity;
