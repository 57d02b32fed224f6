#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod errors;
pub mod forwarding;
pub mod ipc;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod session;
pub mod state;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
