//! Core utilities shared by the hello-triangle crates.
//!
//! This crate provides:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Runtime configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::{AppConfig, ENV_FRAMES_IN_FLIGHT, ENV_SHADER, ENV_VALIDATION};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::Timer;
