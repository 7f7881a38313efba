//! Core utilities for the cube renderer.
//!
//! This crate provides foundational types used across the renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Configuration management

mod config;
mod error;
mod logging;
mod timer;

pub use config::RenderConfig;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
