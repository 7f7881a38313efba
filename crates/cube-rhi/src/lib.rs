//! Vulkan abstraction layer for the cube renderer.
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance creation and driver diagnostics
//! - Physical device selection and capability negotiation
//! - Logical device and queue management
//! - Swapchain creation
//! - Buffer, descriptor and pipeline management
//! - Synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod diagnostics;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
