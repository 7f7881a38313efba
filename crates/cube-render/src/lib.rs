//! Runtime rendering layer for the cube renderer.
//!
//! This crate builds the presentation targets on top of the negotiated
//! device context and drives the steady-state frame loop:
//! - Depth buffer and per-target resources
//! - Uniform payload computation
//! - Frame scheduling and synchronization
//! - Orchestration and ordered teardown

pub mod depth_buffer;
pub mod geometry;
pub mod renderer;
pub mod scheduler;
pub mod target;
pub mod ubo;

pub use renderer::Renderer;
