//! Platform layer for the cube renderer.
//!
//! Window creation and Vulkan surface plumbing: the rest of the renderer
//! consumes a drawing surface and the instance extensions it requires, and
//! observes close requests through the winit event loop.

mod window;

pub use window::{Surface, Window};
