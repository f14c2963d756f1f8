//! Rubble Render - wgpu backend for instance buffers
//!
//! - `WgpuBackend` - implements `RenderBackend`: allocates storage or
//!   uniform buffers, validates batch windows against device limits and
//!   queues buffer writes
//! - `HeadlessContext` - a device and queue without a window surface
//! - `tier_for_limits` - chooses the upload tier a device supports

mod backend;
mod context;
mod headless;

pub use backend::WgpuBackend;
pub use context::{tier_for_limits, RenderError};
pub use headless::HeadlessContext;
