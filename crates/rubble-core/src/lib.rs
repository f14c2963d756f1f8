//! Rubble Core - Foundational types for the Rubble simulation core
//!
//! This crate provides the pieces every other Rubble crate depends on:
//! - `RubbleError` / `Result` - error taxonomy shared by the workspace
//! - `Rgba`, `hsv_to_rgb`, `smoothstep` - colour and easing helpers
//! - `SimRng` - small deterministic xorshift generator
//! - `WorkerPool` - chunked fork/join over disjoint work items

mod error;
mod parallel;
pub mod rand;
mod types;

pub use error::{Result, RubbleError};
pub use parallel::WorkerPool;
pub use rand::SimRng;
pub use types::{hsv_to_rgb, smoothstep, Rgba};

pub use glam::{Mat3, Vec3, Vec4};
