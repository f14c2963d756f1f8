//! Rubble Runtime - Frame loop building blocks
//!
//! Ties the simulation crates together:
//! - `Simulation` - owns terrain, debris and both instance buffers; runs the
//!   per-frame stage order and hands draw commands to the renderer
//! - `FrameClock` - clamped frame deltas and a fixed-step accumulator
//! - `SimConfig` - TOML configuration with tolerant number parsing
//! - `BurstDriver` - debug waves of debris and magnet sweeps

mod clock;
mod config;
mod demo;
mod simulation;

pub use clock::{FrameClock, MAX_FRAME_TIME};
pub use config::{DemoConfig, InstanceConfig, SimConfig, TierChoice};
pub use demo::BurstDriver;
pub use simulation::{FramePresentation, FrameStats, SimAssets, Simulation};
