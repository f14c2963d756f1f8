//! Rubble Particles - Debris simulation
//!
//! A fixed-capacity pool of small cubes that burst out of explosions, fall
//! under gravity, land on terrain cells and scroll away:
//! - data-parallel physics writing straight into an instance buffer
//! - bounded, atomically appended landed/dead event lists
//! - landed effects fed back into the terrain
//! - swap-with-last recycling that keeps active particles dense
//! - deferred burst spawning

mod events;
mod particle;
mod spawn;
mod system;

pub use events::BoundedEventList;
pub use particle::{Particle, ParticlePool, DEBRIS_RADIUS, DEBRIS_SCALE};
pub use spawn::SpawnRequest;
pub use system::{ParticleConfig, ParticleCounters, ParticleSystem, TickStage};
