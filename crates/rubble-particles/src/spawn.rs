//! Deferred burst requests and debris generation

use crate::particle::{Particle, ParticlePool, DEBRIS_SCALE};
use glam::{Mat3, Vec3};
use rubble_core::{hsv_to_rgb, SimRng};
use std::f32::consts::TAU;

/// Launch bias: slightly up and away from the viewer
const LAUNCH_BIAS: Vec3 = Vec3::new(0.0, 1.0, 1.0);

/// A burst of debris requested by gameplay, applied at the end of a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub position: Vec3,
    pub count: usize,
    /// Base hue in `[0, 1)`; each particle jitters around it
    pub hue: f32,
}

/// Append up to `request.count` particles, limited by the pool's free space.
/// Returns how many were spawned.
pub(crate) fn spawn_burst(pool: &mut ParticlePool, request: &SpawnRequest, rng: &mut SimRng) -> usize {
    let count = request.count.min(pool.remaining());
    if count == 0 || !request.position.is_finite() {
        return 0;
    }

    let impulse = rng.range(3.0, 4.0);
    for _ in 0..count {
        let tint = rng.range(0.5, 1.5);
        let color = hsv_to_rgb(request.hue + rng.range(-0.1, 0.1), 1.0, 1.0) * tint;
        let basis =
            Mat3::from_rotation_y(rng.range(0.0, TAU)) * Mat3::from_diagonal(Vec3::splat(DEBRIS_SCALE));
        let velocity = (rng.random_direction() + LAUNCH_BIAS) * impulse * rng.range(1.0, 2.0);
        pool.push(Particle::new(request.position, velocity, basis, color));
    }
    count
}
