//! Debris particle state and the dense swap-remove pool

use glam::{Mat3, Vec3};
use rubble_instance::InstanceRecord;

/// Uniform scale of a debris cube
pub const DEBRIS_SCALE: f32 = 0.25;
/// Half the cube height; grounded particles rest this far above the cell
pub const DEBRIS_RADIUS: f32 = DEBRIS_SCALE * 0.5;

/// CPU-side debris state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Orientation and scale
    pub basis: Mat3,
    pub color: Vec3,
    /// Storage index of the terrain cell this particle rests on
    pub ground_cell: Option<usize>,
    /// Small lift that keeps coplanar landed cubes from z-fighting
    pub anti_z: f32,
    pub landed_count: u32,
}

impl Particle {
    pub fn new(position: Vec3, velocity: Vec3, basis: Mat3, color: Vec3) -> Self {
        Self {
            position,
            velocity,
            basis,
            color,
            ground_cell: None,
            anti_z: 0.0,
            landed_count: 0,
        }
    }

    pub fn is_grounded(&self) -> bool {
        self.ground_cell.is_some()
    }

    /// Behind the viewer or fallen through the floor
    pub fn is_dead(&self) -> bool {
        self.position.z < 0.0 || self.position.y < -5.0
    }

    pub fn instance_record(&self) -> InstanceRecord {
        InstanceRecord::from_affine(self.basis, self.position, self.color.extend(1.0))
    }
}

/// Fixed-capacity pool keeping active particles dense in `[0, len)`.
///
/// Removal moves the last active particle into the freed slot, so iteration
/// and instance upload only ever touch a contiguous prefix.
pub struct ParticlePool {
    particles: Vec<Particle>,
    capacity: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.particles.len()
    }

    /// Append a particle; false if the pool is full
    pub fn push(&mut self, particle: Particle) -> bool {
        if self.particles.len() >= self.capacity {
            return false;
        }
        self.particles.push(particle);
        true
    }

    /// Remove `index` by moving the last particle into it; false if out of range
    pub fn swap_remove(&mut self, index: usize) -> bool {
        if index >= self.particles.len() {
            return false;
        }
        self.particles.swap_remove(index);
        true
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn active_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn active_slice_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32) -> Particle {
        Particle::new(Vec3::new(x, 1.0, 1.0), Vec3::ZERO, Mat3::IDENTITY, Vec3::ONE)
    }

    #[test]
    fn pool_push_and_swap_remove() {
        let mut pool = ParticlePool::new(4);
        for i in 0..4 {
            assert!(pool.push(at(i as f32)));
        }
        assert!(!pool.push(at(9.0)));
        assert_eq!(pool.remaining(), 0);

        assert!(pool.swap_remove(1));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.get(1).unwrap().position.x, 3.0);

        assert!(pool.swap_remove(2));
        assert!(!pool.swap_remove(2));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn death_conditions() {
        let mut p = at(1.0);
        assert!(!p.is_dead());
        p.position.z = -0.1;
        assert!(p.is_dead());
        p.position.z = 1.0;
        p.position.y = -5.1;
        assert!(p.is_dead());
    }

    #[test]
    fn record_carries_position_and_opaque_colour() {
        let mut p = at(2.0);
        p.color = Vec3::new(0.5, 0.25, 1.0);
        let rec = p.instance_record();
        assert_eq!(rec.translation(), p.position);
        assert_eq!(rec.color, [0.5, 0.25, 1.0, 1.0]);
    }
}
