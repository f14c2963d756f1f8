//! A single terrain column

use glam::{Mat3, Vec3, Vec4};
use rubble_core::{smoothstep, Rgba};
use rubble_instance::InstanceRecord;
use std::f32::consts::TAU;

/// Extra height a fully charged magnet pulse adds
const MAGNET_LIFT: f32 = 1.5;
/// Magnet intensity lost per second
const MAGNET_DECAY: f32 = 3.0;
/// Colour shift towards red at full magnet intensity
const MAGNET_TINT: Vec4 = Vec4::new(1.0, 0.3, 0.3, 0.0);
/// Phase speed multiplier once a cell has been dug
const DUG_PHASE_FACTOR: f32 = 0.3;
/// Height lost on each impact, and the floor it stops at
const DIG_DEPTH: f32 = 0.4;
const DIG_FLOOR: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Column centre on the X axis
    pub x: f32,
    pub h_initial: f32,
    /// Height after the last update, used for collision
    pub height: f32,
    pub phase: f32,
    /// Number of debris impacts
    pub weight: u32,
    pub magnet: f32,
    pub flash: f32,
    pub color: Rgba,
    /// Injection that wrote this cell; 0 = never written
    pub serial: u64,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            x: 0.0,
            h_initial: 0.0,
            height: 0.0,
            phase: 0.0,
            weight: 0,
            magnet: 0.0,
            flash: 0.0,
            color: Vec4::ZERO,
            serial: 0,
        }
    }
}

impl Cell {
    /// Effects of a debris particle landing on this cell for the first time
    pub fn absorb_impact(&mut self) {
        if self.h_initial > DIG_FLOOR {
            self.h_initial = (self.h_initial - DIG_DEPTH).max(DIG_FLOOR);
        }
        self.color *= Vec4::new(0.5, 0.5, 0.5, 1.0);
        self.weight += 1;
        if self.flash <= 0.0 {
            self.flash = 1.0;
        }
    }

    /// Advance the cell's animation by `dt` and build its instance record,
    /// placed at depth `z`.
    pub(crate) fn animate(&mut self, dt: f32, phase_speed: f32, z: f32) -> InstanceRecord {
        let mut color = self.color;
        if self.flash > 0.0 {
            color = color.lerp(Vec4::ONE, self.flash.min(1.0));
        }

        let mut height = self.h_initial + 0.5 + self.phase.sin() * 0.5;
        if self.magnet > 0.0 {
            let alpha = smoothstep(self.magnet);
            height += alpha * MAGNET_LIFT;
            color = color.lerp(color + MAGNET_TINT, alpha);
            self.magnet = (self.magnet - dt * MAGNET_DECAY).max(0.0);
        }
        self.height = height;

        let step = if self.weight > 0 {
            phase_speed * dt * DUG_PHASE_FACTOR
        } else {
            phase_speed * dt
        };
        self.phase = (self.phase + step) % TAU;
        self.flash = (self.flash - dt).max(0.0);

        InstanceRecord::from_affine(
            Mat3::from_diagonal(Vec3::new(1.0, height, 1.0)),
            Vec3::new(self.x, height * 0.5, z),
            color,
        )
    }
}
