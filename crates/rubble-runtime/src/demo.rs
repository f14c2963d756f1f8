//! Debug drivers that generate bursts and magnet sweeps without gameplay

use crate::config::DemoConfig;
use crate::simulation::Simulation;
use rubble_core::{SimRng, Vec3};

/// Burst height above the grid
const BURST_HEIGHT: f32 = 16.0;
/// Burst scatter around the grid centre, in cells
const BURST_SPREAD_X: f32 = 8.0;
const BURST_SPREAD_Z: f32 = 20.0;

/// A point dragged down one column, pulsing every cell it crosses
#[derive(Debug, Clone, Copy)]
struct Sweeper {
    position: Vec3,
}

/// Fires waves of debris bursts on a timer and optionally sweeps a magnet
/// down the grid.
pub struct BurstDriver {
    config: DemoConfig,
    timer: f32,
    sweeper: Option<Sweeper>,
    rng: SimRng,
    waves: u64,
}

impl BurstDriver {
    pub fn new(config: DemoConfig) -> Self {
        Self {
            rng: SimRng::new(config.seed),
            config,
            timer: 0.0,
            sweeper: None,
            waves: 0,
        }
    }

    pub fn waves_fired(&self) -> u64 {
        self.waves
    }

    /// Issue this frame's requests. Call before [`Simulation::tick`].
    pub fn drive(&mut self, sim: &mut Simulation, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let cols = sim.terrain().cols() as f32;
        let rows = sim.terrain().rows() as f32;

        if self.config.auto_burst {
            self.timer -= dt;
            if self.timer <= 0.0 {
                for _ in 0..self.config.bursts_per_wave {
                    let position = Vec3::new(
                        cols / 2.0 + self.rng.range(-BURST_SPREAD_X, BURST_SPREAD_X),
                        BURST_HEIGHT,
                        rows / 2.0 + self.rng.range(-BURST_SPREAD_Z, BURST_SPREAD_Z),
                    );
                    let hue = self.rng.next_f32();
                    sim.request_burst(position, self.config.particles_per_burst, hue);
                }
                self.waves += 1;
                self.timer = self.config.burst_interval;
                log::debug!("[demo] wave {} fired", self.waves);
            }
        }

        if self.config.magnet_sweep {
            let sweeper = match self.sweeper {
                Some(sweeper) if sweeper.position.z >= 0.0 => sweeper,
                _ => Sweeper {
                    position: Vec3::new(self.rng.range(0.0, cols), 0.0, rows - 1.0),
                },
            };
            let next = sweeper.position - Vec3::Z * self.config.sweep_speed * dt;
            sim.request_magnet_pulse(sweeper.position, next);
            self.sweeper = Some(Sweeper { position: next });
        }
    }
}
