//! Frame clock with clamped deltas and an optional fixed-step accumulator

use std::time::Instant;

/// Longest frame the simulation will integrate in one step
pub const MAX_FRAME_TIME: f32 = 0.25;

/// Tracks simulation time. Either driven from the wall clock with
/// [`FrameClock::tick`] or stepped explicitly with [`FrameClock::advance`]
/// for headless and deterministic runs.
pub struct FrameClock {
    /// Total elapsed simulation time in seconds
    pub total_time: f64,
    /// Time since last frame in seconds, clamped to [`MAX_FRAME_TIME`]
    pub delta_time: f32,
    /// Fixed timestep interval (default: 1/60 second)
    pub fixed_timestep: f32,
    pub frame: u64,
    accumulator: f32,
    last_instant: Option<Instant>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            delta_time: 0.0,
            fixed_timestep: 1.0 / 60.0,
            frame: 0,
            accumulator: 0.0,
            last_instant: None,
        }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixed_timestep(hz: f32) -> Self {
        Self {
            fixed_timestep: 1.0 / hz.max(1.0),
            ..Self::default()
        }
    }

    /// Advance by wall-clock time since the previous call. The first call
    /// yields a zero delta.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = match self.last_instant.replace(now) {
            Some(last) => now.duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.advance(elapsed)
    }

    /// Advance by `elapsed` seconds and return the clamped delta
    pub fn advance(&mut self, elapsed: f32) -> f32 {
        let dt = if elapsed.is_finite() {
            elapsed.clamp(0.0, MAX_FRAME_TIME)
        } else {
            0.0
        };
        self.delta_time = dt;
        self.total_time += dt as f64;
        self.accumulator += dt;
        self.frame += 1;
        dt
    }

    /// Returns true if there's enough accumulated time for a fixed update step
    pub fn should_fixed_update(&self) -> bool {
        self.accumulator >= self.fixed_timestep
    }

    /// Consume one fixed timestep from the accumulator
    pub fn consume_fixed_step(&mut self) {
        self.accumulator -= self.fixed_timestep;
    }
}
