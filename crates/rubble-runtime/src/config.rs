//! Simulation configuration loaded from TOML

use rubble_core::{Result, RubbleError};
use rubble_instance::UploadTier;
use rubble_particles::ParticleConfig;
use rubble_terrain::TerrainConfig;
use serde::Serialize;
use std::path::Path;

/// Largest accepted grid dimensions
const MAX_COLS: usize = 1024;
const MAX_ROWS: usize = 4096;

/// Upload tier selection; `Auto` defers to the render backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierChoice {
    Auto,
    Windowed,
    Unrestricted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceConfig {
    pub tier: TierChoice,
    pub max_window_bytes: usize,
    pub terrain_cast_shadows: bool,
    pub debris_cast_shadows: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            tier: TierChoice::Windowed,
            max_window_bytes: rubble_instance::DEFAULT_WINDOW_BYTES,
            terrain_cast_shadows: true,
            debris_cast_shadows: true,
        }
    }
}

impl InstanceConfig {
    /// Resolve the tier, asking `backend_tier` only for `Auto`
    pub fn upload_tier(&self, backend_tier: UploadTier) -> UploadTier {
        match self.tier {
            TierChoice::Auto => backend_tier,
            TierChoice::Windowed => UploadTier::Windowed {
                max_window_bytes: self.max_window_bytes,
            },
            TierChoice::Unrestricted => UploadTier::Unrestricted,
        }
    }
}

/// Debug drivers that stand in for gameplay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoConfig {
    pub auto_burst: bool,
    /// Seconds between waves
    pub burst_interval: f32,
    pub bursts_per_wave: usize,
    pub particles_per_burst: usize,
    /// Drag a magnet down the grid every frame
    pub magnet_sweep: bool,
    /// Rows per second the magnet travels
    pub sweep_speed: f32,
    pub seed: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            auto_burst: false,
            burst_interval: 3.0,
            bursts_per_wave: 8,
            particles_per_burst: 512,
            magnet_sweep: false,
            sweep_speed: 20.0,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SimConfig {
    pub terrain: TerrainConfig,
    pub debris: ParticleConfig,
    pub instances: InstanceConfig,
    pub demo: DemoConfig,
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::value::Table = toml::from_str(text)?;
        Self::from_toml(&table)
    }

    /// Build from a parsed document. Missing keys keep their defaults,
    /// unknown keys are ignored and numbers are clamped to usable ranges.
    pub fn from_toml(table: &toml::value::Table) -> Result<Self> {
        let mut config = Self::default();

        if let Some(t) = table.get("terrain").and_then(|v| v.as_table()) {
            let terrain = &mut config.terrain;
            if let Some(v) = t.get("cols") {
                terrain.cols = toml_usize(v, terrain.cols).min(MAX_COLS);
            }
            if let Some(v) = t.get("rows") {
                terrain.rows = toml_usize(v, terrain.rows).min(MAX_ROWS);
            }
            if let Some(v) = t.get("scroll_speed") {
                terrain.scroll_speed = toml_f32(v, terrain.scroll_speed).clamp(0.0, 1000.0);
            }
            if let Some(v) = t.get("phase_speed") {
                terrain.phase_speed = toml_f32(v, terrain.phase_speed);
            }
            if let Some(v) = t.get("seed") {
                terrain.seed = toml_u32(v, terrain.seed);
            }
            if let Some(v) = t.get("flat_height") {
                terrain.flat_height = Some(toml_f32(v, 0.0));
            }
        }

        if let Some(t) = table.get("debris").and_then(|v| v.as_table()) {
            let debris = &mut config.debris;
            if let Some(v) = t.get("max_particles") {
                debris.max_particles = toml_usize(v, debris.max_particles).clamp(1, 1 << 20);
            }
            if let Some(v) = t.get("max_landed_per_frame") {
                debris.max_landed_per_frame =
                    toml_usize(v, debris.max_landed_per_frame).clamp(1, 1 << 16);
            }
            if let Some(v) = t.get("max_dead_per_frame") {
                debris.max_dead_per_frame =
                    toml_usize(v, debris.max_dead_per_frame).clamp(1, 1 << 16);
            }
            if let Some(v) = t.get("seed") {
                debris.seed = toml_u32(v, debris.seed);
            }
        }

        if let Some(t) = table.get("instances").and_then(|v| v.as_table()) {
            let instances = &mut config.instances;
            if let Some(v) = t.get("tier") {
                instances.tier = match v.as_str() {
                    Some("auto") => TierChoice::Auto,
                    Some("windowed") => TierChoice::Windowed,
                    Some("unrestricted") => TierChoice::Unrestricted,
                    other => {
                        return Err(RubbleError::InvalidConfig(format!(
                            "instances.tier must be \"auto\", \"windowed\" or \"unrestricted\", got {other:?}"
                        )))
                    }
                };
            }
            if let Some(v) = t.get("max_window_bytes") {
                instances.max_window_bytes = toml_usize(v, instances.max_window_bytes)
                    .clamp(rubble_instance::INSTANCE_RECORD_BYTES, 1 << 30);
            }
            if let Some(v) = t.get("terrain_cast_shadows") {
                instances.terrain_cast_shadows =
                    v.as_bool().unwrap_or(instances.terrain_cast_shadows);
            }
            if let Some(v) = t.get("debris_cast_shadows") {
                instances.debris_cast_shadows =
                    v.as_bool().unwrap_or(instances.debris_cast_shadows);
            }
        }

        if let Some(t) = table.get("demo").and_then(|v| v.as_table()) {
            let demo = &mut config.demo;
            if let Some(v) = t.get("auto_burst") {
                demo.auto_burst = v.as_bool().unwrap_or(demo.auto_burst);
            }
            if let Some(v) = t.get("burst_interval") {
                demo.burst_interval = toml_f32(v, demo.burst_interval).max(0.01);
            }
            if let Some(v) = t.get("bursts_per_wave") {
                demo.bursts_per_wave = toml_usize(v, demo.bursts_per_wave).min(1024);
            }
            if let Some(v) = t.get("particles_per_burst") {
                demo.particles_per_burst = toml_usize(v, demo.particles_per_burst);
            }
            if let Some(v) = t.get("magnet_sweep") {
                demo.magnet_sweep = v.as_bool().unwrap_or(demo.magnet_sweep);
            }
            if let Some(v) = t.get("sweep_speed") {
                demo.sweep_speed = toml_f32(v, demo.sweep_speed).max(0.0);
            }
            if let Some(v) = t.get("seed") {
                demo.seed = toml_u32(v, demo.seed);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.terrain.cols == 0 || self.terrain.rows == 0 {
            return Err(RubbleError::InvalidConfig(format!(
                "terrain grid {}x{} has no cells",
                self.terrain.cols, self.terrain.rows
            )));
        }
        Ok(())
    }

    /// Render back to TOML, e.g. to print the effective configuration
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

fn toml_f32(v: &toml::Value, default: f32) -> f32 {
    v.as_float()
        .map(|f| f as f32)
        .or_else(|| v.as_integer().map(|i| i as f32))
        .filter(|f| f.is_finite())
        .unwrap_or(default)
}

fn toml_usize(v: &toml::Value, default: usize) -> usize {
    v.as_integer()
        .or_else(|| v.as_float().map(|f| f as i64))
        .map(|i| i.max(0) as usize)
        .unwrap_or(default)
}

fn toml_u32(v: &toml::Value, default: u32) -> u32 {
    match v.as_integer().map(u32::try_from) {
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            log::warn!("[config] {v} does not fit in u32; keeping {default:#x}");
            default
        }
        None => default,
    }
}
