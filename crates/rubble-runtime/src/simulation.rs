//! Per-frame orchestration of terrain, debris and their instance buffers

use crate::config::SimConfig;
use rubble_core::{Result, Vec3, WorkerPool};
use rubble_instance::{
    DrawCommands, DrawFilter, InstanceBufferDesc, InstanceBufferManager, MaterialId, MeshId,
    RenderBackend, UploadReport, INSTANCE_RECORD_BYTES,
};
use rubble_particles::{ParticleCounters, ParticleSystem};
use rubble_terrain::TerrainGrid;

/// Mesh/material pairs registered with the backend by the host
#[derive(Debug, Clone, Copy)]
pub struct SimAssets {
    pub terrain_mesh: MeshId,
    pub terrain_material: MaterialId,
    pub debris_mesh: MeshId,
    pub debris_material: MaterialId,
}

/// Summary of one [`Simulation::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub frame: u64,
    pub rows_injected: u64,
    pub debris: ParticleCounters,
}

/// What the renderer consumes after a tick
#[derive(Debug, Clone)]
pub struct FramePresentation {
    pub terrain: DrawCommands,
    pub debris: DrawCommands,
    pub terrain_upload: UploadReport,
    pub debris_upload: UploadReport,
}

/// Owns the terrain, the debris pool and both instance buffers.
///
/// Gameplay requests (bursts, magnet pulses) are deferred and take effect
/// during the next [`Simulation::tick`].
pub struct Simulation {
    terrain: TerrainGrid,
    debris: ParticleSystem,
    terrain_instances: InstanceBufferManager,
    debris_instances: InstanceBufferManager,
    frame: u64,
}

impl Simulation {
    pub fn new(
        config: &SimConfig,
        backend: &mut dyn RenderBackend,
        assets: &SimAssets,
    ) -> Result<Self> {
        config.validate()?;
        let terrain = TerrainGrid::new(config.terrain.clone())?;
        let tier = config.instances.upload_tier(backend.preferred_tier());

        let terrain_instances = InstanceBufferManager::configure(
            backend,
            &InstanceBufferDesc {
                label: "terrain".into(),
                mesh: assets.terrain_mesh,
                material: assets.terrain_material,
                max_instances: terrain.cell_count(),
                instance_byte_size: INSTANCE_RECORD_BYTES,
                tier,
                filter: DrawFilter {
                    cast_shadows: config.instances.terrain_cast_shadows,
                    ..Default::default()
                },
            },
        )?;

        let debris_desc = InstanceBufferDesc {
            label: "debris".into(),
            mesh: assets.debris_mesh,
            material: assets.debris_material,
            max_instances: config.debris.max_particles,
            instance_byte_size: INSTANCE_RECORD_BYTES,
            tier,
            filter: DrawFilter {
                cast_shadows: config.instances.debris_cast_shadows,
                ..Default::default()
            },
        };
        let debris_instances = match InstanceBufferManager::configure(backend, &debris_desc) {
            Ok(manager) => manager,
            Err(e) => {
                terrain_instances.shutdown(backend);
                return Err(e);
            }
        };

        Ok(Self {
            terrain,
            debris: ParticleSystem::new(config.debris.clone()),
            terrain_instances,
            debris_instances,
            frame: 0,
        })
    }

    pub fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    pub fn debris(&self) -> &ParticleSystem {
        &self.debris
    }

    pub fn terrain_instances(&self) -> &InstanceBufferManager {
        &self.terrain_instances
    }

    pub fn debris_instances(&self) -> &InstanceBufferManager {
        &self.debris_instances
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn cell_index_for_position(&self, pos: Vec3) -> Option<usize> {
        self.terrain.cell_index_for_position(pos)
    }

    pub fn request_magnet_pulse(&mut self, prev: Vec3, new: Vec3) {
        self.terrain.request_magnet_pulse(prev, new);
    }

    pub fn request_burst(&mut self, position: Vec3, count: usize, hue: f32) {
        self.debris.request_burst(position, count, hue);
    }

    /// Run every simulation stage of one frame. Returns once all parallel
    /// work has joined.
    pub fn tick(&mut self, dt: f32, workers: &WorkerPool) -> FrameStats {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.frame += 1;

        self.terrain.update(dt, &mut self.terrain_instances, workers);

        let z_displacement = dt * self.terrain.config().scroll_speed;
        let view = self.terrain.view();
        self.debris.update(
            dt,
            &view,
            z_displacement,
            &mut self.debris_instances,
            workers,
        );

        self.debris.apply_landed_effects(&mut self.terrain);
        self.debris.recycle();
        self.debris.apply_spawns();

        let stats = FrameStats {
            frame: self.frame,
            rows_injected: self.terrain.rows_injected(),
            debris: self.debris.counters(),
        };
        log::debug!(
            "[sim] frame {}: {} debris active, {} drawn",
            stats.frame,
            stats.debris.active,
            stats.debris.uploaded
        );
        stats
    }

    /// Upload both instance buffers and build their draw commands
    pub fn present(&mut self, backend: &mut dyn RenderBackend) -> Result<FramePresentation> {
        let terrain_count = self.terrain.cell_count();
        let debris_count = self.debris.render_count();

        let terrain_upload = self.terrain_instances.upload(backend, terrain_count)?;
        let debris_upload = self.debris_instances.upload(backend, debris_count)?;

        Ok(FramePresentation {
            terrain: self.terrain_instances.synthesize_draw_commands(terrain_count),
            debris: self.debris_instances.synthesize_draw_commands(debris_count),
            terrain_upload,
            debris_upload,
        })
    }

    pub fn shutdown(self, backend: &mut dyn RenderBackend) {
        self.terrain_instances.shutdown(backend);
        self.debris_instances.shutdown(backend);
    }
}
