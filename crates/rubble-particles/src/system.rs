//! Per-tick debris simulation: physics, terrain feedback, recycling, spawning

use crate::events::BoundedEventList;
use crate::particle::{Particle, ParticlePool, DEBRIS_RADIUS};
use crate::spawn::{spawn_burst, SpawnRequest};
use glam::Vec3;
use rubble_core::{SimRng, WorkerPool};
use rubble_instance::InstanceBufferManager;
use rubble_terrain::{TerrainGrid, TerrainView};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Particles simulated per parallel job
const PHYSICS_CHUNK: usize = 256;
const GRAVITY: f32 = 16.0;
/// A grounded particle is thrown off while its cell's magnet intensity is
/// strictly inside this window
const RELAUNCH_WINDOW: (f32, f32) = (0.5, 1.0);
const RELAUNCH_UP: f32 = 8.0;
const RELAUNCH_SPREAD: f32 = 2.0;
/// Landed cubes get `(index % 32) * ANTI_Z_STEP` extra height
const ANTI_Z_STEP: f32 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticleConfig {
    pub max_particles: usize,
    pub max_landed_per_frame: usize,
    pub max_dead_per_frame: usize,
    pub seed: u32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            max_particles: 16 * 1024,
            max_landed_per_frame: 256,
            max_dead_per_frame: 256,
            seed: 0x2211_2003,
        }
    }
}

/// Which stage of the tick ran last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    /// Ready for physics
    Idle,
    Simulated,
    LandedApplied,
    Recycled,
}

/// Point-in-time copy of the system's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParticleCounters {
    pub active: usize,
    pub just_landed: usize,
    pub just_dead: usize,
    pub uploaded: usize,
}

/// Pool of debris cubes that fly, land on the terrain, dig into it and get
/// recycled once they scroll out of view.
///
/// Each tick must run [`update`](Self::update),
/// [`apply_landed_effects`](Self::apply_landed_effects),
/// [`recycle`](Self::recycle) and [`apply_spawns`](Self::apply_spawns) in that
/// order. A stage called out of order is logged and skipped.
pub struct ParticleSystem {
    config: ParticleConfig,
    pool: ParticlePool,
    spawn_queue: Vec<SpawnRequest>,
    landed: BoundedEventList,
    dead: BoundedEventList,
    uploaded: AtomicUsize,
    stage: TickStage,
    frame: u32,
    rng: SimRng,
}

impl ParticleSystem {
    pub fn new(config: ParticleConfig) -> Self {
        log::info!(
            "[particles] pool of {} debris, {} landed / {} dead events per frame",
            config.max_particles,
            config.max_landed_per_frame,
            config.max_dead_per_frame
        );
        Self {
            pool: ParticlePool::new(config.max_particles),
            spawn_queue: Vec::new(),
            landed: BoundedEventList::new(config.max_landed_per_frame),
            dead: BoundedEventList::new(config.max_dead_per_frame),
            uploaded: AtomicUsize::new(0),
            stage: TickStage::Idle,
            frame: 0,
            rng: SimRng::new(config.seed),
            config,
        }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn active_count(&self) -> usize {
        self.pool.len()
    }

    pub fn particles(&self) -> &[Particle] {
        self.pool.active_slice()
    }

    pub fn stage(&self) -> TickStage {
        self.stage
    }

    /// Instances written by the last physics pass; what should be drawn
    pub fn render_count(&self) -> usize {
        self.uploaded.load(Ordering::Relaxed)
    }

    pub fn counters(&self) -> ParticleCounters {
        ParticleCounters {
            active: self.pool.len(),
            just_landed: self.landed.reserved(),
            just_dead: self.dead.reserved(),
            uploaded: self.render_count(),
        }
    }

    /// Cells recorded as landed on during the last physics pass
    pub fn landed_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.landed.iter().map(|c| c as usize)
    }

    /// Particle indices recorded as dead during the last physics pass
    pub fn dead_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.dead.iter().map(|i| i as usize)
    }

    pub fn pending_spawns(&self) -> &[SpawnRequest] {
        &self.spawn_queue
    }

    /// Queue a burst; it is spawned by the next [`apply_spawns`](Self::apply_spawns)
    pub fn request_burst(&mut self, position: Vec3, count: usize, hue: f32) {
        if count == 0 {
            return;
        }
        self.spawn_queue.push(SpawnRequest {
            position,
            count,
            hue,
        });
    }

    fn enter(&mut self, expected: TickStage, next: TickStage, name: &str) -> bool {
        if self.stage != expected {
            log::warn!(
                "[particles] {name} called after {:?}, expected {:?}; skipped",
                self.stage,
                expected
            );
            return false;
        }
        self.stage = next;
        true
    }

    /// Integrate every active particle, collide against the terrain, write
    /// instance records and collect landed/dead events.
    pub fn update(
        &mut self,
        dt: f32,
        terrain: &TerrainView<'_>,
        z_displacement: f32,
        instances: &mut InstanceBufferManager,
        workers: &WorkerPool,
    ) {
        if !self.enter(TickStage::Idle, TickStage::Simulated, "update") {
            return;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let z_displacement = if z_displacement.is_finite() {
            z_displacement
        } else {
            0.0
        };

        self.landed.reset();
        self.dead.reset();
        self.frame = self.frame.wrapping_add(1);

        let active = self.pool.len();
        let seed = self.config.seed ^ self.frame.wrapping_mul(0x0100_0193);
        let step = Step {
            dt,
            z_displacement,
            terrain,
            landed: &self.landed,
        };
        let dead = &self.dead;

        let (jobs, rest) = instances.zip_chunks_mut(self.pool.active_slice_mut(), PHYSICS_CHUNK);
        workers.run_chunks(jobs, |(particles, mut writer)| {
            let base = writer.base();
            let mut rng = SimRng::stream(seed, base as u32);
            for (local, particle) in particles.iter_mut().enumerate() {
                let index = base + local;
                step.advance(particle, index, &mut rng);
                writer.write(local, &particle.instance_record());
                if particle.is_dead() {
                    dead.push(index as u32);
                }
            }
        });

        if !rest.is_empty() {
            let first = active - rest.len();
            let mut rng = SimRng::stream(seed, first as u32);
            for (i, particle) in rest.iter_mut().enumerate() {
                step.advance(particle, first + i, &mut rng);
                if particle.is_dead() {
                    dead.push((first + i) as u32);
                }
            }
        }

        self.uploaded.store(active, Ordering::Relaxed);

        if self.landed.dropped() > 0 || self.dead.dropped() > 0 {
            log::trace!(
                "[particles] dropped {} landed / {} dead events over capacity",
                self.landed.dropped(),
                self.dead.dropped()
            );
        }
        log::debug!(
            "[particles] frame {}: {} active, {} landed, {} dead",
            self.frame,
            active,
            self.landed.reserved(),
            self.dead.reserved()
        );
    }

    /// Dig, darken and flash every cell recorded in the landed list
    pub fn apply_landed_effects(&mut self, terrain: &mut TerrainGrid) {
        if !self.enter(
            TickStage::Simulated,
            TickStage::LandedApplied,
            "apply_landed_effects",
        ) {
            return;
        }
        for cell in self.landed.iter() {
            if let Some(cell) = terrain.cell_mut(cell as usize) {
                cell.absorb_impact();
            }
        }
    }

    /// Remove every recorded dead particle, keeping the active range dense
    pub fn recycle(&mut self) {
        if !self.enter(TickStage::LandedApplied, TickStage::Recycled, "recycle") {
            return;
        }
        // Highest first, so a tail particle moved into a hole is never itself
        // a pending removal.
        let mut dead: Vec<usize> = self.dead.iter().map(|i| i as usize).collect();
        dead.sort_unstable_by(|a, b| b.cmp(a));
        dead.dedup();
        let before = self.pool.len();
        for index in dead {
            self.pool.swap_remove(index);
        }
        if before != self.pool.len() {
            log::debug!(
                "[particles] recycled {} debris",
                before - self.pool.len()
            );
        }
    }

    /// Spawn every queued burst, dropping whatever does not fit
    pub fn apply_spawns(&mut self) {
        if !self.enter(TickStage::Recycled, TickStage::Idle, "apply_spawns") {
            return;
        }
        for request in std::mem::take(&mut self.spawn_queue) {
            let spawned = spawn_burst(&mut self.pool, &request, &mut self.rng);
            if spawned < request.count {
                log::trace!(
                    "[particles] burst of {} truncated to {} (pool full)",
                    request.count,
                    spawned
                );
            }
        }
    }
}

/// Shared read-only inputs of one physics pass
struct Step<'a, 'v> {
    dt: f32,
    z_displacement: f32,
    terrain: &'a TerrainView<'v>,
    landed: &'a BoundedEventList,
}

impl Step<'_, '_> {
    fn advance(&self, p: &mut Particle, index: usize, rng: &mut SimRng) {
        if let Some(cell_index) = p.ground_cell {
            p.position.z -= self.z_displacement;
            if let Some(cell) = self.terrain.cell(cell_index) {
                p.position.y = cell.height + DEBRIS_RADIUS + p.anti_z;
                let (low, high) = RELAUNCH_WINDOW;
                if cell.magnet > low && cell.magnet < high {
                    p.velocity = Vec3::new(
                        rng.range(-RELAUNCH_SPREAD, RELAUNCH_SPREAD),
                        RELAUNCH_UP,
                        rng.range(-RELAUNCH_SPREAD, RELAUNCH_SPREAD),
                    );
                    p.ground_cell = None;
                }
            }
            return;
        }

        p.position += p.velocity * self.dt;
        p.position.z -= self.z_displacement;
        p.velocity.y -= GRAVITY * self.dt;

        let Some(cell_index) = self.terrain.cell_index_for_position(p.position) else {
            return;
        };
        let Some(cell) = self.terrain.cell(cell_index) else {
            return;
        };
        if p.position.y > cell.height {
            return;
        }

        p.anti_z = (index & 31) as f32 * ANTI_Z_STEP;
        p.position.y = cell.height + DEBRIS_RADIUS + p.anti_z;
        p.ground_cell = Some(cell_index);
        p.landed_count += 1;
        if p.landed_count == 1 {
            p.color *= 0.5;
            self.landed.push(cell_index as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat3;
    use proptest::prelude::*;
    use rubble_instance::{
        DrawFilter, InstanceBufferDesc, RecordingBackend, UploadTier, INSTANCE_RECORD_BYTES,
    };
    use rubble_terrain::TerrainConfig;

    const DT: f32 = 1.0 / 60.0;

    struct Rig {
        terrain: TerrainGrid,
        system: ParticleSystem,
        instances: InstanceBufferManager,
        workers: WorkerPool,
    }

    impl Rig {
        fn new(max_particles: usize) -> Self {
            let terrain = TerrainGrid::new(TerrainConfig {
                flat_height: Some(0.0),
                ..Default::default()
            })
            .unwrap();
            let mut backend = RecordingBackend::new();
            let desc = InstanceBufferDesc {
                label: "debris".into(),
                mesh: backend.register_mesh(),
                material: backend.register_material(),
                max_instances: max_particles,
                instance_byte_size: INSTANCE_RECORD_BYTES,
                tier: UploadTier::Windowed {
                    max_window_bytes: 65536,
                },
                filter: DrawFilter::default(),
            };
            Self {
                terrain,
                system: ParticleSystem::new(ParticleConfig {
                    max_particles,
                    ..Default::default()
                }),
                instances: InstanceBufferManager::configure(&mut backend, &desc).unwrap(),
                workers: WorkerPool::new(4).unwrap(),
            }
        }

        fn physics(&mut self, dt: f32, z_displacement: f32) {
            let view = self.terrain.view();
            self.system
                .update(dt, &view, z_displacement, &mut self.instances, &self.workers);
        }

        fn finish_tick(&mut self) {
            self.system.apply_landed_effects(&mut self.terrain);
            self.system.recycle();
            self.system.apply_spawns();
        }

        fn tick(&mut self, dt: f32) {
            self.physics(dt, 0.0);
            self.finish_tick();
        }

        fn place(&mut self, position: Vec3) {
            let p = Particle::new(position, Vec3::ZERO, Mat3::IDENTITY, Vec3::ONE);
            assert!(self.system.pool.push(p));
        }
    }

    #[test]
    fn burst_takes_flight_on_the_following_tick() {
        let mut rig = Rig::new(16 * 1024);
        rig.system.request_burst(Vec3::new(15.0, 16.0, 50.0), 512, 0.6);
        assert_eq!(rig.system.active_count(), 0);

        rig.tick(DT);
        assert_eq!(rig.system.active_count(), 512);
        assert_eq!(rig.system.render_count(), 0);

        rig.physics(DT, 0.0);
        assert_eq!(rig.system.render_count(), 512);
        assert!(rig.system.particles().iter().all(|p| !p.is_grounded()));
        assert_eq!(rig.system.landed_cells().count(), 0);
        for (i, p) in rig.system.particles().iter().enumerate() {
            let record = rig.instances.record(i).unwrap();
            assert_eq!(record.translation(), p.position);
        }
        assert_eq!(rig.instances.record(512), Some(Default::default()));
    }

    #[test]
    fn particle_at_floor_height_lands_once() {
        let mut rig = Rig::new(64);
        rig.place(Vec3::new(3.5, 0.0, 10.0));
        rig.physics(DT, 0.0);

        let p = rig.system.particles()[0];
        assert!(p.is_grounded());
        assert_eq!(p.landed_count, 1);
        assert_eq!(p.color, Vec3::splat(0.5));
        assert_eq!(p.position.y, DEBRIS_RADIUS);

        let landed: Vec<usize> = rig.system.landed_cells().collect();
        let cell = rig
            .terrain
            .cell_index_for_position(Vec3::new(3.5, 0.0, 10.0))
            .unwrap();
        assert_eq!(landed, vec![cell]);

        rig.finish_tick();
        let c = rig.terrain.cell(cell).unwrap();
        assert_eq!(c.weight, 1);
        assert_eq!(c.flash, 1.0);

        // Staying grounded does not report the cell again
        rig.tick(DT);
        assert_eq!(rig.system.landed_cells().count(), 0);
        assert_eq!(rig.system.particles()[0].landed_count, 1);
    }

    #[test]
    fn particle_behind_the_viewer_is_recycled() {
        let mut rig = Rig::new(64);
        rig.place(Vec3::new(1.5, 10.0, -0.1));
        rig.place(Vec3::new(2.5, 10.0, 5.0));
        rig.place(Vec3::new(4.5, 10.0, 6.0));

        rig.physics(0.0, 0.0);
        assert_eq!(rig.system.dead_indices().collect::<Vec<_>>(), vec![0]);

        rig.finish_tick();
        assert_eq!(rig.system.active_count(), 2);
        assert_eq!(rig.system.particles()[0].position.x, 4.5);
        assert_eq!(rig.system.particles()[1].position.x, 2.5);
    }

    #[test]
    fn scrolling_carries_grounded_and_flying_debris() {
        let mut rig = Rig::new(64);
        rig.place(Vec3::new(3.5, 0.0, 0.3));
        rig.place(Vec3::new(5.5, 10.0, 20.0));
        rig.tick(DT);

        let grounded = rig.system.particles()[0];
        let cell = grounded.ground_cell.unwrap();
        let flying = rig.system.particles()[1];
        assert!(!flying.is_grounded());
        assert_eq!(grounded.position.z, 0.3);

        rig.physics(DT, 0.5);
        let after = rig.system.particles();

        // Grounded debris moves in lockstep with its cell and stays on it
        assert!((after[0].position.z - (0.3 - 0.5)).abs() < 1e-6);
        assert_eq!(after[0].ground_cell, Some(cell));
        let height = rig.terrain.cell(cell).unwrap().height;
        assert_eq!(after[0].position.y, height + DEBRIS_RADIUS + after[0].anti_z);

        // Flying debris integrates its velocity, then scrolls
        let expected_y = flying.position.y + flying.velocity.y * DT;
        assert!((after[1].position.z - 19.5).abs() < 1e-6);
        assert!((after[1].position.y - expected_y).abs() < 1e-6);
        assert!(after[1].position.y < flying.position.y);

        // Scrolling past the viewer kills the grounded particle only
        assert_eq!(rig.system.dead_indices().collect::<Vec<_>>(), vec![0]);
        rig.finish_tick();
        assert_eq!(rig.system.active_count(), 1);
        assert_eq!(rig.system.particles()[0].position.x, 5.5);
    }

    #[test]
    fn magnet_pulse_throws_grounded_debris() {
        let mut rig = Rig::new(64);
        rig.place(Vec3::new(3.5, 0.0, 10.0));
        rig.tick(DT);
        let cell = rig.system.particles()[0].ground_cell.unwrap();

        rig.terrain.cell_mut(cell).unwrap().magnet = 0.9;
        rig.tick(DT);
        let p = rig.system.particles()[0];
        assert!(!p.is_grounded());
        assert_eq!(p.velocity.y, RELAUNCH_UP);

        // Full intensity is outside the open window
        let mut rig = Rig::new(64);
        rig.place(Vec3::new(3.5, 0.0, 10.0));
        rig.tick(DT);
        let cell = rig.system.particles()[0].ground_cell.unwrap();
        rig.terrain.cell_mut(cell).unwrap().magnet = 1.0;
        rig.tick(DT);
        assert!(rig.system.particles()[0].is_grounded());
    }

    #[test]
    fn out_of_order_stages_are_skipped() {
        let mut rig = Rig::new(8);
        rig.place(Vec3::new(1.5, 10.0, -1.0));
        rig.system.recycle();
        assert_eq!(rig.system.stage(), TickStage::Idle);
        assert_eq!(rig.system.active_count(), 1);

        rig.physics(DT, 0.0);
        rig.physics(DT, 0.0);
        assert_eq!(rig.system.stage(), TickStage::Simulated);
        rig.system.apply_spawns();
        assert_eq!(rig.system.stage(), TickStage::Simulated);
    }

    #[test]
    fn spawn_overflow_is_truncated() {
        let mut rig = Rig::new(100);
        rig.system.request_burst(Vec3::new(15.0, 16.0, 50.0), 80, 0.1);
        rig.system.request_burst(Vec3::new(15.0, 16.0, 50.0), 80, 0.2);
        rig.system.request_burst(Vec3::new(15.0, 16.0, 50.0), 0, 0.2);
        assert_eq!(rig.system.pending_spawns().len(), 2);
        rig.tick(DT);
        assert_eq!(rig.system.active_count(), 100);
        assert!(rig.system.pending_spawns().is_empty());
    }

    #[test]
    fn landed_events_beyond_capacity_are_counted_not_stored() {
        let mut rig = Rig::new(1024);
        for i in 0..300 {
            let x = (i % 30) as f32 + 0.5;
            let z = (i / 30) as f32 + 1.0;
            rig.place(Vec3::new(x, 0.0, z));
        }
        rig.physics(DT, 0.0);
        let counters = rig.system.counters();
        assert_eq!(counters.just_landed, 300);
        assert_eq!(rig.system.landed_cells().count(), 256);

        rig.finish_tick();
        let dug: u32 = rig.terrain.cells().iter().map(|c| c.weight).sum();
        assert_eq!(dug, 256);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn recycle_removes_exactly_the_dead(flags in proptest::collection::vec(any::<bool>(), 0..600)) {
            let mut rig = Rig::new(1024);
            for (i, dead) in flags.iter().enumerate() {
                let z = if *dead { -1.0 } else { 50.0 };
                // x tags the particle so survivors can be identified
                rig.place(Vec3::new(i as f32, 10.0, z));
            }
            rig.physics(0.0, 0.0);
            let dead_count = flags.iter().filter(|d| **d).count();
            let recorded = dead_count.min(256);
            rig.finish_tick();

            prop_assert_eq!(rig.system.active_count(), flags.len() - recorded);
            let mut survivors: Vec<usize> = rig
                .system
                .particles()
                .iter()
                .map(|p| p.position.x as usize)
                .collect();
            survivors.sort_unstable();
            let before = survivors.len();
            survivors.dedup();
            prop_assert_eq!(before, survivors.len());

            let alive: Vec<usize> = (0..flags.len()).filter(|i| !flags[*i]).collect();
            for i in &alive {
                prop_assert!(survivors.binary_search(i).is_ok());
            }
            if dead_count <= 256 {
                prop_assert_eq!(survivors, alive);
            }
        }
    }
}
