//! Headless simulation run

use anyhow::{Context, Result};
use rubble_core::WorkerPool;
use rubble_instance::{RecordingBackend, RenderBackend};
use rubble_render::WgpuBackend;
use rubble_runtime::{
    BurstDriver, FrameClock, FramePresentation, FrameStats, SimAssets, SimConfig, Simulation,
};

use super::config;

pub struct RunArgs {
    pub frames: u64,
    pub dt: f32,
    pub config: Option<String>,
    pub gpu: bool,
    pub auto_burst: bool,
    pub sweep: bool,
    pub threads: usize,
    pub report_every: u64,
}

/// Totals accumulated over a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub simulated_seconds: f64,
    pub peak_active: usize,
    pub total_landed: usize,
    pub total_dead: usize,
    pub vec4s_uploaded: usize,
    pub last_draw_commands: usize,
}

impl RunSummary {
    fn record(&mut self, stats: &FrameStats, frame: &FramePresentation) {
        self.frames = stats.frame;
        self.peak_active = self.peak_active.max(stats.debris.active);
        self.total_landed += stats.debris.just_landed;
        self.total_dead += stats.debris.just_dead;
        self.vec4s_uploaded += frame.terrain_upload.vec4s + frame.debris_upload.vec4s;
        self.last_draw_commands = frame.terrain.commands.len() + frame.debris.commands.len();
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    let mut config = config::load(args.config.as_deref())?;
    config.demo.auto_burst |= args.auto_burst;
    config.demo.magnet_sweep |= args.sweep;

    let workers = WorkerPool::new(args.threads).context("Failed to start worker pool")?;

    let summary = if args.gpu {
        let mut backend = WgpuBackend::headless().context("Failed to create GPU device")?;
        let assets = SimAssets {
            terrain_mesh: backend.register_mesh(),
            terrain_material: backend.register_material(),
            debris_mesh: backend.register_mesh(),
            debris_material: backend.register_material(),
        };
        let summary = simulate(&mut backend, &assets, &config, &args, &workers)?;
        println!("GPU bytes uploaded: {}", backend.bytes_uploaded());
        summary
    } else {
        let mut backend = RecordingBackend::new();
        let assets = SimAssets {
            terrain_mesh: backend.register_mesh(),
            terrain_material: backend.register_material(),
            debris_mesh: backend.register_mesh(),
            debris_material: backend.register_material(),
        };
        simulate(&mut backend, &assets, &config, &args, &workers)?
    };

    println!("Frames: {}", summary.frames);
    println!("Simulated time: {:.2}s", summary.simulated_seconds);
    println!("Peak active debris: {}", summary.peak_active);
    println!("Landed: {}", summary.total_landed);
    println!("Recycled: {}", summary.total_dead);
    println!("Vec4 records uploaded: {}", summary.vec4s_uploaded);
    println!("Draw commands (last frame): {}", summary.last_draw_commands);
    Ok(())
}

/// Drive a simulation on `backend` for `args.frames` frames
pub fn simulate(
    backend: &mut dyn RenderBackend,
    assets: &SimAssets,
    config: &SimConfig,
    args: &RunArgs,
    workers: &WorkerPool,
) -> Result<RunSummary> {
    let mut sim = Simulation::new(config, backend, assets).context("Failed to set up simulation")?;
    let mut driver = BurstDriver::new(config.demo.clone());
    let mut clock = FrameClock::new();
    let mut summary = RunSummary::default();

    for _ in 0..args.frames {
        let dt = clock.advance(args.dt);
        driver.drive(&mut sim, dt);
        let stats = sim.tick(dt, workers);
        let frame = sim
            .present(backend)
            .with_context(|| format!("Failed to present frame {}", stats.frame))?;
        summary.record(&stats, &frame);

        if args.report_every > 0 && stats.frame % args.report_every == 0 {
            log::info!(
                "[run] frame {}: {} active, {} drawn, {} landed, {} recycled",
                stats.frame,
                stats.debris.active,
                stats.debris.uploaded,
                stats.debris.just_landed,
                stats.debris.just_dead
            );
        }
    }

    summary.simulated_seconds = clock.total_time;
    sim.shutdown(backend);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(frames: u64) -> RunArgs {
        RunArgs {
            frames,
            dt: 1.0 / 60.0,
            config: None,
            gpu: false,
            auto_burst: false,
            sweep: false,
            threads: 2,
            report_every: 0,
        }
    }

    fn assets(backend: &mut RecordingBackend) -> SimAssets {
        SimAssets {
            terrain_mesh: backend.register_mesh(),
            terrain_material: backend.register_material(),
            debris_mesh: backend.register_mesh(),
            debris_material: backend.register_material(),
        }
    }

    #[test]
    fn auto_burst_run_spawns_and_lands_debris() {
        let mut backend = RecordingBackend::new();
        let assets = assets(&mut backend);
        let mut config = SimConfig::default();
        config.demo.auto_burst = true;
        let workers = WorkerPool::new(2).unwrap();

        let summary = simulate(&mut backend, &assets, &config, &args(240), &workers).unwrap();
        assert_eq!(summary.frames, 240);
        // one wave on frame 1, a second after three seconds
        assert!(summary.peak_active >= 8 * 512);
        assert!(summary.peak_active <= 2 * 8 * 512);
        assert!(summary.total_landed > 0);
        assert!(summary.vec4s_uploaded > 0);
        assert!((summary.simulated_seconds - 4.0).abs() < 1e-3);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn quiet_run_draws_only_terrain() {
        let mut backend = RecordingBackend::new();
        let assets = assets(&mut backend);
        let workers = WorkerPool::new(1).unwrap();

        let summary =
            simulate(&mut backend, &assets, &SimConfig::default(), &args(3), &workers).unwrap();
        assert_eq!(summary.peak_active, 0);
        assert_eq!(summary.total_landed, 0);
        // 3000 terrain cells over 585-instance windows
        assert_eq!(summary.last_draw_commands, 6);
    }
}
