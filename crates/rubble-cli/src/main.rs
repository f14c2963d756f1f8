//! Rubble CLI - run and inspect the debris simulation headlessly

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{config, layout, run};

#[derive(Parser)]
#[command(name = "rubble")]
#[command(about = "Scrolling terrain and debris simulation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation headlessly for a number of frames
    Run {
        /// Number of frames to simulate
        #[arg(long, default_value = "600")]
        frames: u64,

        /// Seconds per frame
        #[arg(long, default_value = "0.016666668")]
        dt: f32,

        /// Path to a TOML config file
        #[arg(long)]
        config: Option<String>,

        /// Upload through a wgpu device instead of the in-memory backend
        #[arg(long)]
        gpu: bool,

        /// Fire debris waves on a timer
        #[arg(long)]
        auto_burst: bool,

        /// Drag a magnet down the grid
        #[arg(long)]
        sweep: bool,

        /// Simulation worker threads (0 = one per core)
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Print a summary every N frames (0 = only at the end)
        #[arg(long, default_value = "60")]
        report_every: u64,
    },

    /// Print the window layout for an instance buffer
    Layout {
        /// Number of instances the buffer must hold
        capacity: usize,

        /// Bytes per instance
        #[arg(long, default_value = "112")]
        instance_bytes: usize,

        /// Window size cap in bytes
        #[arg(long, default_value = "65536")]
        window_bytes: usize,

        /// Use one raw window instead of constant-buffer windows
        #[arg(long)]
        unrestricted: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            frames,
            dt,
            config,
            gpu,
            auto_burst,
            sweep,
            threads,
            report_every,
        } => run::run(run::RunArgs {
            frames,
            dt,
            config,
            gpu,
            auto_burst,
            sweep,
            threads,
            report_every,
        }),
        Commands::Layout {
            capacity,
            instance_bytes,
            window_bytes,
            unrestricted,
        } => layout::run(layout::LayoutArgs {
            capacity,
            instance_bytes,
            window_bytes,
            unrestricted,
        }),
        Commands::Config { config } => config::run(config.as_deref()),
    }
}
