//! main.rs — Sailing simulator entry point
//!
//! Two modes:
//!   1. `--train`: headless evolution of linear pilots; the best one is saved
//!      to `--filename`
//!   2. default: live race. Boat 0 is steered from the WebSocket control
//!      panel, one more boat per policy in the colon-separated `--filename`

mod race;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::RwLock;
use tracing::info;

use sail_sim::config::FullConfig;
use sail_sim::scenarios::Preset;
use sail_sim::training;
use sail_sim::LinearPolicy;

use race::RaceState;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sail-sim", about = "Very physics-based boat sim: train pilots or race them")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Train a new pilot instead of racing
    #[arg(long)]
    train: bool,
    /// Policy file to save (training) or colon-separated files to race, e.g. a.json:b.json
    #[arg(long, default_value = "models/model.json")]
    filename: String,
    /// Wind preset: basic, light_air, strong_breeze, northerly
    #[arg(long, default_value = "basic")]
    preset: String,
    /// Seed for tracks and training; random when absent
    #[arg(long)]
    seed: Option<u64>,
    /// (training only) population size
    #[arg(long)]
    pop_size: Option<usize>,
    /// (training only) number of generations
    #[arg(long)]
    max_generations: Option<u32>,
    /// (training only) tracks each pilot races per generation
    #[arg(long)]
    sims_per_gen: Option<u32>,
    /// (training only) steps per training race, 60 steps is 1 second
    #[arg(long)]
    sim_steps: Option<u32>,
    /// (race only) simulation speed multiplier
    #[arg(long)]
    speed: Option<f64>,
    /// (race only) control panel WebSocket port
    #[arg(long)]
    ctrl_port: Option<u16>,
}

impl Args {
    fn apply_overrides(&self, cfg: &mut FullConfig) -> anyhow::Result<()> {
        let t = &mut cfg.training;
        if let Some(v) = self.pop_size { t.pop_size = v; }
        if let Some(v) = self.max_generations { t.max_generations = v; }
        if let Some(v) = self.sims_per_gen { t.sims_per_gen = v; }
        if let Some(v) = self.sim_steps { t.sim_steps = v; }
        t.validate()?;

        let s = &mut cfg.simulation;
        if let Some(v) = self.speed { s.sim_speed = v; }
        if let Some(v) = self.ctrl_port { s.ctrl_port = v; }
        if self.seed.is_some() { s.seed = self.seed; }
        s.validate()?;

        cfg.environment = Preset::parse(&self.preset)?.apply(&cfg.environment);
        Ok(())
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sail_sim=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut cfg = FullConfig::load(&args.config).context("loading config")?;
    args.apply_overrides(&mut cfg)?;

    info!("Parsed CLI (preset={}, seed={:?})", args.preset, cfg.simulation.seed);

    let rng = match cfg.simulation.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    if args.train {
        run_training(cfg, rng, args.filename).await
    } else {
        run_race(cfg, rng, &args.filename).await
    }
}

async fn run_training(cfg: FullConfig, mut rng: StdRng, out: String) -> anyhow::Result<()> {
    info!(
        "🏋 Training {} pilots for {} generations ({} tracks × {} steps each)",
        cfg.training.pop_size, cfg.training.max_generations, cfg.training.sims_per_gen, cfg.training.sim_steps
    );

    let report = tokio::task::spawn_blocking(move || {
        training::train(&cfg.training, &cfg.environment, &cfg.boat, &mut rng)
    })
    .await
    .context("training task panicked")??;

    info!("Best fitness {:.3}", report.best_fitness);
    if let Some(dir) = Path::new(&out).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    report.best.save(&out)?;
    info!("Done");
    Ok(())
}

async fn run_race(cfg: FullConfig, rng: StdRng, filenames: &str) -> anyhow::Result<()> {
    let pilots = LinearPolicy::load_many(filenames).context("loading pilots")?;
    info!("⛵ Racing user boat against {} pilot(s)", pilots.len());

    let state = RaceState::new(cfg.environment, cfg.boat, pilots, rng, cfg.simulation.sim_speed)?;
    let shared = Arc::new(RwLock::new(state));
    race::serve(shared, cfg.simulation.update_rate_hz, cfg.simulation.ctrl_port).await
}
