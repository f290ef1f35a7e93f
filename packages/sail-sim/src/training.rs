//! training.rs — Headless episode runner and generational trainer
//!
//! An episode is a fresh track, one fresh boat per candidate, a fixed number
//! of steps with every candidate piloting its own boat, and one fitness read
//! at the end. A generation scores every candidate over `sims_per_gen`
//! episodes and averages, then breeds the next population from the scores.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::boat::{Boat, HullParams};
use crate::controller::{Controller, LinearPolicy};
use crate::environment::{EnvConfig, Environment};
use crate::error::{Result, SimError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub pop_size: usize,
    pub max_generations: u32,
    /// Tracks each candidate races per generation
    pub sims_per_gen: u32,
    /// Steps per episode; 60 steps is one simulated second
    pub sim_steps: u32,
    pub dt: f64,
    /// Share of the population copied unchanged into the next generation,
    /// rounded to the nearest whole candidate. 0 disables elitism.
    pub elite_fraction: f64,
    /// Per-parameter mutation probability
    pub mutation_rate: f64,
    pub mutation_sigma: f64,
    /// Spread of the initial random weights
    pub init_sigma: f64,
    pub log_every: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            pop_size: 250,
            max_generations: 100,
            sims_per_gen: 10,
            sim_steps: 60 * 20,
            dt: 1.0 / 60.0,
            elite_fraction: 0.1,
            mutation_rate: 0.2,
            mutation_sigma: 0.1,
            init_sigma: 0.5,
            log_every: 10,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pop_size == 0 {
            return Err(SimError::InvalidTraining("pop_size must be at least 1".into()));
        }
        if self.sims_per_gen == 0 {
            return Err(SimError::InvalidTraining("sims_per_gen must be at least 1".into()));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimError::InvalidTraining(format!("dt must be positive, got {}", self.dt)));
        }
        if !(0.0..=1.0).contains(&self.elite_fraction) {
            return Err(SimError::InvalidTraining(format!(
                "elite_fraction must be in [0, 1], got {}",
                self.elite_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(SimError::InvalidTraining(format!(
                "mutation_rate must be in [0, 1], got {}",
                self.mutation_rate
            )));
        }
        let sigmas = [self.mutation_sigma, self.init_sigma];
        if !sigmas.iter().all(|s| s.is_finite() && *s >= 0.0) {
            return Err(SimError::InvalidTraining("mutation sigmas must be finite and non-negative".into()));
        }
        Ok(())
    }

    fn elite_count(&self) -> usize {
        ((self.pop_size as f64 * self.elite_fraction).round() as usize).min(self.pop_size)
    }
}

// ── Episodes ──────────────────────────────────────────────────────────────────

/// Run `steps` steps with `controllers[i]` piloting boat `i`, then read the
/// fitness of every boat. Boats without a controller keep their controls.
pub fn run_episode<C: Controller>(
    env: &mut Environment,
    controllers: &mut [C],
    steps: u32,
    dt: f64,
) -> Vec<f64> {
    for _ in 0..steps {
        let inputs = env.inputs();
        for ((boat, controller), obs) in env.boats_mut().iter_mut().zip(controllers.iter_mut()).zip(&inputs) {
            controller.act(obs).apply(boat);
        }
        env.step(dt);
    }
    env.fitnesses()
}

/// Average fitness of each policy over `cfg.sims_per_gen` random tracks
pub fn evaluate<R: Rng + ?Sized>(
    population: &[LinearPolicy],
    cfg: &TrainingConfig,
    env_cfg: &EnvConfig,
    hull: &HullParams,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let mut totals = vec![0.0; population.len()];
    for sim in 0..cfg.sims_per_gen {
        let boats = (0..population.len())
            .map(|_| Boat::new(*hull))
            .collect::<Result<Vec<_>>>()?;
        let mut env = Environment::with_random_track(env_cfg, rng, boats)?;
        let mut pilots = population.to_vec();
        let fitnesses = run_episode(&mut env, &mut pilots, cfg.sim_steps, cfg.dt);
        for (total, f) in totals.iter_mut().zip(fitnesses) {
            *total += f;
        }
        debug!(sim, "episode finished");
    }
    let n = f64::from(cfg.sims_per_gen);
    Ok(totals.into_iter().map(|t| t / n).collect())
}

// ── Trainer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub best_fitness: f64,
    pub mean_fitness: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub best: LinearPolicy,
    pub best_fitness: f64,
    pub history: Vec<GenerationStats>,
}

/// Evolve linear policies for `cfg.max_generations` generations.
/// Returns the best policy of the final scored generation.
pub fn train<R: Rng + ?Sized>(
    cfg: &TrainingConfig,
    env_cfg: &EnvConfig,
    hull: &HullParams,
    rng: &mut R,
) -> Result<TrainingReport> {
    cfg.validate()?;
    env_cfg.validate()?;
    hull.validate()?;

    let mut population = (0..cfg.pop_size)
        .map(|_| LinearPolicy::random(rng, cfg.init_sigma))
        .collect::<Result<Vec<_>>>()?;

    let mut best = population[0].clone();
    let mut best_fitness = f64::NEG_INFINITY;
    let mut history = Vec::with_capacity(cfg.max_generations as usize);

    for generation in 1..=cfg.max_generations {
        let fitnesses = evaluate(&population, cfg, env_cfg, hull, rng)?;

        let (best_idx, gen_best) = fitnesses
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, f)| if f > acc.1 { (i, f) } else { acc });
        best = population[best_idx].clone();
        best_fitness = gen_best;

        let mean_fitness = fitnesses.iter().sum::<f64>() / fitnesses.len() as f64;
        history.push(GenerationStats { generation, best_fitness, mean_fitness });

        if cfg.log_every > 0 && generation % cfg.log_every == 0 {
            info!("Generation {generation}, best fitness {best_fitness:.3}, mean {mean_fitness:.3}");
        }

        if generation < cfg.max_generations {
            population = next_generation(&population, &fitnesses, cfg, rng)?;
        }
    }

    Ok(TrainingReport { best, best_fitness, history })
}

/// Elites survive unchanged; the rest are mutated crossovers of
/// fitness-proportionally chosen parents.
pub fn next_generation<R: Rng + ?Sized>(
    population: &[LinearPolicy],
    fitnesses: &[f64],
    cfg: &TrainingConfig,
    rng: &mut R,
) -> Result<Vec<LinearPolicy>> {
    let mut ranked: Vec<usize> = (0..population.len()).collect();
    ranked.sort_by(|&a, &b| fitnesses[b].total_cmp(&fitnesses[a]));

    let mut next: Vec<LinearPolicy> = ranked
        .iter()
        .take(cfg.elite_count())
        .map(|&i| population[i].clone())
        .collect();

    while next.len() < cfg.pop_size {
        let a = select_parent(fitnesses, rng);
        let b = select_parent(fitnesses, rng);
        let mut child = LinearPolicy::crossover(&population[a], &population[b], rng);
        child.perturb(rng, cfg.mutation_rate, cfg.mutation_sigma)?;
        next.push(child);
    }
    Ok(next)
}

/// Roulette-wheel pick; fitness is always positive in this environment
fn select_parent<R: Rng + ?Sized>(fitnesses: &[f64], rng: &mut R) -> usize {
    let total: f64 = fitnesses.iter().map(|f| f.max(0.0)).sum();
    if !(total > 0.0 && total.is_finite()) {
        return rng.gen_range(0..fitnesses.len());
    }
    let mut pick = rng.gen_range(0.0..total);
    for (i, f) in fitnesses.iter().enumerate() {
        pick -= f.max(0.0);
        if pick < 0.0 {
            return i;
        }
    }
    fitnesses.len() - 1
}
