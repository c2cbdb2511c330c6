use crate::illness::Illness;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Simulation and policy-search configuration.
///
/// Loaded from a TOML file; see [`Config::from_file`]. The `search` table is
/// only required by the `optimize` subcommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub simulation: SimParams,
    pub search: Option<SearchParams>,
}

/// Engine construction parameters.
///
/// Beyond the structural checks serde performs, values are taken literally:
/// degenerate settings (negative durations, probabilities outside `[0, 1]`
/// after effect adjustments) yield degenerate but well-defined runs. The one
/// fatal precondition, `n_initial_cases <= population_size`, is enforced by
/// the engine at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    /// Number of agents.
    pub population_size: usize,
    /// Maximum number of ticks per run.
    pub simulation_time: i32,
    /// Exact number of agents ill at tick 0.
    pub n_initial_cases: usize,
    /// Exact number of agents vaccinated at tick 0.
    pub vaccine_policy: usize,

    /// Ticks a vaccinated agent spends quarantined before release.
    pub quarantine_duration_vaccinated: i32,
    /// Ticks an unvaccinated agent spends quarantined before release.
    pub quarantine_duration_unvaccinated: i32,
    /// Ticks after infection onset before quarantine begins.
    pub days_until_quarantine: i32,
    /// Ticks after infection onset before a vaccinated agent recovers.
    pub recovery_delay_vaccinated: i32,
    /// Ticks after infection onset before an unvaccinated agent recovers.
    pub recovery_delay_unvaccinated: i32,
    /// Reinfection lockout window after an infection onset.
    pub immunity_window: i32,
    /// Decay base of the acquired-immunity effect on reinfection probability.
    pub immunity_factor: f64,

    /// Spatial infection radius, in grid units of rectilinear distance.
    pub contagion_distance: i32,
    /// Grid extent per axis; coordinates live in `[0, max_position]` on a torus.
    pub max_position: i32,

    pub illness: Illness,
    /// Per-tick probability for an unvaccinated agent to get vaccinated.
    pub vaccination_rate: f64,
    /// Subtracted from the illness's vaccine resistance in the infection check.
    pub vaccine_efficiency: f64,
    /// Ticks after its own onset before an agent becomes infectious.
    pub incubation_time: i32,

    /// RNG seed; runs are bit-reproducible given identical parameters.
    pub seed: u64,
}

/// Genetic-algorithm parameters for the policy search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Number of candidate policies per generation.
    pub population_size: usize,
    pub generations: usize,
    /// Candidates sampled per tournament; the fittest wins a mating-pool slot.
    pub tournament_size: usize,
    pub crossover_prob: f64,
    pub mutation_prob: f64,
    /// Upper bound per gene: vaccine policy, the two quarantine durations,
    /// and the quarantine trigger delay.
    pub gene_max: [i32; 4],
    /// Independent engine runs averaged into each candidate's fitness.
    pub replicas: u32,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let text =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        let config = toml::from_str(&text).context("failed to parse config")?;
        Ok(config)
    }
}

impl SimParams {
    /// Reference scenario of the severe-illness outbreak.
    pub fn reference() -> Self {
        Self {
            population_size: 1000,
            simulation_time: 10_000,
            n_initial_cases: 5,
            vaccine_policy: 20,
            quarantine_duration_vaccinated: 7,
            quarantine_duration_unvaccinated: 12,
            days_until_quarantine: 2,
            recovery_delay_vaccinated: 10,
            recovery_delay_unvaccinated: 14,
            immunity_window: 14,
            immunity_factor: 2.0,
            contagion_distance: 2,
            max_position: 25,
            illness: Illness::severe(),
            vaccination_rate: 0.1,
            vaccine_efficiency: 0.8,
            incubation_time: 2,
            seed: 100,
        }
    }
}
