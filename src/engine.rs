use crate::agent::{Agent, Position};
use crate::config::SimParams;
use anyhow::{Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;

/// Aggregate result of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Agents newly infected at the last executed tick.
    pub new_cases: usize,
    /// Total infections over the whole run, initial cases included.
    pub cumulated_cases: usize,
}

/// Simulation engine.
///
/// Owns the population, the parameters, and the random number generator, and
/// advances the epidemic in discrete ticks. All randomness is drawn from a
/// single stream seeded with `params.seed` in a fixed order (population
/// generation, then per tick: infection checks in pair order, movement in
/// agent order, vaccination in agent order), so two engines constructed with
/// identical parameters evolve identically.
pub struct Engine {
    params: SimParams,
    population: Vec<Agent>,
    rng: ChaCha12Rng,
    tick: i32,
}

impl Engine {
    /// Create a new `Engine` with a freshly generated population.
    ///
    /// Exactly `n_initial_cases` agents start ill and exactly `vaccine_policy`
    /// agents start vaccinated, both picked by independent shuffles. Home and
    /// current positions are drawn independently per agent.
    ///
    /// # Errors
    /// Fails if `n_initial_cases` exceeds `population_size`. Every other
    /// parameter is accepted literally.
    pub fn new(params: SimParams) -> Result<Self> {
        let n = params.population_size;
        if params.n_initial_cases > n {
            bail!(
                "initial cases ({}) exceed population size ({n})",
                params.n_initial_cases
            );
        }

        let mut rng = ChaCha12Rng::seed_from_u64(params.seed);

        let mut ill = vec![false; n];
        ill[..params.n_initial_cases].fill(true);
        ill.shuffle(&mut rng);

        let mut vaccinated = vec![false; n];
        vaccinated[..params.vaccine_policy.min(n)].fill(true);
        vaccinated.shuffle(&mut rng);

        let coord_dist = Uniform::new_inclusive(0, params.max_position)?;
        let mut population = Vec::with_capacity(n);
        for id in 0..n {
            let home = (coord_dist.sample(&mut rng), coord_dist.sample(&mut rng));
            let position = (coord_dist.sample(&mut rng), coord_dist.sample(&mut rng));
            population.push(Agent::new(id, ill[id], vaccinated[id], home, position));
        }

        Ok(Self {
            params,
            population,
            rng,
            tick: 0,
        })
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn population(&self) -> &[Agent] {
        &self.population
    }

    /// Run the simulation to completion and return the outcome.
    ///
    /// Each tick applies, in order: infection checks over all contagious and
    /// susceptible pairs in range, the per-agent quarantine/recovery state
    /// machine, movement, vaccination, and case bookkeeping. The run stops
    /// after `simulation_time` ticks, or at the end of any tick with zero ill
    /// agents left.
    pub fn run(&mut self) -> Outcome {
        let mut new_cases = 0;
        let mut cumulated_cases = 0;

        for tick in 0..self.params.simulation_time {
            self.tick = tick;

            self.spread_infection();
            self.update_health_states();
            self.move_population();
            self.vaccinate_population();

            new_cases = self.count_new_cases();
            cumulated_cases += new_cases;
            log::debug!("tick {tick}: {new_cases} new cases");

            if !self.population.iter().any(Agent::is_ill) {
                break;
            }
        }

        Outcome {
            new_cases,
            cumulated_cases,
        }
    }

    /// Infection phase, the O(contagious x susceptible) hot path.
    ///
    /// Both index sets are snapshot before any check, so an agent infected
    /// this tick neither infects others nor re-enters the susceptible side.
    fn spread_infection(&mut self) {
        let contagious: Vec<usize> = self.index_of(|a| a.is_ill() && !a.in_quarantine());
        let susceptible: Vec<usize> = self.index_of(|a| !a.is_ill() && !a.in_quarantine());

        for &source in &contagious {
            for &target in &susceptible {
                let reach = distance(
                    self.population[source].position(),
                    self.population[target].position(),
                );
                if reach <= self.params.contagion_distance {
                    self.check_transmission(source, target);
                }
            }
        }
    }

    /// Stochastic infection check for one contagious/susceptible pair in range.
    ///
    /// The threshold is the contagion rate, raised by the vaccine's residual
    /// resistance if the target is vaccinated and lowered by the target's
    /// decaying acquired immunity. It is compared to the draw as-is: values
    /// at or above 1 always infect, values at or below 0 never do. A source
    /// still inside its own incubation window cannot transmit, but consumes
    /// the draw regardless so that trajectories stay reproducible.
    fn check_transmission(&mut self, source: usize, target: usize) {
        let params = &self.params;
        let candidate = &self.population[target];

        let vaccine_effect = if candidate.is_vaccinated() {
            params.illness.vaccine_resistance - params.vaccine_efficiency
        } else {
            0.0
        };
        let immunity_effect = match candidate.last_infection() {
            None => 0.0,
            Some(onset) => 1.0 / params.immunity_factor.powi(self.tick - onset),
        };
        let threshold = params.illness.contagion_rate + vaccine_effect - immunity_effect;

        let source_onset = self.population[source].last_infection().unwrap_or(0);
        let infectious = self.tick - source_onset > params.incubation_time;

        if self.rng.random::<f64>() < threshold && infectious {
            let (tick, immunity_window) = (self.tick, params.immunity_window);
            self.population[target].expose(tick, immunity_window);
        }
    }

    fn update_health_states(&mut self) {
        for agent in &mut self.population {
            agent.update_health(self.tick, &self.params);
        }
    }

    fn move_population(&mut self) {
        for agent in &mut self.population {
            agent.step(self.params.max_position, &mut self.rng);
        }
    }

    fn vaccinate_population(&mut self) {
        for agent in &mut self.population {
            if !agent.is_vaccinated() && self.rng.random::<f64>() < self.params.vaccination_rate {
                agent.vaccinate();
            }
        }
    }

    fn count_new_cases(&self) -> usize {
        self.population
            .iter()
            .filter(|a| a.is_ill() && a.last_infection() == Some(self.tick))
            .count()
    }

    fn index_of(&self, pred: impl Fn(&Agent) -> bool) -> Vec<usize> {
        self.population
            .iter()
            .enumerate()
            .filter(|(_, a)| pred(a))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Rectilinear distance on the grid, ignoring the wraparound.
fn distance(a: Position, b: Position) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimParams;
    use crate::illness::Illness;

    fn small_params() -> SimParams {
        let mut params = SimParams::reference();
        params.population_size = 10;
        params.simulation_time = 5;
        params.n_initial_cases = 2;
        params.vaccine_policy = 0;
        params.vaccination_rate = 0.0;
        params.seed = 42;
        params
    }

    #[test]
    fn generation_has_exact_initial_counts() {
        for seed in 0..20 {
            let mut params = SimParams::reference();
            params.population_size = 60;
            params.n_initial_cases = 7;
            params.vaccine_policy = 13;
            params.seed = seed;

            let engine = Engine::new(params).expect("failed to construct engine");
            let ill = engine.population().iter().filter(|a| a.is_ill()).count();
            let vaccinated = engine
                .population()
                .iter()
                .filter(|a| a.is_vaccinated())
                .count();
            assert_eq!(ill, 7);
            assert_eq!(vaccinated, 13);
        }
    }

    #[test]
    fn too_many_initial_cases_is_fatal() {
        let mut params = small_params();
        params.n_initial_cases = 11;
        assert!(Engine::new(params).is_err());
    }

    #[test]
    fn runs_are_deterministic() {
        let mut params = small_params();
        params.simulation_time = 30;
        params.vaccination_rate = 0.1;

        let mut first = Engine::new(params.clone()).expect("failed to construct engine");
        let mut second = Engine::new(params).expect("failed to construct engine");
        assert_eq!(first.run(), second.run());

        for (a, b) in first.population().iter().zip(second.population()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn full_grid_contagion_infects_everyone() {
        let mut params = small_params();
        params.contagion_distance = 100;
        params.illness = Illness {
            contagion_rate: 1.0,
            vaccine_resistance: 0.0,
        };
        params.incubation_time = 0;
        // Delays far beyond the run length: nobody quarantines or recovers.
        params.days_until_quarantine = 50;
        params.recovery_delay_vaccinated = 50;
        params.recovery_delay_unvaccinated = 50;

        let mut engine = Engine::new(params).expect("failed to construct engine");
        let outcome = engine.run();

        assert_eq!(outcome.cumulated_cases, 10);
        assert!(engine.population().iter().all(|a| a.is_ill()));
        assert!(engine.population().iter().all(|a| !a.in_quarantine()));
    }

    #[test]
    fn zero_contagion_rate_never_spreads() {
        let mut params = small_params();
        params.contagion_distance = 100;
        params.illness = Illness {
            contagion_rate: 0.0,
            vaccine_resistance: 0.0,
        };
        params.days_until_quarantine = 50;
        params.recovery_delay_vaccinated = 50;
        params.recovery_delay_unvaccinated = 50;

        let mut engine = Engine::new(params).expect("failed to construct engine");
        let outcome = engine.run();

        // Only the seeded cases, counted once at tick 0, ever appear.
        assert_eq!(outcome.cumulated_cases, 2);
        assert_eq!(outcome.new_cases, 0);
    }

    #[test]
    fn zero_ill_population_terminates_after_one_tick() {
        let mut params = small_params();
        params.n_initial_cases = 0;
        params.simulation_time = 1000;

        let mut engine = Engine::new(params).expect("failed to construct engine");
        let outcome = engine.run();

        assert_eq!(outcome, Outcome { new_cases: 0, cumulated_cases: 0 });
        assert_eq!(engine.tick, 0);
    }

    #[test]
    fn early_termination_freezes_cumulated_cases() {
        let mut params = small_params();
        params.simulation_time = 1000;
        params.contagion_distance = -1; // no pair is ever in range
        params.days_until_quarantine = 50;
        params.recovery_delay_vaccinated = 3;
        params.recovery_delay_unvaccinated = 3;

        let mut engine = Engine::new(params).expect("failed to construct engine");
        let outcome = engine.run();

        // The seeded cases recover at tick 3 and nothing spreads, so the run
        // stops there instead of exhausting the 1000 ticks.
        assert_eq!(engine.tick, 3);
        assert_eq!(outcome.cumulated_cases, 2);
        assert_eq!(outcome.new_cases, 0);
    }

    #[test]
    fn quarantined_agents_sit_at_home() {
        let mut params = small_params();
        params.simulation_time = 6;
        params.contagion_distance = 100;
        params.days_until_quarantine = 1;
        params.quarantine_duration_vaccinated = 50;
        params.quarantine_duration_unvaccinated = 50;
        params.recovery_delay_vaccinated = 50;
        params.recovery_delay_unvaccinated = 50;

        let mut engine = Engine::new(params).expect("failed to construct engine");
        engine.run();

        let quarantined = engine.population().iter().filter(|a| a.in_quarantine());
        let mut seen = 0;
        for agent in quarantined {
            assert_eq!(agent.position(), agent.home());
            seen += 1;
        }
        assert!(seen >= 2, "seeded cases should be confined by now");
    }

    #[test]
    fn rectilinear_distance() {
        assert_eq!(distance((0, 0), (2, 3)), 5);
        assert_eq!(distance((4, 1), (1, 1)), 3);
        assert_eq!(distance((2, 2), (2, 2)), 0);
    }
}
