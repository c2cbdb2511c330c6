use crate::config::SimParams;
use rand::prelude::*;

/// Grid coordinates, bounded to `[0, max_position]` per axis with wraparound.
pub type Position = (i32, i32);

/// Health state of an agent.
///
/// `Quarantined` implies ill; `days` counts the ticks spent confined so far
/// and is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Infected,
    Quarantined { days: i32 },
}

/// One simulated individual.
///
/// Owned exclusively by the engine's population vector; the index in that
/// vector matches `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    id: usize,
    health: Health,
    vaccinated: bool,
    position: Position,
    home: Position,
    /// Tick of the most recent infection onset; `None` if never infected.
    last_infection: Option<i32>,
}

impl Agent {
    pub fn new(id: usize, ill: bool, vaccinated: bool, home: Position, position: Position) -> Self {
        Self {
            id,
            health: if ill { Health::Infected } else { Health::Healthy },
            vaccinated,
            position,
            home,
            last_infection: if ill { Some(0) } else { None },
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_ill(&self) -> bool {
        self.health != Health::Healthy
    }

    pub fn is_vaccinated(&self) -> bool {
        self.vaccinated
    }

    pub fn in_quarantine(&self) -> bool {
        matches!(self.health, Health::Quarantined { .. })
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn home(&self) -> Position {
        self.home
    }

    pub fn last_infection(&self) -> Option<i32> {
        self.last_infection
    }

    /// Infection onset. No-op if already ill or still inside the immunity
    /// window of a previous infection.
    pub fn expose(&mut self, tick: i32, immunity_window: i32) {
        if self.is_ill() {
            return;
        }
        if let Some(onset) = self.last_infection {
            if tick - onset <= immunity_window {
                return;
            }
        }
        self.health = Health::Infected;
        self.last_infection = Some(tick);
    }

    /// One-way transition; never reverts.
    pub fn vaccinate(&mut self) {
        self.vaccinated = true;
    }

    /// Advance the recovery/quarantine state machine by one tick.
    pub fn update_health(&mut self, tick: i32, params: &SimParams) {
        let Some(onset) = self.last_infection else {
            return;
        };
        self.health = next_health(self.health, self.vaccinated, onset, tick, params);
    }

    /// Move one step: quarantined agents snap to their home cell, free agents
    /// take an independent random step in `{-1, 0, +1}` per axis on the torus.
    pub fn step<R: Rng>(&mut self, max_position: i32, rng: &mut R) {
        if self.in_quarantine() {
            self.position = self.home;
            return;
        }
        self.position.0 = wrap(self.position.0 + rng.random_range(-1..=1), max_position);
        self.position.1 = wrap(self.position.1 + rng.random_range(-1..=1), max_position);
    }
}

fn wrap(coord: i32, max_position: i32) -> i32 {
    if coord > max_position {
        0
    } else if coord < 0 {
        max_position
    } else {
        coord
    }
}

/// Transition table of the per-agent state machine, evaluated once per tick.
///
/// For an ill agent, in order: recover once the recovery delay has elapsed,
/// leave quarantine once its duration is served (remaining ill), otherwise
/// enter or stay in quarantine once the trigger delay has elapsed.
fn next_health(
    health: Health,
    vaccinated: bool,
    onset: i32,
    tick: i32,
    params: &SimParams,
) -> Health {
    let days = match health {
        Health::Healthy => return Health::Healthy,
        Health::Infected => 0,
        Health::Quarantined { days } => days,
    };

    let (recovery_delay, quarantine_duration) = if vaccinated {
        (
            params.recovery_delay_vaccinated,
            params.quarantine_duration_vaccinated,
        )
    } else {
        (
            params.recovery_delay_unvaccinated,
            params.quarantine_duration_unvaccinated,
        )
    };

    if tick - onset >= recovery_delay {
        return Health::Healthy;
    }
    if days >= quarantine_duration {
        return Health::Infected;
    }
    if tick - onset >= params.days_until_quarantine {
        return Health::Quarantined { days: days + 1 };
    }
    health
}
