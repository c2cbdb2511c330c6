use serde::{Deserialize, Serialize};

/// Disease profile: how contagious the illness is and how well it evades the
/// vaccine. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Illness {
    /// Baseline per-contact infection probability.
    pub contagion_rate: f64,
    /// Resistance to the vaccine, subtracted against `vaccine_efficiency` in
    /// the infection-probability formula.
    pub vaccine_resistance: f64,
}

impl Illness {
    /// Highly contagious, vaccine-evading profile.
    pub const fn severe() -> Self {
        Self {
            contagion_rate: 0.6,
            vaccine_resistance: 0.25,
        }
    }

    /// Mildly contagious profile with little vaccine resistance.
    pub const fn mild() -> Self {
        Self {
            contagion_rate: 0.2,
            vaccine_resistance: 0.1,
        }
    }
}
