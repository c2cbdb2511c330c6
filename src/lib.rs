//! Agent-based epidemic simulator with a genetic-algorithm policy search.
//!
//! The [`engine`] module advances a population of agents through discrete
//! ticks of contagion, quarantine, movement, and vaccination; the
//! [`optimizer`] module searches for containment policies that minimize
//! cumulated cases against their cost.

pub mod agent;
pub mod config;
pub mod engine;
pub mod illness;
pub mod optimizer;
pub mod stats;
