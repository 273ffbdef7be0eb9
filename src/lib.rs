//! Quantarena: an algorithmic paper-trading arena.
//!
//! An event-driven pipeline ingests a live tick stream, fans it into
//! competing strategies, passes every emitted signal through a risk
//! governance layer, and either simulates the fill against an isolated
//! per-strategy ledger or submits it through the brokerage connector.
//! Fills feed back into the governor to keep its rolling performance
//! metrics current.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
