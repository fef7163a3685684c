//! Domain layer types and invariants.

pub mod card;
pub mod counters;
pub mod error;
