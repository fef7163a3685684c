//! Infrastructure adapters and runtime bootstrap.

pub mod assets;
pub mod discord;
pub mod error;
pub mod shot;
pub mod telemetry;
