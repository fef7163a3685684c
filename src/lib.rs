//! cartolina: renders templated social-card images from short text
//! submissions and publishes them to a feed channel.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
