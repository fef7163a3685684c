//! Application services layer.

pub mod clock;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod raster;
pub mod session;
pub mod template;
