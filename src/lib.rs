pub mod cache;
pub mod config;
pub mod crds;
pub mod error;
pub mod reconciler;
pub mod solver;
pub mod telemetry;

pub use error::{Error, Result};
