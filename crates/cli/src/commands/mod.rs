//! Subcommand implementations

pub mod detection;
pub mod model;
pub mod optimize;
