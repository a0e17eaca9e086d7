//! CLI command implementations

pub mod estimate;
pub mod model;
pub mod status;
