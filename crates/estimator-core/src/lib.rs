//! Core library for the software estimation service
//!
//! This crate provides:
//! - Model artifact loading and lifecycle management (load, hot-swap,
//!   backup-and-restore on corrupt replacement)
//! - The estimation engine: classification prediction and analogous cost
//!   estimation over historical project data
//! - Append-only SQLite audit logging
//! - Health checks and Prometheus metrics

pub mod artifact;
pub mod audit;
pub mod engine;
pub mod error;
pub mod health;
pub mod historical;
pub mod lifecycle;
pub mod models;
pub mod observability;

pub use artifact::ClassifierArtifact;
pub use audit::AuditLog;
pub use engine::{EstimationEngine, DEFAULT_FALLBACK_MEAN_COST_PER_UNIT};
pub use error::{EstimatorError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use historical::HistoricalData;
pub use lifecycle::{ModelStore, StartupReport};
pub use models::*;
pub use observability::EstimatorMetrics;
