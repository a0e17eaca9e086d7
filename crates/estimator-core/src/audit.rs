//! Append-only audit log backed by SQLite
//!
//! Records every prediction and analogous-cost request. Strictly
//! fire-and-forget: callers log write failures and never let them reach
//! the client. Nothing in the core ever reads these tables back.

use crate::models::{AnalogousEstimate, FeatureVector, Label};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Audit sink holding a single SQLite connection.
///
/// Inserts are tiny and rare enough that a mutex-guarded connection is
/// sufficient; contention here can only delay other audit writes, never
/// a response.
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory log, used by tests
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT DEFAULT (datetime('now')),
                features_json TEXT,
                prediction_json TEXT,
                notes TEXT
            );
            CREATE TABLE IF NOT EXISTS analogous_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT DEFAULT (datetime('now')),
                size REAL,
                mean_cost_per_unit REAL,
                estimated_cost REAL,
                notes TEXT
            );",
        )
    }

    /// Append a prediction record
    pub fn log_prediction(
        &self,
        features: &FeatureVector,
        predictions: &[Label],
        notes: &str,
    ) -> rusqlite::Result<i64> {
        let features_json = serde_json::to_string(features).unwrap_or_default();
        let prediction_json = serde_json::to_string(predictions).unwrap_or_default();
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        conn.execute(
            "INSERT INTO predictions (features_json, prediction_json, notes) VALUES (?1, ?2, ?3)",
            params![features_json, prediction_json, notes],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Append an analogous-cost record
    pub fn log_analogous(
        &self,
        size: f64,
        estimate: &AnalogousEstimate,
        notes: &str,
    ) -> rusqlite::Result<i64> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        conn.execute(
            "INSERT INTO analogous_requests (size, mean_cost_per_unit, estimated_cost, notes)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                size,
                estimate.mean_cost_per_unit,
                estimate.estimated_cost,
                notes
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// Best-effort wrapper: run an audit write, swallow and log any failure
pub fn fire_and_forget(result: rusqlite::Result<i64>, what: &str) {
    if let Err(e) = result {
        warn!(error = %e, what, "Audit write failed, response unaffected");
        crate::observability::EstimatorMetrics::new().inc_audit_errors();
    }
}
