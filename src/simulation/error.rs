//! Error type for the simulation core

use thiserror::Error;

use super::types::VehicleId;

/// Errors surfaced by the scheduling core.
///
/// Everything here is recoverable from the caller's point of view: a bad
/// spawn line is dropped, a bad config is rejected before the run starts,
/// and an unknown vehicle aborts only the tick it occurred in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("malformed spawn record {line:?}: {reason}")]
    MalformedSpawnRecord { line: String, reason: String },

    #[error("vehicle {id} missing from registry ({context})")]
    UnknownVehicle { id: VehicleId, context: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("spawn feed closed")]
    FeedClosed,
}

impl SimError {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        SimError::MalformedSpawnRecord {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
