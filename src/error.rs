//! Error types for the sorting cell
//!
//! Four layers, from narrowest to widest:
//! - [`OperationError`]: why a single pick or place failed (never aborts a cycle)
//! - [`RegistryError`] / [`RoutingError`]: registry bookkeeping and zone lookup
//! - [`ConfigError`]: the configuration bundle is unusable
//! - [`SimError`]: the cycle itself cannot proceed

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::state::{ObjectId, SortingCriteria};

/// Failure kind attached to an unsuccessful [`OperationResult`](crate::sim::OperationResult).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationError {
    /// The arm was in the wrong state for the requested operation
    #[error("arm is in the wrong state for this operation")]
    InvalidState,
    /// Unknown object id
    #[error("object not found")]
    ObjectNotFound,
    /// Unknown zone id
    #[error("zone not found")]
    ZoneNotFound,
    /// Grasp missed (retried internally)
    #[error("missed pick")]
    MissedPick,
    /// Path blocked and no alternate path was found
    #[error("collision")]
    Collision,
    /// Destination zone is at capacity
    #[error("zone full")]
    ZoneFull,
    /// Every retry was consumed
    #[error("maximum retries exceeded")]
    MaxRetriesExceeded,
}

impl OperationError {
    /// Transient kinds are resolved inside a step by retry or reroute
    pub fn is_transient(&self) -> bool {
        matches!(self, OperationError::MissedPick | OperationError::Collision)
    }
}

/// Registry bookkeeping failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("zone {0:?} not found")]
    ZoneNotFound(String),

    #[error("object {0} is not in the source area")]
    NotInSource(ObjectId),

    #[error("object {0} is not held")]
    NotHeld(ObjectId),

    #[error("zone {0:?} is full")]
    ZoneFull(String),

    #[error("source area holds at most {capacity} objects, {requested} requested")]
    SourceOverCapacity { capacity: u32, requested: usize },
}

impl From<RegistryError> for OperationError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ObjectNotFound(_) => OperationError::ObjectNotFound,
            RegistryError::ZoneNotFound(_) => OperationError::ZoneNotFound,
            RegistryError::ZoneFull(_) => OperationError::ZoneFull,
            RegistryError::NotInSource(_)
            | RegistryError::NotHeld(_)
            | RegistryError::SourceOverCapacity { .. } => OperationError::InvalidState,
        }
    }
}

/// Zone assignment failure. Indicates a configuration defect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("no zone accepts {value:?} under {criteria:?}")]
    NoZoneForValue {
        criteria: SortingCriteria,
        value: String,
    },
}

/// The configuration bundle cannot be used to start a cycle
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be a positive integer")]
    InvalidRetryLimit { name: &'static str },

    #[error("{name} must be positive and finite, got {value}")]
    InvalidDuration { name: &'static str, value: f64 },

    #[error("{name} must be non-negative and finite, got {value}")]
    NegativeValue { name: &'static str, value: f64 },

    #[error("{name} has min greater than max")]
    InvertedBounds { name: String },

    #[error("zone id must not be empty")]
    EmptyZoneId,

    #[error("duplicate zone id {0:?}")]
    DuplicateZone(String),

    #[error("zone {zone:?} accepts {value:?}, which is not a {criteria:?} value")]
    ZoneCriterionMismatch {
        zone: String,
        value: String,
        criteria: SortingCriteria,
    },

    #[error("no zone accepts {value:?} under {criteria:?}")]
    MissingZone {
        criteria: SortingCriteria,
        value: String,
    },

    #[error("{count} objects exceed source capacity {capacity}")]
    SourceOverCapacity { count: u32, capacity: u32 },
}

/// Cycle-level failure: the run cannot proceed
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(OperationError::MissedPick.is_transient());
        assert!(OperationError::Collision.is_transient());
        assert!(!OperationError::ZoneFull.is_transient());
        assert!(!OperationError::MaxRetriesExceeded.is_transient());
    }

    #[test]
    fn test_registry_error_maps_to_operation_kind() {
        let id = ObjectId(4);
        assert_eq!(
            OperationError::from(RegistryError::ObjectNotFound(id)),
            OperationError::ObjectNotFound
        );
        assert_eq!(
            OperationError::from(RegistryError::ZoneFull("red".into())),
            OperationError::ZoneFull
        );
        assert_eq!(
            OperationError::from(RegistryError::NotHeld(id)),
            OperationError::InvalidState
        );
    }

    #[test]
    fn test_error_messages_name_the_subject() {
        let err = RegistryError::NotInSource(ObjectId(7));
        assert_eq!(err.to_string(), "object obj_7 is not in the source area");
        let err = ConfigError::ProbabilityOutOfRange {
            name: "missed_pick_probability",
            value: 1.5,
        };
        assert!(err.to_string().contains("missed_pick_probability"));
    }
}
