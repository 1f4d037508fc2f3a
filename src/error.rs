//! Errors raised by the memory graph and the join engine.
//!
//! Two kinds of failure are kept apart:
//!
//! - **Consistency violations** signal a defect in the engine itself (a broken
//!   graph invariant or a contradictory mapping). They abort the current
//!   analysis run and must not be swallowed.
//! - **Unsupported constructs** are recoverable: the caller treats the affected
//!   value as unknown and carries on.
//!
//! Neither covers an *undefined join* (an expected outcome reported through
//! [`JoinResult`][crate::join::JoinResult]) or a memory-safety finding in the
//! analysed program (a flag on [`SmgState`][crate::state::SmgState]).

use thiserror::Error;

use crate::types::{Level, ObjectId, ValueId};

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SmgError {
    #[error("assertion failed: level mapping contradiction for levels ({level1},{level2}): mapped to {existing}, requested {requested}")]
    LevelMappingContradiction {
        level1: Level,
        level2: Level,
        existing: Level,
        requested: Level,
    },

    #[error("assertion failed: no level mapping for levels ({level1},{level2})")]
    MissingLevelMapping { level1: Level, level2: Level },

    #[error("assertion failed: field of {size}b at {offset}b of {object} overlaps an existing field")]
    OverlappingField { object: ObjectId, offset: u64, size: u64 },

    #[error("assertion failed: field of {size}b at {offset}b does not fit {object} of {object_size}b")]
    FieldOutOfBounds {
        object: ObjectId,
        offset: u64,
        size: u64,
        object_size: u64,
    },

    #[error("assertion failed: value {value} already points to {existing}, cannot point to {requested}")]
    ConflictingPointsTo {
        value: ValueId,
        existing: ObjectId,
        requested: ObjectId,
    },

    #[error("assertion failed: {source_node} is already mapped to {existing}, cannot map to {requested}")]
    ConflictingNodeMapping {
        source_node: String,
        existing: String,
        requested: String,
    },

    #[error("assertion failed: field sets of {object1} and {object2} differ after joining fields")]
    FieldSetsDiffer { object1: ObjectId, object2: ObjectId },

    #[error("assertion failed: no field at {offset}b of {object} matching the other input")]
    MissingCounterpart { object: ObjectId, offset: u64 },

    #[error("assertion failed: unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("assertion failed: unknown value {0}")]
    UnknownValue(ValueId),

    #[error("assertion failed: join not defined, but status is {0}")]
    UndefinedJoinStatus(String),

    #[error("assertion failed: {0}")]
    InvalidCoverage(String),

    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),
}

impl SmgError {
    /// Checks whether this error signals an engine defect (fatal) rather than an unsupported input.
    pub fn is_consistency_violation(&self) -> bool {
        !matches!(self, SmgError::UnsupportedConstruct(_))
    }
}

pub type Result<T> = std::result::Result<T, SmgError>;

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_level_contradiction_message() {
        let err = SmgError::LevelMappingContradiction {
            level1: Level::new(1),
            level2: Level::new(0),
            existing: Level::new(1),
            requested: Level::new(2),
        };
        assert!(err.is_consistency_violation());
        assert_eq!(
            err.to_string(),
            "assertion failed: level mapping contradiction for levels (L1,L0): mapped to L1, requested L2"
        );
    }

    #[test]
    fn test_overlap_message() {
        let err = SmgError::OverlappingField {
            object: ObjectId::NULL,
            offset: 32,
            size: 32,
        };
        assert_eq!(
            err.to_string(),
            "assertion failed: field of 32b at 32b of NULL overlaps an existing field"
        );
    }

    #[test]
    fn test_unsupported_is_recoverable() {
        let err = SmgError::UnsupportedConstruct("variable-length array".to_string());
        assert!(!err.is_consistency_violation());
        assert!(err.to_string().starts_with("unsupported construct"));
    }
}
