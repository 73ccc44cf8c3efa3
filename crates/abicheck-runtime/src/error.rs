//! Per-case error type
//!
//! Every failure is local to one case. `CaseError::kind` maps each variant to
//! one of the failure classes reported by the driver.

use crate::engine::VmError;
use crate::signature::SignatureError;
use crate::types::ScalarValue;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure classes of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unknown tag or unresolvable aggregate prefix
    Grammar,
    /// The call returned something other than the expected value
    ReturnValue,
    /// A value observed inside the callee differs from the one supplied
    ArgumentEcho,
    /// The call engine refused the call
    Engine,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Grammar => "grammar",
            FailureKind::ReturnValue => "return value",
            FailureKind::ArgumentEcho => "argument echo",
            FailureKind::Engine => "engine",
        };
        f.write_str(name)
    }
}

/// Errors that fail a single case
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("position {position} exceeds value table bound {max}")]
    PositionOutOfRange { position: usize, max: usize },

    #[error("rval wrong for '{tag}': {returned} != {expected}")]
    ReturnMismatch {
        tag: char,
        returned: ScalarValue,
        expected: ScalarValue,
    },

    #[error("rval wrong for aggregate {signature}")]
    AggregateReturnMismatch { signature: String },

    #[error("'{tag}':{position}: {observed} != {expected} ; arg mismatch at {position}")]
    ArgumentMismatch {
        tag: char,
        position: usize,
        observed: ScalarValue,
        expected: ScalarValue,
    },

    #[error("'{{':{position}: aggregate {signature} differs ; arg mismatch at {position}")]
    AggregateArgumentMismatch { position: usize, signature: String },

    #[error("call engine: {0}")]
    Engine(#[from] VmError),
}

impl CaseError {
    /// Aggregate token at `offset` of `text` that no longer resolves
    pub(crate) fn unknown_aggregate(text: &str, offset: usize) -> Self {
        CaseError::Signature(SignatureError::UnknownAggregate {
            offset,
            rest: text.get(offset..).unwrap_or_default().to_string(),
        })
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            CaseError::Signature(_) => FailureKind::Grammar,
            CaseError::ReturnMismatch { .. } | CaseError::AggregateReturnMismatch { .. } => {
                FailureKind::ReturnValue
            }
            CaseError::ArgumentMismatch { .. } | CaseError::AggregateArgumentMismatch { .. } => {
                FailureKind::ArgumentEcho
            }
            CaseError::PositionOutOfRange { .. } | CaseError::Engine(_) => FailureKind::Engine,
        }
    }

    /// Argument position the failure points at, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            CaseError::PositionOutOfRange { position, .. }
            | CaseError::ArgumentMismatch { position, .. }
            | CaseError::AggregateArgumentMismatch { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_argument_mismatch_message() {
        let err = CaseError::ArgumentMismatch {
            tag: 'i',
            position: 1,
            observed: ScalarValue::Int(0x7ffffffe),
            expected: ScalarValue::Int(0x7fffffff),
        };
        assert_eq!(
            err.to_string(),
            "'i':1: 2147483646 != 2147483647 ; arg mismatch at 1"
        );
        assert_eq!(err.kind(), FailureKind::ArgumentEcho);
        assert_eq!(err.position(), Some(1));
    }

    #[test]
    fn test_grammar_errors_pass_through() {
        let err = CaseError::from(SignatureError::UnknownReturnType { tag: 'x' });
        assert_eq!(err.to_string(), "unknown rtype 'x'");
        assert_eq!(err.kind(), FailureKind::Grammar);
        assert_eq!(err.position(), None);
    }

    #[test]
    fn test_engine_errors() {
        let err = CaseError::from(VmError::NullTarget);
        assert_eq!(err.kind(), FailureKind::Engine);
        assert_eq!(err.to_string(), "call engine: call target is null");
    }
}
