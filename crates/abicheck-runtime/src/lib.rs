//! abicheck runtime - signature-driven ABI call verification
//!
//! This library provides:
//! - A signature grammar over C scalar tags and registered aggregates
//! - Expected/observed value tables and callee capture slots
//! - A call engine boundary with a libffi implementation
//! - The call orchestrator, the verification pass and the case driver

/// abicheck runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod aggregate;
pub mod capture;
pub mod engine;
pub mod error;
pub mod invoke;
pub mod registry;
pub mod signature;
pub mod suite;
pub mod types;
pub mod values;
pub mod verify;

pub use aggregate::{AggregateDescriptor, CAggregate, Field, FieldKind};
pub use capture::CaptureSession;
pub use engine::{CallVm, FfiVm, VmError, DEFAULT_ARG_BUFFER_SIZE};
pub use error::{CaseError, FailureKind};
pub use invoke::invoke;
pub use registry::{AggregateEntry, AggregateRef, AggregateRegistry};
pub use signature::{ArgKind, ArgToken, ReturnType, Signature, SignatureError};
pub use suite::{CaseOutcome, CaseSelection, CaseTable, Harness, RunSummary, SelectionError, TestCase};
pub use types::{ScalarType, ScalarValue};
pub use values::ValueTable;
pub use verify::verify;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }
}
