//! Verification pass
//!
//! Walks the argument tokens again and compares what the callee observed
//! against what was supplied. Scalars compare by exact value, floats included.
//! Aggregates go through the comparator registered for their type. The first
//! mismatch fails the case.

use crate::error::CaseError;
use crate::registry::AggregateRegistry;
use crate::signature::{ArgKind, Signature};
use crate::values::ValueTable;
use tracing::trace;

fn out_of_range(position: usize, table: &ValueTable) -> CaseError {
    CaseError::PositionOutOfRange {
        position,
        max: table.max_args(),
    }
}

/// Compare observed arguments against expected ones
pub fn verify(
    sig: &Signature,
    registry: &AggregateRegistry,
    observed: &ValueTable,
    expected: &ValueTable,
) -> Result<(), CaseError> {
    for arg in sig.args() {
        let position = arg.position;

        match arg.kind {
            ArgKind::Scalar(ty) => {
                let want = expected
                    .get(ty, position)
                    .ok_or_else(|| out_of_range(position, expected))?;
                let got = observed
                    .get(ty, position)
                    .ok_or_else(|| out_of_range(position, observed))?;

                trace!(position, tag = %ty, %got, %want, "compare");
                if got != want {
                    return Err(CaseError::ArgumentMismatch {
                        tag: ty.tag(),
                        position,
                        observed: got,
                        expected: want,
                    });
                }
            }
            ArgKind::Aggregate(found) => {
                let compare = registry
                    .comparator(found.index)
                    .ok_or_else(|| CaseError::unknown_aggregate(sig.text(), arg.offset))?;
                let want = expected
                    .aggregate(position)
                    .ok_or_else(|| out_of_range(position, expected))?;
                let got = observed
                    .aggregate(position)
                    .ok_or_else(|| out_of_range(position, observed))?;

                trace!(position, "compare aggregate");
                if !compare(got, want) {
                    return Err(CaseError::AggregateArgumentMismatch {
                        position,
                        signature: registry
                            .signature(found.index)
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
