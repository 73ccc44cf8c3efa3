//! Call orchestrator
//!
//! Marshals the expected value of every argument position into the call engine,
//! issues the call keyed by the return type, and checks the return value. The
//! values the callee recorded during the call are handed back for verification.
//!
//! Aggregate descriptors are built fresh for each case and dropped when the
//! case ends; the engine releases its own layout state on the next `reset`.

use crate::aggregate::AggregateDescriptor;
use crate::capture::CaptureSession;
use crate::engine::CallVm;
use crate::error::CaseError;
use crate::registry::{AggregateRef, AggregateRegistry};
use crate::signature::{ArgKind, ReturnType, Signature, SignatureError};
use crate::types::{ScalarType, ScalarValue};
use crate::values::ValueTable;
use tracing::debug;

fn descriptor(
    registry: &AggregateRegistry,
    found: AggregateRef,
    sig: &Signature,
    offset: usize,
) -> Result<AggregateDescriptor, CaseError> {
    registry
        .construct(found.index)
        .ok_or_else(|| CaseError::unknown_aggregate(sig.text(), offset))
}

fn expected_scalar(
    expected: &ValueTable,
    ty: ScalarType,
    position: usize,
) -> Result<ScalarValue, CaseError> {
    expected
        .get(ty, position)
        .ok_or(CaseError::PositionOutOfRange {
            position,
            max: expected.max_args(),
        })
}

fn expected_payload(expected: &ValueTable, position: usize) -> Result<&[u8], CaseError> {
    expected
        .aggregate(position)
        .ok_or(CaseError::PositionOutOfRange {
            position,
            max: expected.max_args(),
        })
}

/// Run one call: reset, marshal, call, check the return value
///
/// Returns the observed table captured from the callee. Any failure here
/// means verification must not run.
///
/// # Safety
///
/// `target` must be a function whose C signature matches `sig`.
pub unsafe fn invoke<V: CallVm + ?Sized>(
    vm: &mut V,
    sig: &Signature,
    target: *const (),
    registry: &AggregateRegistry,
    expected: &ValueTable,
) -> Result<ValueTable, CaseError> {
    vm.reset();

    let ret_position = sig.last_position();
    let ret_descriptor = match sig.return_type() {
        ReturnType::Aggregate(found) => {
            let desc = registry.construct(found.index).ok_or_else(|| {
                SignatureError::UnknownReturnAggregate {
                    rest: sig.text().to_string(),
                }
            })?;
            vm.begin_aggregate_call(&desc)?;
            Some(desc)
        }
        _ => None,
    };

    for arg in sig.args() {
        match arg.kind {
            ArgKind::Scalar(ty) => {
                let value = expected_scalar(expected, ty, arg.position)?;
                debug!(position = arg.position, tag = %ty, %value, "push");
                vm.push(value)?;
            }
            ArgKind::Aggregate(found) => {
                let desc = descriptor(registry, found, sig, arg.offset)?;
                let payload = expected_payload(expected, arg.position)?;
                debug!(position = arg.position, aggregate = %desc, "push aggregate");
                vm.push_aggregate(&desc, payload)?;
            }
        }
    }

    match (sig.return_type(), ret_descriptor) {
        (ReturnType::Void, _) => {
            let session = CaptureSession::begin(expected);
            debug!("call void");
            vm.call_void(target)?;
            Ok(session.finish())
        }
        (ReturnType::Scalar(ty), _) => {
            let want = expected_scalar(expected, ty, ret_position)?;
            let session = CaptureSession::begin(expected);
            debug!(ret = %ty, "call");
            let returned = vm.call(target, ty)?;
            let observed = session.finish();

            if returned != want {
                return Err(CaseError::ReturnMismatch {
                    tag: ty.tag(),
                    returned,
                    expected: want,
                });
            }
            Ok(observed)
        }
        (ReturnType::Aggregate(found), Some(desc)) => {
            let want = expected_payload(expected, ret_position)?;
            let compare = registry
                .comparator(found.index)
                .ok_or_else(|| SignatureError::UnknownReturnAggregate {
                    rest: sig.text().to_string(),
                })?;

            let mut returned = vec![0u8; desc.size()];
            let session = CaptureSession::begin(expected);
            debug!(ret = %desc, "call aggregate");
            vm.call_aggregate(target, &desc, &mut returned)?;
            let observed = session.finish();

            if !compare(&returned, want) {
                return Err(CaseError::AggregateReturnMismatch {
                    signature: desc.signature(),
                });
            }
            Ok(observed)
        }
        (ReturnType::Aggregate(_), None) => Err(SignatureError::UnknownReturnAggregate {
            rest: sig.text().to_string(),
        }
        .into()),
    }
}
