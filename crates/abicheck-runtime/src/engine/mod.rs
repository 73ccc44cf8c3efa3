//! Call engine boundary
//!
//! The harness never places values in registers itself. It drives a `CallVm`:
//! reset, optionally announce an aggregate return, push each argument, then
//! issue exactly one call keyed by the return type.
//!
//! - `CallVm`: the invocation engine contract
//! - `FfiVm`: implementation over libffi

mod ffi;

pub use ffi::FfiVm;

use crate::aggregate::AggregateDescriptor;
use crate::types::{ScalarType, ScalarValue};
use thiserror::Error;

/// Default argument capacity in bytes
pub const DEFAULT_ARG_BUFFER_SIZE: usize = 32_768;

/// Call engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("argument buffer overflow: {needed} bytes needed, capacity {capacity}")]
    ArgumentOverflow { needed: usize, capacity: usize },

    #[error("call target is null")]
    NullTarget,

    #[error("call interface preparation failed: {status}")]
    PrepareFailed { status: String },

    #[error("return buffer too small: {needed} bytes needed, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("layout mismatch for {signature}: descriptor says {descriptor} bytes, engine computed {engine}")]
    LayoutMismatch {
        signature: String,
        descriptor: usize,
        engine: usize,
    },

    #[error("no aggregate call was started for {signature}")]
    NoAggregateCall { signature: String },
}

/// One reusable call context
///
/// A context accumulates arguments for a single pending call. `reset` discards
/// them together with any aggregate layout state built for them.
pub trait CallVm {
    /// Discard pending arguments and release per-call resources
    fn reset(&mut self);

    /// Announce that the next call returns the given aggregate
    fn begin_aggregate_call(&mut self, desc: &AggregateDescriptor) -> Result<(), VmError>;

    /// Push one scalar argument
    fn push(&mut self, value: ScalarValue) -> Result<(), VmError>;

    /// Push one aggregate argument by value
    fn push_aggregate(&mut self, desc: &AggregateDescriptor, payload: &[u8]) -> Result<(), VmError>;

    /// Call a function returning void
    ///
    /// # Safety
    ///
    /// `target` must be a function whose C signature matches the pushed arguments.
    unsafe fn call_void(&mut self, target: *const ()) -> Result<(), VmError>;

    /// Call a function returning a scalar of type `ret`
    ///
    /// # Safety
    ///
    /// See `call_void`; the return type must also match.
    unsafe fn call(&mut self, target: *const (), ret: ScalarType) -> Result<ScalarValue, VmError>;

    /// Call a function returning the aggregate announced by `begin_aggregate_call`
    ///
    /// The returned bytes are written to the front of `out`.
    ///
    /// # Safety
    ///
    /// See `call_void`; the return type must also match `desc`.
    unsafe fn call_aggregate(
        &mut self,
        target: *const (),
        desc: &AggregateDescriptor,
        out: &mut [u8],
    ) -> Result<(), VmError>;
}
