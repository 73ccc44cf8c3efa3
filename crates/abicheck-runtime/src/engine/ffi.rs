//! libffi-backed call engine
//!
//! Uses the raw libffi API so aggregate types can be described at runtime:
//! each `AggregateDescriptor` becomes an owned `ffi_type` tree that lives until
//! the next `reset` (or until the VM is dropped). Argument values are copied
//! into word-aligned storage owned by the VM.

use super::{CallVm, VmError, DEFAULT_ARG_BUFFER_SIZE};
use crate::aggregate::{AggregateDescriptor, FieldKind};
use crate::types::{
    CChar, CDouble, CFloat, CInt, CLong, CLongLong, CShort, ScalarType, ScalarValue,
};
use libffi::raw;
use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::mem;
use std::os::raw::c_uint;
use std::ptr::{self, addr_of_mut};

/// Word-aligned storage big enough for `len` bytes
fn words_for(len: usize) -> Vec<u64> {
    vec![0; len.div_ceil(8).max(1)]
}

fn store<T: Copy>(value: T) -> Vec<u64> {
    let mut words = words_for(mem::size_of::<T>());
    // SAFETY: `words` holds at least size_of::<T>() bytes and is 8-byte aligned
    unsafe { ptr::write(words.as_mut_ptr().cast::<T>(), value) };
    words
}

fn scalar_ffi_type(ty: ScalarType) -> *mut raw::ffi_type {
    // SAFETY: only the addresses of libffi's builtin type statics are taken
    unsafe {
        match ty {
            ScalarType::Char => addr_of_mut!(raw::ffi_type_sint8),
            ScalarType::Short => addr_of_mut!(raw::ffi_type_sint16),
            ScalarType::Int => addr_of_mut!(raw::ffi_type_sint32),
            ScalarType::Long if mem::size_of::<CLong>() == 8 => addr_of_mut!(raw::ffi_type_sint64),
            ScalarType::Long => addr_of_mut!(raw::ffi_type_sint32),
            ScalarType::LongLong => addr_of_mut!(raw::ffi_type_sint64),
            ScalarType::Pointer => addr_of_mut!(raw::ffi_type_pointer),
            ScalarType::Float => addr_of_mut!(raw::ffi_type_float),
            ScalarType::Double => addr_of_mut!(raw::ffi_type_double),
        }
    }
}

fn status_name(status: raw::ffi_status) -> String {
    match status {
        raw::ffi_status_FFI_BAD_TYPEDEF => "FFI_BAD_TYPEDEF".to_string(),
        raw::ffi_status_FFI_BAD_ABI => "FFI_BAD_ABI".to_string(),
        other => format!("status {}", other),
    }
}

/// Owned libffi struct type built from a descriptor
///
/// Array fields are flattened into repeated element entries, which is how
/// libffi expects fixed arrays inside structs.
struct AggregateLayout {
    ty: Box<UnsafeCell<raw::ffi_type>>,
    _elements: Vec<*mut raw::ffi_type>,
    _children: Vec<AggregateLayout>,
    signature: String,
    size: usize,
}

impl AggregateLayout {
    fn new(desc: &AggregateDescriptor) -> Self {
        let mut children = Vec::new();
        let mut elements = Vec::new();

        for field in desc.fields() {
            let element = match field.kind() {
                FieldKind::Scalar(ty) => scalar_ffi_type(*ty),
                FieldKind::Aggregate(inner) => {
                    let child = AggregateLayout::new(inner);
                    let ptr = child.as_ptr();
                    children.push(child);
                    ptr
                }
            };
            elements.extend(std::iter::repeat(element).take(field.count()));
        }
        elements.push(ptr::null_mut());

        // SAFETY: ffi_type is a plain C struct; all-zero is its unset state
        let mut ty: raw::ffi_type = unsafe { mem::zeroed() };
        ty.type_ = raw::FFI_TYPE_STRUCT as _;
        ty.elements = elements.as_mut_ptr();

        Self {
            ty: Box::new(UnsafeCell::new(ty)),
            _elements: elements,
            _children: children,
            signature: desc.signature(),
            size: desc.size(),
        }
    }

    fn as_ptr(&self) -> *mut raw::ffi_type {
        self.ty.get()
    }

    /// Size computed by libffi; zero until a CIF using it was prepared
    fn engine_size(&self) -> usize {
        // SAFETY: the cell is only written by libffi during ffi_prep_cif
        unsafe { (*self.ty.get()).size }
    }

    fn check(&self) -> Result<(), VmError> {
        if self.engine_size() == self.size {
            Ok(())
        } else {
            Err(VmError::LayoutMismatch {
                signature: self.signature.clone(),
                descriptor: self.size,
                engine: self.engine_size(),
            })
        }
    }
}

/// Call engine over libffi
///
/// # Examples
///
/// ```
/// use abicheck_runtime::engine::{CallVm, FfiVm};
/// use abicheck_runtime::types::{ScalarType, ScalarValue};
///
/// extern "C" fn add(a: i32, b: i32) -> i32 {
///     a + b
/// }
///
/// let mut vm = FfiVm::new();
/// vm.push(ScalarValue::Int(2)).unwrap();
/// vm.push(ScalarValue::Int(40)).unwrap();
/// let ret = unsafe { vm.call(add as *const (), ScalarType::Int) }.unwrap();
/// assert_eq!(ret, ScalarValue::Int(42));
/// ```
pub struct FfiVm {
    capacity: usize,
    used: usize,
    arg_types: Vec<*mut raw::ffi_type>,
    arg_values: Vec<Vec<u64>>,
    arg_layouts: Vec<AggregateLayout>,
    return_layout: Option<AggregateLayout>,
}

impl FfiVm {
    /// VM with the default argument capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ARG_BUFFER_SIZE)
    }

    /// VM accepting at most `capacity` bytes of pushed arguments
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            arg_types: Vec::new(),
            arg_values: Vec::new(),
            arg_layouts: Vec::new(),
            return_layout: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of arguments pushed since the last reset
    pub fn arg_count(&self) -> usize {
        self.arg_types.len()
    }

    fn reserve(&mut self, size: usize) -> Result<(), VmError> {
        let needed = self.used + size.div_ceil(8) * 8;
        if needed > self.capacity {
            return Err(VmError::ArgumentOverflow {
                needed,
                capacity: self.capacity,
            });
        }
        self.used = needed;
        Ok(())
    }

    /// Prepare a CIF for the pushed arguments and call `target`
    ///
    /// Every aggregate layout, including `ret_layout` when the call returns
    /// one, is checked against libffi's computed size before the call is made.
    ///
    /// # Safety
    ///
    /// `rvalue` must point to a buffer large enough for the descriptor size of
    /// the return type (at least one machine word), and `target` must match the
    /// prepared signature.
    unsafe fn dispatch(
        &mut self,
        target: *const (),
        rtype: *mut raw::ffi_type,
        ret_layout: Option<&AggregateLayout>,
        rvalue: *mut c_void,
    ) -> Result<(), VmError> {
        if target.is_null() {
            return Err(VmError::NullTarget);
        }

        let mut cif: raw::ffi_cif = mem::zeroed();
        let status = raw::ffi_prep_cif(
            &mut cif,
            raw::ffi_abi_FFI_DEFAULT_ABI,
            self.arg_types.len() as c_uint,
            rtype,
            self.arg_types.as_mut_ptr(),
        );
        if status != raw::ffi_status_FFI_OK {
            return Err(VmError::PrepareFailed {
                status: status_name(status),
            });
        }

        for layout in self.arg_layouts.iter().chain(ret_layout) {
            layout.check()?;
        }

        let mut avalues: Vec<*mut c_void> = self
            .arg_values
            .iter_mut()
            .map(|words| words.as_mut_ptr().cast::<c_void>())
            .collect();

        let function = mem::transmute::<*const (), unsafe extern "C" fn()>(target);
        raw::ffi_call(&mut cif, Some(function), rvalue, avalues.as_mut_ptr());
        Ok(())
    }
}

impl Default for FfiVm {
    fn default() -> Self {
        Self::new()
    }
}

impl CallVm for FfiVm {
    fn reset(&mut self) {
        self.used = 0;
        self.arg_types.clear();
        self.arg_values.clear();
        self.arg_layouts.clear();
        self.return_layout = None;
    }

    fn begin_aggregate_call(&mut self, desc: &AggregateDescriptor) -> Result<(), VmError> {
        self.return_layout = Some(AggregateLayout::new(desc));
        Ok(())
    }

    fn push(&mut self, value: ScalarValue) -> Result<(), VmError> {
        let ty = value.scalar_type();
        self.reserve(ty.size())?;

        let words = match value {
            ScalarValue::Char(v) => store::<CChar>(v),
            ScalarValue::Short(v) => store::<CShort>(v),
            ScalarValue::Int(v) => store::<CInt>(v),
            ScalarValue::Long(v) => store::<CLong>(v),
            ScalarValue::LongLong(v) => store::<CLongLong>(v),
            ScalarValue::Pointer(v) => store::<usize>(v),
            ScalarValue::Float(v) => store::<CFloat>(v),
            ScalarValue::Double(v) => store::<CDouble>(v),
        };
        self.arg_types.push(scalar_ffi_type(ty));
        self.arg_values.push(words);
        Ok(())
    }

    fn push_aggregate(&mut self, desc: &AggregateDescriptor, payload: &[u8]) -> Result<(), VmError> {
        if payload.len() < desc.size() {
            return Err(VmError::BufferTooSmall {
                needed: desc.size(),
                got: payload.len(),
            });
        }
        self.reserve(desc.size())?;

        let mut words = words_for(desc.size());
        // SAFETY: `words` holds at least desc.size() bytes; the ranges do not overlap
        unsafe {
            ptr::copy_nonoverlapping(
                payload.as_ptr(),
                words.as_mut_ptr().cast::<u8>(),
                desc.size(),
            )
        };

        let layout = AggregateLayout::new(desc);
        self.arg_types.push(layout.as_ptr());
        self.arg_values.push(words);
        self.arg_layouts.push(layout);
        Ok(())
    }

    unsafe fn call_void(&mut self, target: *const ()) -> Result<(), VmError> {
        let mut ret = [0u64; 2];
        self.dispatch(
            target,
            addr_of_mut!(raw::ffi_type_void),
            None,
            ret.as_mut_ptr().cast(),
        )
    }

    unsafe fn call(&mut self, target: *const (), ret: ScalarType) -> Result<ScalarValue, VmError> {
        let mut buffer = [0u64; 2];
        self.dispatch(target, scalar_ffi_type(ret), None, buffer.as_mut_ptr().cast())?;

        // libffi widens integral returns narrower than a register to ffi_arg
        let raw_ptr = buffer.as_ptr();
        let widened = ptr::read(raw_ptr.cast::<usize>());
        Ok(match ret {
            ScalarType::Char => ScalarValue::Char(widened as CChar),
            ScalarType::Short => ScalarValue::Short(widened as CShort),
            ScalarType::Int => ScalarValue::Int(widened as CInt),
            ScalarType::Long => ScalarValue::Long(ptr::read(raw_ptr.cast::<CLong>())),
            ScalarType::LongLong => ScalarValue::LongLong(ptr::read(raw_ptr.cast::<CLongLong>())),
            ScalarType::Pointer => ScalarValue::Pointer(widened),
            ScalarType::Float => ScalarValue::Float(ptr::read(raw_ptr.cast::<CFloat>())),
            ScalarType::Double => ScalarValue::Double(ptr::read(raw_ptr.cast::<CDouble>())),
        })
    }

    unsafe fn call_aggregate(
        &mut self,
        target: *const (),
        desc: &AggregateDescriptor,
        out: &mut [u8],
    ) -> Result<(), VmError> {
        if out.len() < desc.size() {
            return Err(VmError::BufferTooSmall {
                needed: desc.size(),
                got: out.len(),
            });
        }
        let layout = self
            .return_layout
            .take()
            .ok_or_else(|| VmError::NoAggregateCall {
                signature: desc.signature(),
            })?;

        let mut buffer = words_for(desc.size().max(16));
        let result = self.dispatch(
            target,
            layout.as_ptr(),
            Some(&layout),
            buffer.as_mut_ptr().cast(),
        );
        self.return_layout = Some(layout);
        result?;

        ptr::copy_nonoverlapping(
            buffer.as_ptr().cast::<u8>(),
            out.as_mut_ptr(),
            desc.size(),
        );
        Ok(())
    }
}
