//! Host-side values and their conversion to and from `AbiValue`
//!
//! Arguments are lowered into an [`ArgFrame`] that owns every string and
//! array it points at; the callee borrows them for the duration of the call.
//! Return values are lifted into owned [`Value`]s; payloads the module
//! allocated through the VM heap during that call are then reclaimed.

use std::ffi::{c_void, CString};
use std::fmt;

use datacode_abi::{AbiValue, ValueTag};

use crate::error::MarshalError;
use crate::heap::{self, CallBlocks};

/// Arrays nested deeper than this are rejected in both directions
pub const MAX_DEPTH: usize = 64;

/// Opaque handle to a module-owned object.
///
/// The VM never dereferences or frees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(usize);

impl ObjectHandle {
    /// Wrap a raw object pointer
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    /// Raw object pointer
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

/// Owned script value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),
    /// IEEE-754 double
    Float(f64),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    Str(String),
    /// Absence of a value
    Null,
    /// Ordered values
    Array(Vec<Value>),
    /// Module-owned object
    Object(ObjectHandle),
}

impl Value {
    /// ABI tag this value lowers to
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Int(_) => ValueTag::Int,
            Value::Float(_) => ValueTag::Float,
            Value::Bool(_) => ValueTag::Bool,
            Value::Str(_) => ValueTag::Str,
            Value::Null => ValueTag::Null,
            Value::Array(_) => ValueTag::Array,
            Value::Object(_) => ValueTag::Object,
        }
    }

    /// Type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Array elements
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Null => f.write_str("null"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(handle) => write!(f, "<object {:p}>", handle.as_ptr()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Lowered arguments for one native call.
///
/// Keeps the backing storage of every string and array alive; the
/// `AbiValue`s are valid until the frame is dropped.
#[derive(Debug, Default)]
pub struct ArgFrame {
    strings: Vec<CString>,
    arrays: Vec<Vec<AbiValue>>,
    values: Vec<AbiValue>,
}

impl ArgFrame {
    /// Lower `args` into ABI values
    pub fn lower(args: &[Value]) -> Result<Self, MarshalError> {
        let mut frame = ArgFrame::default();
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(frame.lower_value(arg, 0)?);
        }
        frame.values = values;
        Ok(frame)
    }

    fn lower_value(&mut self, value: &Value, depth: usize) -> Result<AbiValue, MarshalError> {
        if depth >= MAX_DEPTH {
            return Err(MarshalError::TooDeep(MAX_DEPTH));
        }
        Ok(match value {
            Value::Int(i) => AbiValue::int(*i),
            Value::Float(f) => AbiValue::float(*f),
            Value::Bool(b) => AbiValue::bool(*b),
            Value::Null => AbiValue::null(),
            Value::Str(s) => {
                let owned = CString::new(s.as_str()).map_err(|_| MarshalError::InteriorNul)?;
                // The heap buffer of a CString does not move with the Vec.
                let ptr = owned.as_ptr();
                self.strings.push(owned);
                AbiValue::str_ptr(ptr)
            }
            Value::Array(items) => {
                if items.is_empty() {
                    return Ok(AbiValue::array(std::ptr::null_mut(), 0));
                }
                let mut lowered = Vec::with_capacity(items.len());
                for item in items {
                    lowered.push(self.lower_value(item, depth + 1)?);
                }
                let ptr = lowered.as_mut_ptr();
                let len = lowered.len();
                self.arrays.push(lowered);
                AbiValue::array(ptr, len)
            }
            Value::Object(handle) => AbiValue::object(handle.as_ptr()),
        })
    }

    /// Lowered values
    pub fn values(&self) -> &[AbiValue] {
        &self.values
    }

    /// Pointer for the `args` parameter; null when there are no arguments
    pub fn as_ptr(&self) -> *const AbiValue {
        if self.values.is_empty() {
            std::ptr::null()
        } else {
            self.values.as_ptr()
        }
    }

    /// Argument count
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no arguments
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Copy a returned value into an owned `Value`.
///
/// Nothing is freed; see [`reclaim`] for the ownership half of a return.
///
/// # Safety
/// Pointers inside `value` must be valid per the ABI: strings null-terminated,
/// arrays holding `len` initialized values.
pub unsafe fn lift(value: AbiValue) -> Result<Value, MarshalError> {
    lift_value(&value, 0)
}

unsafe fn lift_value(value: &AbiValue, depth: usize) -> Result<Value, MarshalError> {
    if depth >= MAX_DEPTH {
        return Err(MarshalError::TooDeep(MAX_DEPTH));
    }
    let tag = value
        .tag()
        .ok_or(MarshalError::UnknownTag(value.raw_tag()))?;
    Ok(match tag {
        ValueTag::Int => Value::Int(value.as_int().unwrap_or_default()),
        ValueTag::Float => Value::Float(value.as_float().unwrap_or_default()),
        ValueTag::Bool => Value::Bool(value.as_bool().unwrap_or_default()),
        ValueTag::Null => Value::Null,
        ValueTag::Object => Value::Object(ObjectHandle::from_ptr(
            value.as_object().unwrap_or(std::ptr::null_mut()),
        )),
        ValueTag::Str => match value.as_cstr() {
            None => Value::Null,
            Some(cstr) => Value::Str(cstr.to_string_lossy().into_owned()),
        },
        ValueTag::Array => {
            let raw = value.as_array_raw().unwrap_or(datacode_abi::AbiArray::EMPTY);
            let items = value.as_slice().ok_or(MarshalError::NullArray(raw.len))?;
            let mut lifted = Vec::with_capacity(items.len());
            for item in items {
                lifted.push(lift_value(item, depth + 1)?);
            }
            Value::Array(lifted)
        }
    })
}

/// Release the blocks of `blocks` that `value` reaches.
///
/// Only memory allocated during the call that produced `value` is released;
/// static data, argument storage and registration-time allocations are left
/// alone. Arrays are only entered when their storage is such a block and is
/// large enough for `len` values, so a value returned alongside a throw is
/// handled without trusting its other pointers. Returns the number of blocks
/// released.
pub fn reclaim(value: &AbiValue, blocks: &CallBlocks) -> usize {
    let mut found = Vec::new();
    collect(value, blocks, 0, &mut found);
    found.into_iter().filter(|&ptr| heap::release(ptr)).count()
}

fn collect(value: &AbiValue, blocks: &CallBlocks, depth: usize, found: &mut Vec<*mut u8>) {
    if depth >= MAX_DEPTH {
        return;
    }
    match value.tag() {
        Some(ValueTag::Str) => {
            if let Some(ptr) = value.as_str_ptr() {
                mark(ptr as *mut u8, blocks, found);
            }
        }
        Some(ValueTag::Array) => {
            let Some(raw) = value.as_array_raw() else {
                return;
            };
            let ptr = raw.ptr as *mut u8;
            if !mark(ptr, blocks, found) {
                return;
            }
            let needed = raw.len.checked_mul(std::mem::size_of::<AbiValue>());
            let fits = matches!(
                (needed, heap::block_size(ptr)),
                (Some(needed), Some(size)) if needed <= size
            );
            if !fits {
                return;
            }
            let items = unsafe { std::slice::from_raw_parts(raw.ptr as *const AbiValue, raw.len) };
            for item in items {
                collect(item, blocks, depth + 1, found);
            }
        }
        _ => {}
    }
}

/// Record `ptr` once; false when it is not one of the call's blocks or was
/// already seen
fn mark(ptr: *mut u8, blocks: &CallBlocks, found: &mut Vec<*mut u8>) -> bool {
    if !blocks.contains(ptr) || found.contains(&ptr) {
        return false;
    }
    found.push(ptr);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_str(s: &str) -> AbiValue {
        let ptr = heap::allocate(s.len() + 1);
        unsafe {
            std::ptr::copy_nonoverlapping(s.as_ptr(), ptr, s.len());
            *ptr.add(s.len()) = 0;
        }
        AbiValue::str_ptr(ptr as *const _)
    }

    /// String allocated through the `alloc` callback
    fn call_str(s: &str) -> AbiValue {
        let ptr = heap::vm_alloc(s.len() + 1) as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(s.as_ptr(), ptr, s.len());
            *ptr.add(s.len()) = 0;
        }
        AbiValue::str_ptr(ptr as *const _)
    }

    #[test]
    fn test_lower_scalars() {
        let frame = ArgFrame::lower(&[
            Value::Int(7),
            Value::Float(1.5),
            Value::Bool(true),
            Value::Null,
        ])
        .unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.values()[0].as_int(), Some(7));
        assert_eq!(frame.values()[1].as_float(), Some(1.5));
        assert_eq!(frame.values()[2].as_bool(), Some(true));
        assert!(frame.values()[3].is_null());
    }

    #[test]
    fn test_lower_string_and_array() {
        let frame = ArgFrame::lower(&[
            Value::from("hello"),
            Value::from(vec![Value::Int(1), Value::from("x")]),
        ])
        .unwrap();
        let s = unsafe { frame.values()[0].as_cstr() }.unwrap();
        assert_eq!(s.to_str().unwrap(), "hello");
        let items = unsafe { frame.values()[1].as_slice() }.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_int(), Some(1));
        assert_eq!(unsafe { items[1].as_cstr() }.unwrap().to_str().unwrap(), "x");
    }

    #[test]
    fn test_empty_frame_has_null_pointer() {
        let frame = ArgFrame::lower(&[]).unwrap();
        assert!(frame.is_empty());
        assert!(frame.as_ptr().is_null());
    }

    #[test]
    fn test_lower_rejects_interior_nul() {
        let err = ArgFrame::lower(&[Value::from("a\0b")]).unwrap_err();
        assert_eq!(err, MarshalError::InteriorNul);
    }

    #[test]
    fn test_lift_static_string_is_copied() {
        let value = unsafe { lift(AbiValue::static_str(c"static")) }.unwrap();
        assert_eq!(value, Value::from("static"));
    }

    #[test]
    fn test_lift_leaves_memory_alone() {
        let raw = heap_str("owned");
        let ptr = raw.as_str_ptr().unwrap() as *mut u8;
        let value = unsafe { lift(raw) }.unwrap();
        assert_eq!(value, Value::from("owned"));
        assert!(heap::owns(ptr));
        assert!(heap::release(ptr));
    }

    #[test]
    fn test_reclaim_releases_call_blocks() {
        heap::open_call();
        let s = call_str("twice");
        let block = heap::vm_alloc(2 * std::mem::size_of::<AbiValue>()) as *mut AbiValue;
        unsafe {
            block.write(s);
            block.add(1).write(s);
        }
        let blocks = heap::close_call();
        let raw = AbiValue::array(block, 2);

        let value = unsafe { lift(raw) }.unwrap();
        assert_eq!(value, Value::from(vec!["twice", "twice"]));
        assert_eq!(reclaim(&raw, &blocks), 2);
        assert!(!heap::owns(block as *const u8));
        assert!(!heap::owns(s.as_str_ptr().unwrap() as *const u8));
    }

    #[test]
    fn test_reclaim_skips_blocks_from_outside_the_call() {
        let earlier = heap_str("constant");
        heap::open_call();
        let block = heap::vm_alloc(std::mem::size_of::<AbiValue>()) as *mut AbiValue;
        unsafe { block.write(earlier) };
        let blocks = heap::close_call();

        assert_eq!(reclaim(&AbiValue::array(block, 1), &blocks), 1);
        let ptr = earlier.as_str_ptr().unwrap() as *mut u8;
        assert!(heap::owns(ptr));
        assert!(heap::release(ptr));
    }

    #[test]
    fn test_reclaim_does_not_trust_array_length() {
        heap::open_call();
        let block = heap::vm_alloc(std::mem::size_of::<AbiValue>()) as *mut AbiValue;
        unsafe { block.write(AbiValue::int(1)) };
        let blocks = heap::close_call();

        // Claims 1000 elements in a one-element block: only the block goes.
        assert_eq!(reclaim(&AbiValue::array(block, 1000), &blocks), 1);
        assert!(!heap::owns(block as *const u8));
    }

    #[test]
    fn test_lift_null_payloads() {
        let value = unsafe { lift(AbiValue::str_ptr(std::ptr::null())) }.unwrap();
        assert_eq!(value, Value::Null);
        let value = unsafe { lift(AbiValue::array(std::ptr::null_mut(), 0)) }.unwrap();
        assert_eq!(value, Value::Array(vec![]));
        let err = unsafe { lift(AbiValue::array(std::ptr::null_mut(), 3)) }.unwrap_err();
        assert_eq!(err, MarshalError::NullArray(3));
    }

    #[test]
    fn test_lift_unknown_tag() {
        let mut raw = AbiValue::int(1);
        unsafe { (&mut raw as *mut AbiValue as *mut u8).write(42) };
        let err = unsafe { lift(raw) }.unwrap_err();
        assert_eq!(err, MarshalError::UnknownTag(42));
    }

    #[test]
    fn test_object_handle_passes_through() {
        let mut target = 5u32;
        let handle = ObjectHandle::from_ptr(&mut target as *mut u32 as *mut c_void);
        let frame = ArgFrame::lower(&[Value::Object(handle)]).unwrap();
        let back = unsafe { lift(frame.values()[0]) }.unwrap();
        assert_eq!(back, Value::Object(handle));
    }

    #[test]
    fn test_display() {
        let value = Value::from(vec![Value::Int(1), Value::from("a"), Value::Null]);
        assert_eq!(value.to_string(), "[1, \"a\", null]");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
    }
}
