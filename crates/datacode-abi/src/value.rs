//! AbiValue - tagged union passed across the VM/module boundary
//!
//! # Layout (64-bit targets)
//!
//! ```text
//! offset  size  field
//!      0     1  tag        (ValueTag as u8)
//!      1     7  reserved   (always zero, never read)
//!      8    16  payload    (union, see AbiPayload)
//! total 24, align 8
//! ```
//!
//! Strings are null-terminated and their length is always found by scanning.
//! Only arrays carry an explicit length.

use std::ffi::{c_char, c_void, CStr};
use std::fmt;
use std::ptr;

/// Discriminator stored in the first byte of an [`AbiValue`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTag {
    /// 64-bit signed integer
    Int = 0,
    /// IEEE 754 double
    Float = 1,
    /// Boolean stored as one byte (0 or 1)
    Bool = 2,
    /// Borrowed null-terminated byte string
    Str = 3,
    /// No payload
    Null = 4,
    /// Pointer + length of contiguous `AbiValue`s
    Array = 5,
    /// Opaque pointer, passed through uninterpreted
    Object = 6,
}

impl ValueTag {
    /// Decode a tag byte; unknown bytes yield `None`
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Int),
            1 => Some(Self::Float),
            2 => Some(Self::Bool),
            3 => Some(Self::Str),
            4 => Some(Self::Null),
            5 => Some(Self::Array),
            6 => Some(Self::Object),
            _ => None,
        }
    }

    /// Type name used in diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Null => "null",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Array payload: `len` values starting at `ptr`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiArray {
    /// First element (may be null when `len == 0`)
    pub ptr: *mut AbiValue,
    /// Element count
    pub len: usize,
}

impl AbiArray {
    /// The empty array
    pub const EMPTY: AbiArray = AbiArray {
        ptr: ptr::null_mut(),
        len: 0,
    };
}

/// Payload union. Which member is valid is decided by the tag alone.
#[repr(C)]
#[derive(Clone, Copy)]
pub union AbiPayload {
    /// `ValueTag::Int`
    pub int_val: i64,
    /// `ValueTag::Float`
    pub float_val: f64,
    /// `ValueTag::Bool` (0 or 1)
    pub bool_val: u8,
    /// `ValueTag::Str`
    pub str_val: *const c_char,
    /// `ValueTag::Array`
    pub array_val: AbiArray,
    /// `ValueTag::Object`
    pub object_val: *mut c_void,
}

impl AbiPayload {
    /// All payload bytes zero
    const ZERO: AbiPayload = AbiPayload {
        array_val: AbiArray::EMPTY,
    };
}

/// Dynamically-typed value with a fixed, compiler-independent layout.
///
/// Constructors zero every byte that the active member does not cover, so
/// two equal values are also byte-identical.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AbiValue {
    tag: u8,
    _reserved: [u8; 7],
    payload: AbiPayload,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(std::mem::size_of::<AbiValue>() == 24);
    assert!(std::mem::align_of::<AbiValue>() == 8);
    assert!(std::mem::offset_of!(AbiValue, tag) == 0);
    assert!(std::mem::offset_of!(AbiValue, payload) == 8);
    assert!(std::mem::size_of::<AbiPayload>() == 16);
};

impl AbiValue {
    #[inline]
    const fn with_payload(tag: ValueTag, payload: AbiPayload) -> Self {
        Self {
            tag: tag as u8,
            _reserved: [0; 7],
            payload,
        }
    }

    /// Create an integer value
    #[inline]
    pub const fn int(i: i64) -> Self {
        let mut payload = AbiPayload::ZERO;
        payload.int_val = i;
        Self::with_payload(ValueTag::Int, payload)
    }

    /// Create a float value; the bit pattern is kept as-is (NaN included)
    #[inline]
    pub const fn float(f: f64) -> Self {
        let mut payload = AbiPayload::ZERO;
        payload.float_val = f;
        Self::with_payload(ValueTag::Float, payload)
    }

    /// Create a boolean value
    #[inline]
    pub const fn bool(b: bool) -> Self {
        let mut payload = AbiPayload::ZERO;
        payload.bool_val = b as u8;
        Self::with_payload(ValueTag::Bool, payload)
    }

    /// Create the null value
    #[inline]
    pub const fn null() -> Self {
        Self::with_payload(ValueTag::Null, AbiPayload::ZERO)
    }

    /// Create a string value from a null-terminated pointer.
    ///
    /// The value borrows the bytes; the producer keeps them alive for at
    /// least the duration of the consuming call.
    #[inline]
    pub const fn str_ptr(s: *const c_char) -> Self {
        let mut payload = AbiPayload::ZERO;
        payload.str_val = s;
        Self::with_payload(ValueTag::Str, payload)
    }

    /// Create a string value borrowing a `'static` C string
    #[inline]
    pub const fn static_str(s: &'static CStr) -> Self {
        Self::str_ptr(s.as_ptr())
    }

    /// Create an array value over `len` elements at `ptr`
    #[inline]
    pub const fn array(ptr: *mut AbiValue, len: usize) -> Self {
        let mut payload = AbiPayload::ZERO;
        payload.array_val = AbiArray { ptr, len };
        Self::with_payload(ValueTag::Array, payload)
    }

    /// Create an opaque object value
    #[inline]
    pub const fn object(ptr: *mut c_void) -> Self {
        let mut payload = AbiPayload::ZERO;
        payload.object_val = ptr;
        Self::with_payload(ValueTag::Object, payload)
    }

    /// Raw tag byte
    #[inline]
    pub const fn raw_tag(&self) -> u8 {
        self.tag
    }

    /// Decoded tag, `None` if the byte is not a known tag
    #[inline]
    pub const fn tag(&self) -> Option<ValueTag> {
        ValueTag::from_u8(self.tag)
    }

    /// Raw payload union
    #[inline]
    pub const fn payload(&self) -> AbiPayload {
        self.payload
    }

    /// Whether this is the null value
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.tag == ValueTag::Null as u8
    }

    /// Integer payload if tagged `Int`
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        if self.tag == ValueTag::Int as u8 {
            Some(unsafe { self.payload.int_val })
        } else {
            None
        }
    }

    /// Float payload if tagged `Float`
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        if self.tag == ValueTag::Float as u8 {
            Some(unsafe { self.payload.float_val })
        } else {
            None
        }
    }

    /// Boolean payload if tagged `Bool`
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        if self.tag == ValueTag::Bool as u8 {
            Some(unsafe { self.payload.bool_val } != 0)
        } else {
            None
        }
    }

    /// String pointer if tagged `Str`
    #[inline]
    pub fn as_str_ptr(&self) -> Option<*const c_char> {
        if self.tag == ValueTag::Str as u8 {
            Some(unsafe { self.payload.str_val })
        } else {
            None
        }
    }

    /// Array pointer and length if tagged `Array`
    #[inline]
    pub fn as_array_raw(&self) -> Option<AbiArray> {
        if self.tag == ValueTag::Array as u8 {
            Some(unsafe { self.payload.array_val })
        } else {
            None
        }
    }

    /// Opaque pointer if tagged `Object`
    #[inline]
    pub fn as_object(&self) -> Option<*mut c_void> {
        if self.tag == ValueTag::Object as u8 {
            Some(unsafe { self.payload.object_val })
        } else {
            None
        }
    }

    /// Borrow the string bytes.
    ///
    /// Returns `None` for non-strings and null pointers.
    ///
    /// # Safety
    /// A non-null string pointer must reference a null-terminated sequence
    /// that stays valid for `'a`.
    #[inline]
    pub unsafe fn as_cstr<'a>(&self) -> Option<&'a CStr> {
        match self.as_str_ptr() {
            Some(p) if !p.is_null() => Some(CStr::from_ptr(p)),
            _ => None,
        }
    }

    /// Borrow the array elements.
    ///
    /// Returns `None` for non-arrays. A null pointer with zero length is the
    /// empty slice; a null pointer with a non-zero length yields `None`.
    ///
    /// # Safety
    /// A non-null pointer must reference `len` initialized values that stay
    /// valid for `'a`.
    #[inline]
    pub unsafe fn as_slice<'a>(&self) -> Option<&'a [AbiValue]> {
        let arr = self.as_array_raw()?;
        if arr.ptr.is_null() {
            return if arr.len == 0 { Some(&[] as &[AbiValue]) } else { None };
        }
        Some(std::slice::from_raw_parts(arr.ptr, arr.len))
    }

    /// Diagnostic type name (`"unknown"` for a corrupt tag)
    pub fn type_name(&self) -> &'static str {
        self.tag().map(ValueTag::name).unwrap_or("unknown")
    }
}

impl Default for AbiValue {
    fn default() -> Self {
        Self::null()
    }
}

/// Equality compares the tag and the one valid member. Floats compare by bit
/// pattern; pointers compare by address.
impl PartialEq for AbiValue {
    fn eq(&self, other: &Self) -> bool {
        if self.tag != other.tag {
            return false;
        }
        match self.tag() {
            Some(ValueTag::Int) => self.as_int() == other.as_int(),
            Some(ValueTag::Float) => {
                self.as_float().map(f64::to_bits) == other.as_float().map(f64::to_bits)
            }
            Some(ValueTag::Bool) => self.as_bool() == other.as_bool(),
            Some(ValueTag::Str) => self.as_str_ptr() == other.as_str_ptr(),
            Some(ValueTag::Null) => true,
            Some(ValueTag::Array) => self.as_array_raw() == other.as_array_raw(),
            Some(ValueTag::Object) => self.as_object() == other.as_object(),
            None => false,
        }
    }
}

impl fmt::Debug for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Some(ValueTag::Int) => write!(f, "AbiValue::Int({})", unsafe { self.payload.int_val }),
            Some(ValueTag::Float) => {
                write!(f, "AbiValue::Float({})", unsafe { self.payload.float_val })
            }
            Some(ValueTag::Bool) => {
                write!(f, "AbiValue::Bool({})", unsafe { self.payload.bool_val } != 0)
            }
            Some(ValueTag::Str) => write!(f, "AbiValue::Str({:p})", unsafe { self.payload.str_val }),
            Some(ValueTag::Null) => write!(f, "AbiValue::Null"),
            Some(ValueTag::Array) => {
                let arr = unsafe { self.payload.array_val };
                write!(f, "AbiValue::Array({:p}, len={})", arr.ptr, arr.len)
            }
            Some(ValueTag::Object) => {
                write!(f, "AbiValue::Object({:p})", unsafe { self.payload.object_val })
            }
            None => write!(f, "AbiValue::Unknown(tag={})", self.tag),
        }
    }
}
