//! Conversions between `AbiValue` and Rust types
//!
//! `FromAbi` reads arguments, `ToAbi` builds return values. Heap-shaped
//! results (strings, vectors) are allocated through the VM so the VM can
//! take ownership of them.

use datacode_abi::{AbiValue, ValueTag};

use crate::context::NativeCall;
use crate::error::{NativeError, NativeResult};

/// Convert a borrowed argument into a Rust type.
///
/// Implement this trait to allow your type to be received as a function argument.
pub trait FromAbi<'a>: Sized {
    /// Convert, returning `TypeMismatch` if the tag doesn't fit
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self>;
}

/// Convert a Rust value into a return `AbiValue`.
///
/// Implement this trait to allow your type to be returned from a function.
pub trait ToAbi {
    /// Convert, allocating through `call` where needed
    fn to_abi(self, call: &NativeCall<'_>) -> NativeResult<AbiValue>;
}

fn mismatch(expected: &str, value: &AbiValue) -> NativeError {
    NativeError::type_mismatch(expected, value.type_name())
}

// ============================================================================
// FromAbi implementations
// ============================================================================

impl<'a> FromAbi<'a> for i64 {
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self> {
        value.as_int().ok_or_else(|| mismatch("int", value))
    }
}

/// Ints widen to floats; nothing else converts.
impl<'a> FromAbi<'a> for f64 {
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self> {
        value
            .as_float()
            .or_else(|| value.as_int().map(|i| i as f64))
            .ok_or_else(|| mismatch("float", value))
    }
}

impl<'a> FromAbi<'a> for bool {
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl<'a> FromAbi<'a> for &'a str {
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self> {
        // Argument strings are kept alive by the VM for the whole call.
        let cstr = unsafe { value.as_cstr() }.ok_or_else(|| mismatch("str", value))?;
        cstr.to_str()
            .map_err(|_| NativeError::type_mismatch("utf-8 str", "invalid utf-8"))
    }
}

impl<'a> FromAbi<'a> for String {
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self> {
        <&str>::from_abi(value).map(str::to_string)
    }
}

impl<'a> FromAbi<'a> for &'a [AbiValue] {
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self> {
        unsafe { value.as_slice() }.ok_or_else(|| mismatch("array", value))
    }
}

impl<'a> FromAbi<'a> for AbiValue {
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self> {
        Ok(*value)
    }
}

/// `Null` maps to `None`, anything else goes through `T`.
impl<'a, T: FromAbi<'a>> FromAbi<'a> for Option<T> {
    fn from_abi(value: &'a AbiValue) -> NativeResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_abi(value).map(Some)
        }
    }
}

// ============================================================================
// ToAbi implementations
// ============================================================================

impl ToAbi for AbiValue {
    fn to_abi(self, _call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        Ok(self)
    }
}

impl ToAbi for i64 {
    fn to_abi(self, _call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        Ok(AbiValue::int(self))
    }
}

impl ToAbi for i32 {
    fn to_abi(self, _call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        Ok(AbiValue::int(self as i64))
    }
}

impl ToAbi for f64 {
    fn to_abi(self, _call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        Ok(AbiValue::float(self))
    }
}

impl ToAbi for bool {
    fn to_abi(self, _call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        Ok(AbiValue::bool(self))
    }
}

// Unit type (for functions that return nothing)
impl ToAbi for () {
    fn to_abi(self, _call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        Ok(AbiValue::null())
    }
}

impl ToAbi for &str {
    fn to_abi(self, call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        call.alloc_str(self)
    }
}

impl ToAbi for String {
    fn to_abi(self, call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        call.alloc_str(&self)
    }
}

impl<T: ToAbi> ToAbi for Option<T> {
    fn to_abi(self, call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        match self {
            Some(v) => v.to_abi(call),
            None => Ok(AbiValue::null()),
        }
    }
}

impl<T: ToAbi> ToAbi for Vec<T> {
    fn to_abi(self, call: &NativeCall<'_>) -> NativeResult<AbiValue> {
        let items = self
            .into_iter()
            .map(|item| item.to_abi(call))
            .collect::<NativeResult<Vec<_>>>()?;
        call.alloc_array(&items)
    }
}

// ============================================================================
// Index-based readers
// ============================================================================

/// Argument `i` as i64, or `None` if missing or not an `Int`.
#[inline]
pub fn get_int(args: &[AbiValue], i: usize) -> Option<i64> {
    args.get(i).and_then(AbiValue::as_int)
}

/// Argument `i` as f64 (ints widen), or `None` if missing or not numeric.
#[inline]
pub fn get_float(args: &[AbiValue], i: usize) -> Option<f64> {
    args.get(i).and_then(|v| f64::from_abi(v).ok())
}

/// Argument `i` as bool, or `None` if missing or not a `Bool`.
#[inline]
pub fn get_bool(args: &[AbiValue], i: usize) -> Option<bool> {
    args.get(i).and_then(AbiValue::as_bool)
}

/// Argument `i` as &str. Valid only during the native call.
/// Returns `None` if missing, null, not a `Str` or invalid UTF-8.
#[inline]
pub fn get_str(args: &[AbiValue], i: usize) -> Option<&str> {
    args.get(i).and_then(|v| <&str>::from_abi(v).ok())
}

/// Tag of argument `i`
#[inline]
pub fn get_tag(args: &[AbiValue], i: usize) -> Option<ValueTag> {
    args.get(i).and_then(AbiValue::tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_abi_primitives() {
        assert_eq!(i64::from_abi(&AbiValue::int(42)).unwrap(), 42);
        assert_eq!(f64::from_abi(&AbiValue::float(2.5)).unwrap(), 2.5);
        assert_eq!(f64::from_abi(&AbiValue::int(3)).unwrap(), 3.0);
        assert!(bool::from_abi(&AbiValue::bool(true)).unwrap());
        assert_eq!(Option::<i64>::from_abi(&AbiValue::null()).unwrap(), None);
    }

    #[test]
    fn test_from_abi_mismatch() {
        let err = i64::from_abi(&AbiValue::static_str(c"x")).unwrap_err();
        assert_eq!(
            err,
            NativeError::TypeMismatch {
                expected: "int".into(),
                got: "str".into()
            }
        );
        assert!(bool::from_abi(&AbiValue::int(1)).is_err());
        assert!(<&str>::from_abi(&AbiValue::null()).is_err());
    }

    #[test]
    fn test_getters() {
        let args = [
            AbiValue::int(2),
            AbiValue::static_str(c"two"),
            AbiValue::bool(false),
        ];
        assert_eq!(get_int(&args, 0), Some(2));
        assert_eq!(get_float(&args, 0), Some(2.0));
        assert_eq!(get_str(&args, 1), Some("two"));
        assert_eq!(get_bool(&args, 2), Some(false));
        assert_eq!(get_int(&args, 1), None);
        assert_eq!(get_int(&args, 5), None);
        assert_eq!(get_tag(&args, 1), Some(ValueTag::Str));
    }
}
