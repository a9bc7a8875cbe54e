//! Error codes a module reports through `VmContext::throw_error`

use std::fmt;

/// Failure severity signalled by a native module.
///
/// Discriminants are part of the ABI and never change within a major version.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No error
    Ok = 0,
    /// Argument shape mismatch detected by the module
    TypeError = 1,
    /// Expected, catchable failure
    RuntimeError = 2,
    /// Unrecoverable internal module fault
    Panic = 3,
}

impl ErrorCode {
    /// Decode a raw discriminant (e.g. one read from C code)
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Ok),
            1 => Some(Self::TypeError),
            2 => Some(Self::RuntimeError),
            3 => Some(Self::Panic),
            _ => None,
        }
    }

    /// Raw discriminant
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::TypeError => "TypeError",
            Self::RuntimeError => "RuntimeError",
            Self::Panic => "Panic",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_are_stable() {
        assert_eq!(ErrorCode::Ok.raw(), 0);
        assert_eq!(ErrorCode::TypeError.raw(), 1);
        assert_eq!(ErrorCode::RuntimeError.raw(), 2);
        assert_eq!(ErrorCode::Panic.raw(), 3);
        assert_eq!(std::mem::size_of::<ErrorCode>(), 4);
    }

    #[test]
    fn test_from_raw() {
        for code in [
            ErrorCode::Ok,
            ErrorCode::TypeError,
            ErrorCode::RuntimeError,
            ErrorCode::Panic,
        ] {
            assert_eq!(ErrorCode::from_raw(code.raw()), Some(code));
        }
        assert_eq!(ErrorCode::from_raw(4), None);
    }
}
