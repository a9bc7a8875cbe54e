//! Error types for native module code

use datacode_abi::ErrorCode;

/// Result type for SDK operations
pub type NativeResult<T> = Result<T, NativeError>;

/// Native module error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Wrong number of arguments
    #[error("Expected {expected} arguments, got {got}")]
    ArgumentCount {
        /// Declared arity
        expected: usize,
        /// Supplied `argc`
        got: usize,
    },

    /// Argument index past `argc`
    #[error("Missing argument {0}")]
    MissingArgument(usize),

    /// Expected, catchable failure
    #[error("{0}")]
    Runtime(String),

    /// Function panicked
    #[error("Function panicked: {0}")]
    Panic(String),

    /// VM allocator returned null
    #[error("Out of VM memory allocating {0} bytes")]
    OutOfMemory(usize),

    /// Module-level error (registration)
    #[error("Module error: {0}")]
    ModuleError(String),
}

impl NativeError {
    /// ABI error code reported for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            NativeError::TypeMismatch { .. }
            | NativeError::ArgumentCount { .. }
            | NativeError::MissingArgument(_) => ErrorCode::TypeError,
            NativeError::Runtime(_) | NativeError::OutOfMemory(_) | NativeError::ModuleError(_) => {
                ErrorCode::RuntimeError
            }
            NativeError::Panic(_) => ErrorCode::Panic,
        }
    }

    pub(crate) fn type_mismatch(expected: &str, got: &str) -> Self {
        NativeError::TypeMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

impl From<String> for NativeError {
    fn from(s: String) -> Self {
        NativeError::Runtime(s)
    }
}

impl From<&str> for NativeError {
    fn from(s: &str) -> Self {
        NativeError::Runtime(s.to_string())
    }
}
