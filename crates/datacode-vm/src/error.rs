//! Error types for module loading, native calls and configuration

use datacode_abi::{AbiVersion, ErrorCode};
use thiserror::Error;

use crate::module::ModuleState;

/// Errors that can occur while loading a native module
#[derive(Debug, Error)]
pub enum LoadError {
    /// No library file matched the module name
    #[error("Native module not found: {name} (searched: {})", .searched.join(", "))]
    NotFound {
        /// Requested module name or path
        name: String,
        /// Candidate paths that were tried
        searched: Vec<String>,
    },

    /// The OS loader refused the library
    #[error("Failed to open library {path}: {reason}")]
    OpenFailed {
        /// Library path
        path: String,
        /// Loader message
        reason: String,
    },

    /// Symbol not found in library
    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// The descriptor returned by the entry point is unusable
    #[error("Invalid module descriptor from {module}: {reason}")]
    InvalidDescriptor {
        /// Library path or module label
        module: String,
        /// What was wrong
        reason: String,
    },

    /// Major ABI versions differ
    #[error("Module {module} was built for ABI {found}, VM implements {expected}")]
    VersionMismatch {
        /// Library path or module label
        module: String,
        /// VM version
        expected: AbiVersion,
        /// Version declared by the module
        found: AbiVersion,
    },

    /// The registration callback failed
    #[error("Registration of module '{module}' failed: {reason}")]
    RegistrationFailed {
        /// Module name
        module: String,
        /// Cause of the failure
        reason: RegistrationFailure,
    },

    /// A module with the same name is already active
    #[error("Module '{0}' is already loaded")]
    DuplicateModule(String),

    /// Platform-specific error
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// Invalid path encoding
    #[error("Invalid UTF-8 in path: {0}")]
    InvalidPath(String),
}

impl LoadError {
    /// Terminal state a module ends in after this error
    pub fn state(&self) -> ModuleState {
        match self {
            LoadError::VersionMismatch { .. } => ModuleState::VersionMismatch,
            LoadError::RegistrationFailed { .. } => ModuleState::RegistrationFailed,
            _ => ModuleState::LoadFailed,
        }
    }
}

/// Why a registration callback was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationFailure {
    /// The module called `throw_error` during registration
    #[error("module raised {code}: {message}")]
    Thrown {
        /// Error code passed to `throw_error`
        code: ErrorCode,
        /// Error message
        message: String,
    },

    /// `register_native` was called with unusable arguments
    #[error("invalid registration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// The function name is already provided by another active module
    #[error("function '{name}' is already provided by module '{owner}'")]
    Collision {
        /// Conflicting function name
        name: String,
        /// Module currently owning the name
        owner: String,
    },
}

/// Errors converting values across the boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    /// Strings crossing the boundary are null-terminated
    #[error("string contains an interior NUL byte")]
    InteriorNul,

    /// Tag byte outside the known range
    #[error("unknown value tag {0}")]
    UnknownTag(u8),

    /// Array with a null pointer and a nonzero length
    #[error("array of length {0} has a null pointer")]
    NullArray(usize),

    /// Arrays nested deeper than the VM accepts
    #[error("value nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Errors returned by `NativeVm::call`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// No active module registered this name
    #[error("Unknown native function: {0}")]
    UnknownFunction(String),

    /// The native function signalled failure through `throw_error`
    #[error("{code} in native function '{function}': {message}")]
    Native {
        /// Function that failed
        function: String,
        /// Code passed to `throw_error`
        code: ErrorCode,
        /// Message passed to `throw_error`
        message: String,
    },

    /// Arguments could not be lowered to ABI values
    #[error("Cannot pass arguments to '{function}': {source}")]
    Arguments {
        /// Target function
        function: String,
        /// Underlying conversion error
        source: MarshalError,
    },

    /// The returned value could not be read
    #[error("Invalid value returned by '{function}': {source}")]
    InvalidReturn {
        /// Function that returned it
        function: String,
        /// Underlying conversion error
        source: MarshalError,
    },
}

impl CallError {
    /// Error code reported by the native side, if the failure came from there
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            CallError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the native function panicked
    pub fn is_panic(&self) -> bool {
        self.code() == Some(ErrorCode::Panic)
    }
}

/// Errors that can occur when loading a VM configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}
