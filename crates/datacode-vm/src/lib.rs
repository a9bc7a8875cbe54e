//! DataCode VM host side of the native-module ABI
//!
//! Loads shared libraries that export `datacode_module`, validates their ABI
//! version, runs their registration callback and dispatches calls into the
//! registered functions.
//!
//! # Example
//!
//! ```ignore
//! use datacode_vm::{NativeVm, Value, VmConfig};
//!
//! let mut vm = NativeVm::with_config(VmConfig::default().with_search_path("./modules"));
//! vm.load("math")?;
//! let sum = vm.call("add", &[Value::Int(2), Value::Int(3)])?;
//! assert_eq!(sum, Value::Int(5));
//! ```

#![warn(missing_docs)]

pub mod config;
mod context;
pub mod error;
pub mod heap;
pub mod loader;
pub mod module;
pub mod registry;
pub mod resolver;
pub mod value;
mod vm;

pub use config::{VersionConfig, VmConfig};
pub use error::{CallError, ConfigError, LoadError, MarshalError, RegistrationFailure};
pub use loader::Library;
pub use module::{LoadAttempt, ModuleInfo, ModuleState};
pub use registry::{CollisionPolicy, NativeRegistry, RegisteredFn};
pub use resolver::{library_file_name, ModuleResolver, MODULE_PATH_ENV};
pub use heap::CallBlocks;
pub use value::{lift, reclaim, ArgFrame, ObjectHandle, Value};
pub use vm::NativeVm;

pub use datacode_abi::{AbiVersion, ErrorCode, DATACODE_ABI_VERSION};
