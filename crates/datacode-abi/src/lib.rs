//! DataCode ABI - binary contract between the VM and native modules
//!
//! Every type in this crate is `#[repr(C)]` and shared verbatim by both sides
//! of the boundary. The C header `include/datacode.h` mirrors these
//! definitions for modules written in other languages.
//!
//! # Loading sequence
//!
//! 1. The VM opens a shared library and resolves [`DATACODE_MODULE_SYMBOL`].
//! 2. Calling that symbol yields a `*const ModuleDescriptor`.
//! 3. The VM compares the descriptor's [`AbiVersion`] with its own via
//!    [`abi_compatible`].
//! 4. The VM calls `register_fn` once with a [`VmContext`]; the module calls
//!    `register_native` for each exported [`NativeFn`].
//!
//! # Example
//!
//! ```ignore
//! use datacode_abi::*;
//!
//! extern "C" fn register(ctx: *mut VmContext) {
//!     let table = unsafe { &*ctx };
//!     (table.register_native)(ctx, c"hello".as_ptr(), hello);
//! }
//!
//! static MODULE: ModuleDescriptor =
//!     ModuleDescriptor::new(c"hello_module", DATACODE_ABI_VERSION, register);
//!
//! #[no_mangle]
//! pub extern "C" fn datacode_module() -> *const ModuleDescriptor {
//!     &MODULE
//! }
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod module;
pub mod value;
pub mod version;

pub use context::{AllocFn, FreeFn, NativeFn, RegisterNativeFn, ThrowErrorFn, VmContext};
pub use error::ErrorCode;
pub use module::{ModuleDescriptor, ModuleEntryFn, RegisterFn, DATACODE_MODULE_SYMBOL};
pub use value::{AbiArray, AbiPayload, AbiValue, ValueTag};
pub use version::{abi_compatible, AbiVersion, DATACODE_ABI_VERSION};
