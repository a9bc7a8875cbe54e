//! DataCode SDK - writing native modules
//!
//! Re-exports the ABI types, ergonomic context wrappers, value conversions,
//! and the `#[native_fn]` / `#[module]` macros.
//!
//! # Example
//!
//! ```ignore
//! use datacode_sdk::{module, native_fn, ModuleContext, NativeResult};
//!
//! #[native_fn]
//! fn add(a: i64, b: i64) -> i64 {
//!     a + b
//! }
//!
//! #[module(name = "math")]
//! fn register(ctx: &mut ModuleContext) -> NativeResult<()> {
//!     ctx.register_fn("add", add_native)
//! }
//! ```
//!
//! `#[native_fn]` keeps `add` and generates the `extern "C"` trampoline
//! `add_native`; `#[module]` exports the `datacode_module` entry point.

#![warn(missing_docs)]

pub mod context;
pub mod convert;
pub mod error;

pub use datacode_abi::{
    abi_compatible, AbiArray, AbiValue, AbiVersion, ErrorCode, ModuleDescriptor, NativeFn,
    ValueTag, VmContext, DATACODE_ABI_VERSION, DATACODE_MODULE_SYMBOL,
};
pub use datacode_native::{module, native_fn};

pub use context::{ModuleContext, NativeCall};
pub use convert::{get_bool, get_float, get_int, get_str, get_tag, FromAbi, ToAbi};
pub use error::{NativeError, NativeResult};

/// Support code for macro expansions. Not a stable API.
#[doc(hidden)]
pub mod __private {
    use std::any::Any;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use datacode_abi::{AbiValue, ErrorCode, VmContext};

    use crate::context::{ModuleContext, NativeCall};
    use crate::error::{NativeError, NativeResult};

    /// Extract a readable message from a panic payload
    pub fn panic_message(payload: &(dyn Any + Send)) -> String {
        if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        }
    }

    /// Body of a `#[native_fn]` trampoline.
    ///
    /// Checks arity, runs `body` with panics caught, and turns every failure
    /// into a `throw_error` call followed by a null return.
    pub fn run_native<'a, F>(call: &NativeCall<'a>, name: &str, arity: usize, body: F) -> AbiValue
    where
        F: FnOnce() -> NativeResult<AbiValue>,
    {
        if let Err(e) = call.expect_argc(arity) {
            call.throw(ErrorCode::TypeError, &format!("{}: {}", name, e));
            return AbiValue::null();
        }
        match catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                call.raise(&e);
                AbiValue::null()
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                call.throw(
                    ErrorCode::Panic,
                    &format!("Function '{}' panicked: {}", name, msg),
                );
                AbiValue::null()
            }
        }
    }

    /// Body of the `register_fn` generated by `#[module]`.
    pub fn run_register<F>(ctx: *mut VmContext, module: &str, body: F)
    where
        F: FnOnce(&mut ModuleContext) -> NativeResult<()>,
    {
        let mut wrapper = unsafe { ModuleContext::from_raw(ctx) };
        match catch_unwind(AssertUnwindSafe(|| body(&mut wrapper))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                wrapper.throw(e.code(), &format!("{}: {}", module, e));
            }
            Err(payload) => {
                let err = NativeError::Panic(panic_message(payload.as_ref()));
                wrapper.throw(ErrorCode::Panic, &format!("{}: {}", module, err));
            }
        }
    }
}
