//! Host implementation of the `VmContext` callbacks
//!
//! `throw_error` carries no context, so failures go to a per-thread pending
//! slot that the VM clears before and takes after every native call.
//! `register_native` finds its per-load state through [`HostContext`], whose
//! first field is the ABI table the module receives.

use std::cell::RefCell;
use std::ffi::{c_char, CStr};

use datacode_abi::{ErrorCode, NativeFn, VmContext};
use tracing::{debug, warn};

use crate::heap::{vm_alloc, vm_free};

/// Failure signalled by native code through `throw_error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NativeFailure {
    /// Code passed to `throw_error`
    pub(crate) code: ErrorCode,
    /// Copied message
    pub(crate) message: String,
}

thread_local! {
    static PENDING: RefCell<Option<NativeFailure>> = const { RefCell::new(None) };
}

/// Clear the pending slot before handing control to native code
pub(crate) fn begin_native() {
    PENDING.with(|p| p.borrow_mut().take());
}

/// Take the failure recorded since [`begin_native`], if any
pub(crate) fn take_failure() -> Option<NativeFailure> {
    PENDING.with(|p| p.borrow_mut().take())
}

/// Copy a C string, treating null as empty
unsafe fn copy_message(message: *const c_char) -> String {
    if message.is_null() {
        String::new()
    } else {
        CStr::from_ptr(message).to_string_lossy().into_owned()
    }
}

/// Decode the raw code of a throw. Codes outside the ABI are a module fault
/// and are reported as `Panic`.
fn decode_failure(raw: u32, message: String) -> NativeFailure {
    match ErrorCode::from_raw(raw) {
        Some(code) => NativeFailure { code, message },
        None => {
            warn!(code = raw, "throw_error called with an unknown error code");
            NativeFailure {
                code: ErrorCode::Panic,
                message: format!("unknown error code {}: {}", raw, message),
            }
        }
    }
}

extern "C" fn vm_throw_error(code: u32, message: *const c_char) {
    let failure = decode_failure(code, unsafe { copy_message(message) });
    PENDING.with(|p| {
        let mut slot = p.borrow_mut();
        if slot.is_some() {
            debug!(code = %failure.code, message = %failure.message, "ignoring second throw in the same call");
        } else {
            *slot = Some(failure);
        }
    });
}

/// Functions staged by one registration callback
#[derive(Debug)]
pub(crate) struct Registration {
    module: String,
    open: bool,
    staged: Vec<(String, NativeFn)>,
    problems: Vec<String>,
}

impl Registration {
    pub(crate) fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            open: true,
            staged: Vec::new(),
            problems: Vec::new(),
        }
    }

    /// End the registration window; later `register_native` calls are ignored
    pub(crate) fn close(&mut self) {
        self.open = false;
    }

    pub(crate) fn problems(&self) -> &[String] {
        &self.problems
    }

    pub(crate) fn into_staged(self) -> Vec<(String, NativeFn)> {
        self.staged
    }

    fn stage(&mut self, name: *const c_char, func: Option<NativeFn>) {
        if name.is_null() {
            self.problems.push("null function name".to_string());
            return;
        }
        let name = match unsafe { CStr::from_ptr(name) }.to_str() {
            Ok(name) => name,
            Err(_) => {
                self.problems.push("function name is not valid UTF-8".to_string());
                return;
            }
        };
        if name.is_empty() {
            self.problems.push("empty function name".to_string());
            return;
        }
        let Some(func) = func else {
            self.problems
                .push(format!("null function pointer for '{}'", name));
            return;
        };
        if self.staged.iter().any(|(n, _)| n == name) {
            self.problems
                .push(format!("function '{}' registered twice", name));
            return;
        }
        debug!(module = %self.module, function = name, "native function staged");
        self.staged.push((name.to_string(), func));
    }
}

/// The context handed to modules: the ABI table followed by host state.
#[repr(C)]
pub(crate) struct HostContext {
    table: VmContext,
    registration: *mut Registration,
}

impl HostContext {
    fn with_registration(registration: *mut Registration) -> Self {
        Self {
            table: VmContext {
                alloc: vm_alloc,
                throw_error: vm_throw_error,
                register_native: vm_register_native,
                free: vm_free,
            },
            registration,
        }
    }

    /// Context for a registration callback staging into `registration`
    pub(crate) fn for_registration(registration: &mut Registration) -> Self {
        Self::with_registration(registration)
    }

    /// Context for an ordinary native call; registration is refused
    pub(crate) fn for_call() -> Self {
        Self::with_registration(std::ptr::null_mut())
    }

    /// Pointer passed across the boundary
    pub(crate) fn as_abi(&mut self) -> *mut VmContext {
        &mut self.table
    }
}

extern "C" fn vm_register_native(ctx: *mut VmContext, name: *const c_char, func: Option<NativeFn>) {
    if ctx.is_null() {
        warn!("register_native called with a null context");
        return;
    }
    // `table` is the first field of the repr(C) HostContext.
    let host = ctx as *mut HostContext;
    let registration = unsafe { (*host).registration };
    if registration.is_null() {
        warn!("register_native called outside a registration callback; ignored");
        return;
    }
    let registration = unsafe { &mut *registration };
    if !registration.open {
        warn!(module = %registration.module, "register_native called after registration returned; ignored");
        return;
    }
    registration.stage(name, func);
}
