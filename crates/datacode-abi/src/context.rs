//! VmContext capability table and the native function signature

use std::ffi::{c_char, c_void};

use crate::value::AbiValue;

/// Signature every native-callable function satisfies.
///
/// `args` points at `argc` values borrowed for the duration of the call (it
/// may be null when `argc == 0`). On failure the function calls
/// `throw_error` before returning; the returned value is then ignored.
pub type NativeFn = extern "C" fn(ctx: *mut VmContext, args: *const AbiValue, argc: usize) -> AbiValue;

/// Allocate `size` bytes of VM-managed memory. Returns null on failure.
pub type AllocFn = extern "C" fn(size: usize) -> *mut c_void;

/// Return memory obtained from `alloc` to the VM. Null is a no-op.
pub type FreeFn = extern "C" fn(ptr: *mut c_void);

/// Abort the current native call with an error code and message.
///
/// `code` is the raw value of an [`ErrorCode`](crate::ErrorCode); C callers
/// pass a plain `DatacodeError`, so the VM decodes it with
/// [`ErrorCode::from_raw`](crate::ErrorCode::from_raw).
pub type ThrowErrorFn = extern "C" fn(code: u32, message: *const c_char);

/// Record `func` under `name`; only valid during `register_fn`.
///
/// `func` is nullable on the C side, hence the `Option`.
pub type RegisterNativeFn =
    extern "C" fn(ctx: *mut VmContext, name: *const c_char, func: Option<NativeFn>);

/// Capabilities the VM hands to a module.
///
/// Valid only while the call it was passed to is running. Modules must not
/// keep the pointer after returning.
#[repr(C)]
pub struct VmContext {
    /// Allocate VM-owned memory
    pub alloc: AllocFn,
    /// Signal failure of the current call
    pub throw_error: ThrowErrorFn,
    /// Register a native function (registration window only)
    pub register_native: RegisterNativeFn,
    /// Release memory obtained from `alloc`
    pub free: FreeFn,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(std::mem::size_of::<VmContext>() == 32);
    assert!(std::mem::offset_of!(VmContext, alloc) == 0);
    assert!(std::mem::offset_of!(VmContext, throw_error) == 8);
    assert!(std::mem::offset_of!(VmContext, register_native) == 16);
    assert!(std::mem::offset_of!(VmContext, free) == 24);
};

impl std::fmt::Debug for VmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmContext")
            .field("alloc", &(self.alloc as *const ()))
            .field("throw_error", &(self.throw_error as *const ()))
            .field("register_native", &(self.register_native as *const ()))
            .field("free", &(self.free as *const ()))
            .finish()
    }
}
