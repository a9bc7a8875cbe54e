//! Module descriptor returned by the `datacode_module` entry point

use std::ffi::{c_char, CStr};

use crate::context::VmContext;
use crate::version::AbiVersion;

/// Symbol every native module exports.
pub const DATACODE_MODULE_SYMBOL: &str = "datacode_module";

/// Registration callback; invoked exactly once after version validation.
pub type RegisterFn = extern "C" fn(ctx: *mut VmContext);

/// Signature of the exported `datacode_module` symbol.
pub type ModuleEntryFn = extern "C" fn() -> *const ModuleDescriptor;

/// Static description of a native module.
///
/// A module returns a pointer to a single process-lifetime instance.
#[repr(C)]
#[derive(Debug)]
pub struct ModuleDescriptor {
    /// ABI the module was compiled against
    pub abi_version: AbiVersion,
    /// Null-terminated module name
    pub name: *const c_char,
    /// Registration callback (nullable on the C side)
    pub register_fn: Option<RegisterFn>,
}

// Descriptors are immutable statics; the name points at static data.
unsafe impl Sync for ModuleDescriptor {}
unsafe impl Send for ModuleDescriptor {}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(std::mem::size_of::<ModuleDescriptor>() == 24);
    assert!(std::mem::offset_of!(ModuleDescriptor, abi_version) == 0);
    assert!(std::mem::offset_of!(ModuleDescriptor, name) == 8);
    assert!(std::mem::offset_of!(ModuleDescriptor, register_fn) == 16);
};

impl ModuleDescriptor {
    /// Build a descriptor suitable for a `static`
    pub const fn new(name: &'static CStr, abi_version: AbiVersion, register_fn: RegisterFn) -> Self {
        Self {
            abi_version,
            name: name.as_ptr(),
            register_fn: Some(register_fn),
        }
    }

    /// Module name, `None` if the pointer is null
    ///
    /// # Safety
    /// A non-null `name` must point at a null-terminated string that lives
    /// as long as the descriptor.
    pub unsafe fn name(&self) -> Option<&CStr> {
        if self.name.is_null() {
            None
        } else {
            Some(CStr::from_ptr(self.name))
        }
    }
}
