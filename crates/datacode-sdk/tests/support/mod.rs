//! In-process stand-in for the VM side of the context table.

#![allow(dead_code)]

use std::alloc::{alloc, Layout};
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr};

use datacode_sdk::{AbiValue, ErrorCode, NativeFn, VmContext};

thread_local! {
    static THROWN: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
    static REGISTERED: RefCell<Vec<(String, NativeFn)>> = const { RefCell::new(Vec::new()) };
}

extern "C" fn mock_alloc(size: usize) -> *mut c_void {
    // Test allocations are leaked.
    let layout = Layout::from_size_align(size.max(1), 16).unwrap();
    unsafe { alloc(layout) as *mut c_void }
}

extern "C" fn mock_free(_ptr: *mut c_void) {}

extern "C" fn mock_throw(code: u32, message: *const c_char) {
    let code = ErrorCode::from_raw(code).expect("unknown error code");
    let msg = if message.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
    };
    THROWN.with(|t| {
        let mut slot = t.borrow_mut();
        if slot.is_none() {
            *slot = Some((code, msg));
        }
    });
}

extern "C" fn mock_register(_ctx: *mut VmContext, name: *const c_char, func: Option<NativeFn>) {
    let name = unsafe { CStr::from_ptr(name) }.to_str().unwrap().to_string();
    let func = func.expect("null function pointer");
    REGISTERED.with(|r| r.borrow_mut().push((name, func)));
}

pub fn context() -> VmContext {
    VmContext {
        alloc: mock_alloc,
        throw_error: mock_throw,
        register_native: mock_register,
        free: mock_free,
    }
}

pub fn take_thrown() -> Option<(ErrorCode, String)> {
    THROWN.with(|t| t.borrow_mut().take())
}

pub fn take_registered() -> Vec<(String, NativeFn)> {
    REGISTERED.with(|r| std::mem::take(&mut *r.borrow_mut()))
}

/// Call `f` the way the VM would and report a thrown error instead of the value.
pub fn invoke(f: NativeFn, args: &[AbiValue]) -> Result<AbiValue, (ErrorCode, String)> {
    take_thrown();
    let mut ctx = context();
    let ptr = if args.is_empty() {
        std::ptr::null()
    } else {
        args.as_ptr()
    };
    let value = f(&mut ctx, ptr, args.len());
    match take_thrown() {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

pub fn read_str(value: &AbiValue) -> String {
    unsafe { value.as_cstr() }
        .expect("expected a string value")
        .to_str()
        .unwrap()
        .to_string()
}
