//! Ergonomic wrappers over the raw `VmContext`
//!
//! `ModuleContext` is used inside the registration callback, `NativeCall`
//! inside a native function. Both only borrow the context for the duration
//! of the call that received it.

use std::ffi::{c_void, CString};

use datacode_abi::{AbiValue, ErrorCode, NativeFn, VmContext};

use crate::convert::FromAbi;
use crate::error::{NativeError, NativeResult};

/// Registration-time wrapper around the raw context.
pub struct ModuleContext {
    ctx: *mut VmContext,
    registered: Vec<String>,
}

impl ModuleContext {
    /// Wrap the pointer received by `register_fn`.
    ///
    /// # Safety
    /// `ctx` must be the context passed to the running registration call
    /// (or null, in which case every registration fails).
    pub unsafe fn from_raw(ctx: *mut VmContext) -> Self {
        Self {
            ctx,
            registered: Vec::new(),
        }
    }

    /// Register a native function under `name`.
    ///
    /// The VM copies the name before returning, so no string is kept alive
    /// here.
    pub fn register_fn(&mut self, name: &str, func: NativeFn) -> NativeResult<()> {
        if self.ctx.is_null() {
            return Err(NativeError::ModuleError("null VM context".to_string()));
        }
        let cname = CString::new(name).map_err(|_| {
            NativeError::ModuleError(format!("function name contains NUL: {:?}", name))
        })?;
        let table = unsafe { &*self.ctx };
        (table.register_native)(self.ctx, cname.as_ptr(), Some(func));
        self.registered.push(name.to_string());
        Ok(())
    }

    /// Names registered through this wrapper so far
    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    /// Report a registration failure to the VM
    pub fn throw(&self, code: ErrorCode, message: &str) {
        raise_raw(self.ctx, code, message);
    }

    /// Copy `s` into VM memory, e.g. for module-level constant data.
    ///
    /// Registration-time memory stays with the module; returning it from a
    /// native function does not hand it to the VM.
    pub fn alloc_str(&self, s: &str) -> NativeResult<AbiValue> {
        alloc_str_raw(self.ctx, s)
    }

    /// Copy `items` into VM memory
    pub fn alloc_array(&self, items: &[AbiValue]) -> NativeResult<AbiValue> {
        alloc_array_raw(self.ctx, items)
    }

    /// Raw context pointer
    pub fn as_ptr(&self) -> *mut VmContext {
        self.ctx
    }
}

/// Call-time wrapper: the context plus the borrowed argument array.
pub struct NativeCall<'a> {
    ctx: *mut VmContext,
    args: &'a [AbiValue],
}

impl<'a> NativeCall<'a> {
    /// Wrap the raw parameters of a native function.
    ///
    /// # Safety
    /// `args` must point at `argc` values valid for `'a` (it may be null when
    /// `argc == 0`), and `ctx` must be the context of the running call.
    pub unsafe fn from_raw(ctx: *mut VmContext, args: *const AbiValue, argc: usize) -> Self {
        let args: &'a [AbiValue] = if args.is_null() || argc == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(args, argc)
        };
        Self { ctx, args }
    }

    /// All arguments
    pub fn args(&self) -> &'a [AbiValue] {
        self.args
    }

    /// Argument count
    pub fn argc(&self) -> usize {
        self.args.len()
    }

    /// Convert argument `index`
    pub fn arg<T: FromAbi<'a>>(&self, index: usize) -> NativeResult<T> {
        let value = self
            .args
            .get(index)
            .ok_or(NativeError::MissingArgument(index))?;
        T::from_abi(value)
    }

    /// Fail unless exactly `expected` arguments were supplied
    pub fn expect_argc(&self, expected: usize) -> NativeResult<()> {
        if self.args.len() == expected {
            Ok(())
        } else {
            Err(NativeError::ArgumentCount {
                expected,
                got: self.args.len(),
            })
        }
    }

    /// Signal failure of this call; the value returned afterwards is ignored
    pub fn throw(&self, code: ErrorCode, message: &str) {
        raise_raw(self.ctx, code, message);
    }

    /// Signal `err` with its mapped error code
    pub fn raise(&self, err: &NativeError) {
        raise_raw(self.ctx, err.code(), &err.to_string());
    }

    /// Allocate `size` bytes of VM-owned memory
    pub fn alloc(&self, size: usize) -> NativeResult<*mut c_void> {
        alloc_raw(self.ctx, size)
    }

    /// Copy `s` into VM memory and return it as a `Str` value.
    ///
    /// Ownership passes to the VM once the value is returned from this call.
    pub fn alloc_str(&self, s: &str) -> NativeResult<AbiValue> {
        alloc_str_raw(self.ctx, s)
    }

    /// Copy `items` into VM memory and return them as an `Array` value.
    ///
    /// Ownership passes to the VM once the value is returned from the call.
    pub fn alloc_array(&self, items: &[AbiValue]) -> NativeResult<AbiValue> {
        alloc_array_raw(self.ctx, items)
    }

    /// Raw context pointer
    pub fn as_ptr(&self) -> *mut VmContext {
        self.ctx
    }
}

fn alloc_raw(ctx: *mut VmContext, size: usize) -> NativeResult<*mut c_void> {
    if ctx.is_null() {
        return Err(NativeError::ModuleError("null VM context".to_string()));
    }
    let table = unsafe { &*ctx };
    let ptr = (table.alloc)(size);
    if ptr.is_null() {
        Err(NativeError::OutOfMemory(size))
    } else {
        Ok(ptr)
    }
}

fn alloc_str_raw(ctx: *mut VmContext, s: &str) -> NativeResult<AbiValue> {
    if s.as_bytes().contains(&0) {
        return Err(NativeError::Runtime(
            "string contains an interior NUL byte".to_string(),
        ));
    }
    let len = s.len();
    let ptr = alloc_raw(ctx, len + 1)? as *mut u8;
    unsafe {
        std::ptr::copy_nonoverlapping(s.as_ptr(), ptr, len);
        *ptr.add(len) = 0;
    }
    Ok(AbiValue::str_ptr(ptr as *const _))
}

fn alloc_array_raw(ctx: *mut VmContext, items: &[AbiValue]) -> NativeResult<AbiValue> {
    if items.is_empty() {
        return Ok(AbiValue::array(std::ptr::null_mut(), 0));
    }
    let ptr = alloc_raw(ctx, std::mem::size_of_val(items))? as *mut AbiValue;
    unsafe {
        std::ptr::copy_nonoverlapping(items.as_ptr(), ptr, items.len());
    }
    Ok(AbiValue::array(ptr, items.len()))
}

fn raise_raw(ctx: *mut VmContext, code: ErrorCode, message: &str) {
    if ctx.is_null() {
        return;
    }
    let msg = CString::new(message.replace('\0', "\\0")).unwrap_or_default();
    let table = unsafe { &*ctx };
    (table.throw_error)(code.raw(), msg.as_ptr());
}
