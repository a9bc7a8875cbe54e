//! In-process modules used by the integration tests.
//!
//! Each descriptor is a plain static, loaded with `NativeVm::load_descriptor`.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::ffi::c_char;
use std::sync::atomic::{AtomicUsize, Ordering};

use datacode_sdk::{
    native_fn, AbiValue, AbiVersion, ErrorCode, ModuleContext, ModuleDescriptor, NativeCall,
    NativeError, NativeResult, VmContext, DATACODE_ABI_VERSION,
};

thread_local! {
    static LAST_ALLOC: Cell<usize> = const { Cell::new(0) };
    static ALLOCS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn record(value: &AbiValue) {
    let ptr = value
        .as_str_ptr()
        .map(|p| p as usize)
        .or_else(|| value.as_array_raw().map(|a| a.ptr as usize))
        .unwrap_or(0);
    ALLOCS.with(|a| a.borrow_mut().push(ptr));
}

/// Blocks allocated by the failure-path functions on this thread, oldest first
pub fn take_allocs() -> Vec<*const u8> {
    ALLOCS.with(|a| std::mem::take(&mut *a.borrow_mut()))
        .into_iter()
        .map(|p| p as *const u8)
        .collect()
}

/// Address of the last string allocated by `shout` on this thread
pub fn last_alloc() -> *const u8 {
    LAST_ALLOC.with(|c| c.get()) as *const u8
}

fn with_module(ctx: *mut VmContext, body: impl FnOnce(&mut ModuleContext) -> NativeResult<()>) {
    let mut module = unsafe { ModuleContext::from_raw(ctx) };
    if let Err(e) = body(&mut module) {
        module.throw(e.code(), &e.to_string());
    }
}

fn throw(ctx: *mut VmContext, code: ErrorCode, message: &std::ffi::CStr) {
    let throw_error = unsafe { (*ctx).throw_error };
    throw_error(code.raw(), message.as_ptr());
}

// ---------------------------------------------------------------------------
// math: add, sub

#[native_fn]
fn add(a: i64, b: i64) -> i64 {
    a + b
}

#[native_fn]
fn sub(a: i64, b: i64) -> i64 {
    a - b
}

extern "C" fn register_math(ctx: *mut VmContext) {
    with_module(ctx, |m| {
        m.register_fn("add", add_native)?;
        m.register_fn("sub", sub_native)
    });
}

pub static MATH: ModuleDescriptor = ModuleDescriptor::new(c"math", DATACODE_ABI_VERSION, register_math);

pub static MATH_NEWER_MINOR: ModuleDescriptor = ModuleDescriptor::new(
    c"math_next",
    AbiVersion::new(DATACODE_ABI_VERSION.major, DATACODE_ABI_VERSION.minor + 7),
    register_math,
);

// ---------------------------------------------------------------------------
// alt_math: a second provider of `add`, plus `mul`

#[native_fn]
fn alt_add(a: i64, b: i64) -> i64 {
    a + b + 100
}

#[native_fn]
fn mul(a: i64, b: i64) -> i64 {
    a * b
}

extern "C" fn register_alt_math(ctx: *mut VmContext) {
    with_module(ctx, |m| {
        m.register_fn("mul", mul_native)?;
        m.register_fn("add", alt_add_native)
    });
}

pub static ALT_MATH: ModuleDescriptor =
    ModuleDescriptor::new(c"alt_math", DATACODE_ABI_VERSION, register_alt_math);

// ---------------------------------------------------------------------------
// text: strings, arrays and failure paths

#[native_fn]
fn echo(value: AbiValue) -> AbiValue {
    value
}

#[native_fn]
fn shout(call: &NativeCall<'_>, text: &str) -> NativeResult<AbiValue> {
    let value = call.alloc_str(&text.to_uppercase())?;
    let ptr = value.as_str_ptr().unwrap_or(std::ptr::null()) as usize;
    LAST_ALLOC.with(|c| c.set(ptr));
    Ok(value)
}

#[native_fn]
fn range(n: i64) -> Vec<i64> {
    (0..n).collect()
}

#[native_fn]
fn sum(items: &[AbiValue]) -> NativeResult<i64> {
    items.iter().try_fold(0i64, |acc, item| {
        item.as_int()
            .map(|i| acc + i)
            .ok_or_else(|| NativeError::Runtime(format!("cannot sum {}", item.type_name())))
    })
}

#[native_fn]
fn fail(message: &str) -> Result<i64, String> {
    Err(message.to_string())
}

#[native_fn]
fn crash() -> i64 {
    panic!("native crash")
}

extern "C" fn throw_then_return(ctx: *mut VmContext, _args: *const AbiValue, _argc: usize) -> AbiValue {
    throw(ctx, ErrorCode::RuntimeError, c"bad input");
    AbiValue::int(42)
}

extern "C" fn throw_ok(ctx: *mut VmContext, _args: *const AbiValue, _argc: usize) -> AbiValue {
    throw(ctx, ErrorCode::Ok, c"not really ok");
    AbiValue::int(1)
}

extern "C" fn static_greeting(_ctx: *mut VmContext, _args: *const AbiValue, _argc: usize) -> AbiValue {
    AbiValue::static_str(c"static hello")
}

extern "C" fn bad_tag(_ctx: *mut VmContext, _args: *const AbiValue, _argc: usize) -> AbiValue {
    let mut value = AbiValue::int(0);
    unsafe { (&mut value as *mut AbiValue as *mut u8).write(200) };
    value
}

/// -1 when `args` is null, otherwise `argc`
extern "C" fn count_args(_ctx: *mut VmContext, args: *const AbiValue, argc: usize) -> AbiValue {
    AbiValue::int(if args.is_null() { -1 } else { argc as i64 })
}

/// Raw code outside the `ErrorCode` range
pub const UNKNOWN_CODE: u32 = 9;

extern "C" fn throw_unknown_code(ctx: *mut VmContext, _args: *const AbiValue, _argc: usize) -> AbiValue {
    let throw_error = unsafe { (*ctx).throw_error };
    throw_error(UNKNOWN_CODE, c"made-up code".as_ptr());
    AbiValue::null()
}

/// Allocates a string, throws, then returns the string anyway
extern "C" fn throw_after_alloc(ctx: *mut VmContext, args: *const AbiValue, argc: usize) -> AbiValue {
    let call = unsafe { NativeCall::from_raw(ctx, args, argc) };
    let Ok(value) = call.alloc_str("abandoned") else {
        return AbiValue::null();
    };
    record(&value);
    call.throw(ErrorCode::RuntimeError, "gave up");
    value
}

/// Returns a VM-allocated array whose second element has an unknown tag
extern "C" fn half_valid_array(ctx: *mut VmContext, args: *const AbiValue, argc: usize) -> AbiValue {
    let call = unsafe { NativeCall::from_raw(ctx, args, argc) };
    let Ok(text) = call.alloc_str("fine") else {
        return AbiValue::null();
    };
    let mut broken = AbiValue::int(0);
    unsafe { (&mut broken as *mut AbiValue as *mut u8).write(99) };
    let Ok(array) = call.alloc_array(&[text, broken]) else {
        return AbiValue::null();
    };
    record(&text);
    record(&array);
    array
}

extern "C" fn register_text(ctx: *mut VmContext) {
    with_module(ctx, |m| {
        m.register_fn("echo", echo_native)?;
        m.register_fn("shout", shout_native)?;
        m.register_fn("range", range_native)?;
        m.register_fn("sum", sum_native)?;
        m.register_fn("fail", fail_native)?;
        m.register_fn("crash", crash_native)?;
        m.register_fn("throw_then_return", throw_then_return)?;
        m.register_fn("throw_ok", throw_ok)?;
        m.register_fn("static_greeting", static_greeting)?;
        m.register_fn("bad_tag", bad_tag)?;
        m.register_fn("count_args", count_args)?;
        m.register_fn("throw_unknown_code", throw_unknown_code)?;
        m.register_fn("throw_after_alloc", throw_after_alloc)?;
        m.register_fn("half_valid_array", half_valid_array)
    });
}

pub static TEXT: ModuleDescriptor = ModuleDescriptor::new(c"text", DATACODE_ABI_VERSION, register_text);

// ---------------------------------------------------------------------------
// banner: returns a string allocated once at registration

static BANNER_TEXT: AtomicUsize = AtomicUsize::new(0);

/// Address of the string `banner` returns
pub fn banner_ptr() -> *const u8 {
    BANNER_TEXT.load(Ordering::SeqCst) as *const u8
}

extern "C" fn banner(_ctx: *mut VmContext, _args: *const AbiValue, _argc: usize) -> AbiValue {
    AbiValue::str_ptr(BANNER_TEXT.load(Ordering::SeqCst) as *const c_char)
}

extern "C" fn register_banner(ctx: *mut VmContext) {
    with_module(ctx, |m| {
        let text = m.alloc_str("module constant")?;
        let ptr = text.as_str_ptr().unwrap_or(std::ptr::null());
        BANNER_TEXT.store(ptr as usize, Ordering::SeqCst);
        m.register_fn("banner", banner)
    });
}

pub static BANNER: ModuleDescriptor =
    ModuleDescriptor::new(c"banner", DATACODE_ABI_VERSION, register_banner);

// ---------------------------------------------------------------------------
// Broken modules

extern "C" fn register_then_throw(ctx: *mut VmContext) {
    with_module(ctx, |m| {
        m.register_fn("ghost", add_native)?;
        Err(NativeError::ModuleError("missing dependency".to_string()))
    });
}

pub static THROWS_DURING_REGISTRATION: ModuleDescriptor =
    ModuleDescriptor::new(c"thrower", DATACODE_ABI_VERSION, register_then_throw);

extern "C" fn register_twice(ctx: *mut VmContext) {
    with_module(ctx, |m| {
        m.register_fn("dup", add_native)?;
        m.register_fn("dup", sub_native)
    });
}

pub static REGISTERS_TWICE: ModuleDescriptor =
    ModuleDescriptor::new(c"twice", DATACODE_ABI_VERSION, register_twice);

extern "C" fn register_null_fn(ctx: *mut VmContext) {
    let register_native = unsafe { (*ctx).register_native };
    register_native(ctx, c"hollow".as_ptr(), None);
}

pub static REGISTERS_NULL_FN: ModuleDescriptor =
    ModuleDescriptor::new(c"hollow", DATACODE_ABI_VERSION, register_null_fn);

pub static NULL_NAME: ModuleDescriptor = ModuleDescriptor {
    abi_version: DATACODE_ABI_VERSION,
    name: std::ptr::null::<c_char>(),
    register_fn: Some(register_math),
};

pub static NO_REGISTER_FN: ModuleDescriptor = ModuleDescriptor {
    abi_version: DATACODE_ABI_VERSION,
    name: c"inert".as_ptr(),
    register_fn: None,
};

pub static FUTURE_MAJOR: ModuleDescriptor = ModuleDescriptor::new(
    c"future",
    AbiVersion::new(DATACODE_ABI_VERSION.major + 1, 0),
    register_math,
);
