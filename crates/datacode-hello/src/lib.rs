//! Example native module.
//!
//! Build with `cargo build -p datacode-hello` and load the resulting
//! `libdatacode_hello` library with `datacode inspect`.

use datacode_sdk::{module, native_fn, AbiValue, ModuleContext, NativeCall, NativeResult};

/// Prints a greeting and returns null
#[native_fn]
pub fn hello() {
    println!("Hello from DataCode SDK!");
}

/// Greets `name`; the string is allocated in VM memory
#[native_fn]
pub fn greet(call: &NativeCall<'_>, name: &str) -> NativeResult<AbiValue> {
    call.alloc_str(&format!("Hello, {}!", name))
}

#[native_fn]
pub fn add(a: i64, b: i64) -> i64 {
    a.wrapping_add(b)
}

/// Fails with `RuntimeError` on division by zero
#[native_fn]
pub fn divide(a: f64, b: f64) -> Result<f64, String> {
    if b == 0.0 {
        Err("division by zero".to_string())
    } else {
        Ok(a / b)
    }
}

#[module(name = "hello_module")]
fn register(ctx: &mut ModuleContext) -> NativeResult<()> {
    ctx.register_fn("hello", hello_native)?;
    ctx.register_fn("greet", greet_native)?;
    ctx.register_fn("add", add_native)?;
    ctx.register_fn("divide", divide_native)?;
    Ok(())
}
