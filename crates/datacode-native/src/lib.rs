// datacode-native: proc-macros for writing DataCode native modules
//
// - #[native_fn] - generates an extern "C" trampoline for a Rust function
// - #[module]    - exports the `datacode_module` entry point and descriptor
//
// Expansions refer to `::datacode_sdk`, so use these through the SDK's
// re-exports.

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemFn};

mod convert;
mod function;
mod module;

/// Marks a Rust function as callable from the VM.
///
/// Generates a wrapper `<name>_native` with the `NativeFn` signature that:
/// - Rejects calls whose `argc` differs from the parameter count (`TypeError`)
/// - Converts arguments with `FromAbi` (`TypeError` on mismatch)
/// - Catches panics and reports them as `Panic`
/// - Reports `Err` returns with the error's code
/// - Converts the result with `ToAbi`
///
/// A leading `&NativeCall` parameter receives the call context and does not
/// count towards the arity.
///
/// # Example
///
/// ```ignore
/// #[native_fn]
/// fn greet(call: &NativeCall, name: &str) -> NativeResult<AbiValue> {
///     call.alloc_str(&format!("Hello, {}!", name))
/// }
/// ```
#[proc_macro_attribute]
pub fn native_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    function::expand_native_fn(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Defines a native module's registration function.
///
/// Must be applied to a function taking `&mut ModuleContext` and returning
/// `()` or a `Result` whose error converts into `NativeError`.
///
/// Generates:
/// - A static `ModuleDescriptor` named after `name`
/// - The exported `datacode_module()` entry point returning it
/// - An `extern "C"` registration callback that reports errors and panics
///   through `throw_error`
///
/// Optional `abi_major` / `abi_minor` override the SDK's ABI version.
///
/// # Example
///
/// ```ignore
/// #[module(name = "math")]
/// fn register(ctx: &mut ModuleContext) -> NativeResult<()> {
///     ctx.register_fn("add", add_native)
/// }
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = module::ModuleArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);
    let input = parse_macro_input!(item as ItemFn);
    module::expand_module(args, input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
