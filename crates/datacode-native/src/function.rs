// #[native_fn] proc-macro implementation
//
// Generates the extern "C" trampoline for a native function.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{ItemFn, Result};

use crate::convert::{generate_arg_extraction, generate_return_conversion, is_path_named};

/// Expands the #[native_fn] attribute macro.
///
/// Input: Original Rust function
/// Output: Original function + `<name>_native` trampoline
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[native_fn]
/// fn add(a: i64, b: i64) -> i64 {
///     a + b
/// }
///
/// // Output:
/// fn add(a: i64, b: i64) -> i64 {
///     a + b
/// }
///
/// extern "C" fn add_native(
///     ctx: *mut ::datacode_sdk::VmContext,
///     args: *const ::datacode_sdk::AbiValue,
///     argc: usize,
/// ) -> ::datacode_sdk::AbiValue {
///     let call = unsafe { ::datacode_sdk::NativeCall::from_raw(ctx, args, argc) };
///     ::datacode_sdk::__private::run_native(&call, "add", 2, || {
///         let a: i64 = call.arg::<i64>(0)?;
///         let b: i64 = call.arg::<i64>(1)?;
///         let result = add(a, b);
///         ::datacode_sdk::ToAbi::to_abi(result, &call)
///     })
/// }
/// ```
pub fn expand_native_fn(func: ItemFn) -> Result<TokenStream> {
    let func_name = &func.sig.ident;
    let native_name = format_ident!("{}_native", func_name);
    let vis = &func.vis;

    if let Some(asyncness) = &func.sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "#[native_fn] cannot be applied to async functions",
        ));
    }
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "#[native_fn] functions cannot be generic",
        ));
    }

    // Extract argument names and types
    let mut call_args = Vec::new();
    let mut extractions = Vec::new();
    let mut arity = 0usize;

    for (i, arg) in func.sig.inputs.iter().enumerate() {
        let pat_type = match arg {
            syn::FnArg::Typed(pat_type) => pat_type,
            syn::FnArg::Receiver(_) => {
                return Err(syn::Error::new_spanned(
                    arg,
                    "Methods (self) are not supported in #[native_fn]",
                ));
            }
        };
        let ident = match &*pat_type.pat {
            syn::Pat::Ident(pat_ident) => pat_ident.ident.clone(),
            _ => {
                return Err(syn::Error::new_spanned(
                    arg,
                    "Only simple identifiers are supported as arguments",
                ));
            }
        };

        if i == 0 && is_path_named(&pat_type.ty, "NativeCall") {
            call_args.push(quote! { &__dc_call });
            continue;
        }

        extractions.push(generate_arg_extraction(&ident, &pat_type.ty, arity));
        call_args.push(quote! { #ident });
        arity += 1;
    }

    let name_str = func_name.to_string();
    let return_conversion = generate_return_conversion(&func.sig.output);

    let expanded = quote! {
        // Keep original function
        #func

        #[allow(non_snake_case)]
        #vis extern "C" fn #native_name(
            ctx: *mut ::datacode_sdk::VmContext,
            args: *const ::datacode_sdk::AbiValue,
            argc: usize,
        ) -> ::datacode_sdk::AbiValue {
            let __dc_call = unsafe { ::datacode_sdk::NativeCall::from_raw(ctx, args, argc) };
            ::datacode_sdk::__private::run_native(&__dc_call, #name_str, #arity, || {
                #(#extractions)*
                let result = #func_name(#(#call_args),*);
                #return_conversion
            })
        }
    };

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_trampoline() {
        let func: ItemFn = syn::parse_quote! {
            fn add(a: i64, b: i64) -> i64 { a + b }
        };
        let out = expand_native_fn(func).unwrap().to_string();
        assert!(out.contains("add_native"));
        assert!(out.contains("run_native"));
        assert!(out.contains("2usize"));
    }

    #[test]
    fn test_native_call_param_not_counted() {
        let func: ItemFn = syn::parse_quote! {
            fn greet(call: &NativeCall<'_>, name: &str) -> NativeResult<AbiValue> {
                call.alloc_str(name)
            }
        };
        let out = expand_native_fn(func).unwrap().to_string();
        assert!(out.contains("1usize"));
        assert!(out.contains("& __dc_call"));
    }

    #[test]
    fn test_rejects_self() {
        let func: ItemFn = syn::parse_quote! {
            fn method(&self) -> i64 { 0 }
        };
        assert!(expand_native_fn(func).is_err());
    }

    #[test]
    fn test_rejects_async() {
        let func: ItemFn = syn::parse_quote! {
            async fn slow() -> i64 { 0 }
        };
        assert!(expand_native_fn(func).is_err());
    }
}
