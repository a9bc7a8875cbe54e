// Conversion code generation shared by the macros
//
// Arguments go through FromAbi, results through ToAbi. Return types are
// classified syntactically because the macro has no type information.

use proc_macro2::TokenStream;
use quote::quote;

/// Whether the type's last path segment is `name`
pub fn is_path_named(ty: &syn::Type, name: &str) -> bool {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|s| s.ident == name)
            .unwrap_or(false),
        syn::Type::Reference(reference) => is_path_named(&reference.elem, name),
        _ => false,
    }
}

/// Whether the type is `Result<..>` or the SDK's `NativeResult<..>` alias
pub fn is_result(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Path(_) => is_path_named(ty, "Result") || is_path_named(ty, "NativeResult"),
        _ => false,
    }
}

/// Generates code to extract typed argument `index` from the call.
pub fn generate_arg_extraction(
    arg_name: &syn::Ident,
    arg_type: &syn::Type,
    index: usize,
) -> TokenStream {
    quote! {
        let #arg_name: #arg_type = __dc_call.arg::<#arg_type>(#index)?;
    }
}

/// Generates the conversion of `result` into `NativeResult<AbiValue>`.
pub fn generate_return_conversion(output: &syn::ReturnType) -> TokenStream {
    match output {
        syn::ReturnType::Type(_, ty) if is_result(ty) => quote! {
            match result {
                ::core::result::Result::Ok(value) => ::datacode_sdk::ToAbi::to_abi(value, &__dc_call),
                ::core::result::Result::Err(e) => ::core::result::Result::Err(
                    ::core::convert::Into::<::datacode_sdk::NativeError>::into(e),
                ),
            }
        },
        _ => quote! {
            ::datacode_sdk::ToAbi::to_abi(result, &__dc_call)
        },
    }
}
