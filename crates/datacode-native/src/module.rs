// #[module] proc-macro implementation
//
// Generates the module descriptor and the `datacode_module` entry point.

use proc_macro2::{Literal, TokenStream};
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{ItemFn, LitInt, LitStr, Result};

/// Arguments of `#[module(name = "...", abi_major = N, abi_minor = N)]`
#[derive(Default)]
pub struct ModuleArgs {
    name: Option<LitStr>,
    abi_major: Option<LitInt>,
    abi_minor: Option<LitInt>,
}

impl ModuleArgs {
    pub fn parse(&mut self, meta: ParseNestedMeta<'_>) -> Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("abi_major") {
            self.abi_major = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("abi_minor") {
            self.abi_minor = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported module property; expected `name`, `abi_major` or `abi_minor`"))
        }
    }
}

/// Expands the #[module] attribute macro.
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[module(name = "math")]
/// fn register(ctx: &mut ModuleContext) -> NativeResult<()> {
///     ctx.register_fn("add", add_native)
/// }
///
/// // Output:
/// fn register(ctx: &mut ModuleContext) -> NativeResult<()> { ... }
///
/// extern "C" fn __datacode_register(ctx: *mut ::datacode_sdk::VmContext) {
///     ::datacode_sdk::__private::run_register(ctx, "math", |module| register(module))
/// }
///
/// static __DATACODE_MODULE: ::datacode_sdk::ModuleDescriptor = ...;
///
/// #[no_mangle]
/// pub extern "C" fn datacode_module() -> *const ::datacode_sdk::ModuleDescriptor {
///     &__DATACODE_MODULE
/// }
/// ```
pub fn expand_module(args: ModuleArgs, func: ItemFn) -> Result<TokenStream> {
    let name = match &args.name {
        Some(name) => name,
        None => {
            return Err(syn::Error::new_spanned(
                &func.sig.ident,
                "#[module] requires a name: #[module(name = \"...\")]",
            ));
        }
    };
    let name_value = name.value();
    if name_value.is_empty() || name_value.contains('\0') {
        return Err(syn::Error::new_spanned(
            name,
            "module name must be non-empty and must not contain NUL",
        ));
    }

    if func.sig.inputs.len() != 1 {
        return Err(syn::Error::new_spanned(
            &func.sig.inputs,
            "Module register function must take exactly one `&mut ModuleContext` parameter",
        ));
    }

    let func_name = &func.sig.ident;
    let invoke = match &func.sig.output {
        syn::ReturnType::Default => quote! {
            #func_name(module);
            ::core::result::Result::Ok(())
        },
        syn::ReturnType::Type(..) => quote! {
            ::core::result::Result::map_err(
                #func_name(module),
                ::core::convert::Into::<::datacode_sdk::NativeError>::into,
            )
        },
    };

    let version = match (&args.abi_major, &args.abi_minor) {
        (None, None) => quote! { ::datacode_sdk::DATACODE_ABI_VERSION },
        (major, minor) => {
            let major = major
                .as_ref()
                .map(|m| quote! { #m })
                .unwrap_or_else(|| quote! { ::datacode_sdk::DATACODE_ABI_VERSION.major });
            let minor = minor
                .as_ref()
                .map(|m| quote! { #m })
                .unwrap_or_else(|| quote! { ::datacode_sdk::DATACODE_ABI_VERSION.minor });
            quote! { ::datacode_sdk::AbiVersion::new(#major, #minor) }
        }
    };

    let mut name_bytes = name_value.into_bytes();
    name_bytes.push(0);
    let name_lit = Literal::byte_string(&name_bytes);

    let expanded = quote! {
        #func

        extern "C" fn __datacode_register(ctx: *mut ::datacode_sdk::VmContext) {
            ::datacode_sdk::__private::run_register(ctx, #name, |module| {
                #invoke
            })
        }

        static __DATACODE_MODULE: ::datacode_sdk::ModuleDescriptor = ::datacode_sdk::ModuleDescriptor {
            abi_version: #version,
            name: #name_lit.as_ptr() as *const ::std::ffi::c_char,
            register_fn: ::core::option::Option::Some(__datacode_register),
        };

        /// Entry point resolved by the VM when loading this module.
        #[no_mangle]
        pub extern "C" fn datacode_module() -> *const ::datacode_sdk::ModuleDescriptor {
            &__DATACODE_MODULE
        }
    };

    Ok(expanded)
}
