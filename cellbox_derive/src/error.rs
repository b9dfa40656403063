//! Derive macro for error enums.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations.
//! Replacement for `thiserror` crate.
//!
//! # Usage
//!
//! ```ignore
//! use cellbox_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum DiskError {
//!     #[error("Disk {0} not found")]
//!     NotFound(String),
//!
//!     #[error("invalid RAM address {addr} (valid range 1..={size})")]
//!     InvalidAddress { addr: u32, size: u32 },
//!
//!     #[error("Block 1 is read-only")]
//!     ReadOnly,
//! }
//! ```
//!
//! # Supported Features
//!
//! - Unit variants: `#[error("message")]`
//! - Tuple variants with positional args: `#[error("error: {0}")]`
//! - Struct variants with named args: `#[error("expected {expected}")]`

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta};

/// Derives `Display` and `Error` for an enum.
///
/// Each variant must have an `#[error("...")]` attribute specifying
/// the display message. Supports field interpolation using `{0}`, `{1}`
/// for tuple fields or `{field_name}` for struct fields.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive only supports enums",
            ));
        }
    };

    let display_arms = data
        .variants
        .iter()
        .map(display_arm)
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#display_arms)*
                }
            }
        }

        impl ::std::error::Error for #name {}
    })
}

/// Builds one `Display` match arm for a variant.
fn display_arm(variant: &syn::Variant) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &variant.ident;
    let message = variant_message(variant)?;

    let arm = match &variant.fields {
        Fields::Unit => {
            quote! {
                Self::#ident => write!(f, #message),
            }
        }
        Fields::Unnamed(fields) => {
            let bindings: Vec<_> = (0..fields.unnamed.len())
                .map(|i| quote::format_ident!("f{}", i))
                .collect();
            let format = rename_positional_args(&message, fields.unnamed.len());
            quote! {
                Self::#ident(#(#bindings),*) => write!(f, #format, #(#bindings = #bindings),*),
            }
        }
        Fields::Named(fields) => {
            let bindings: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
            quote! {
                Self::#ident { #(#bindings),* } => write!(f, #message, #(#bindings = #bindings),*),
            }
        }
    };

    Ok(arm)
}

/// Extracts the message from a variant's `#[error("...")]` attribute.
fn variant_message(variant: &syn::Variant) -> syn::Result<String> {
    for attr in &variant.attrs {
        if !attr.path().is_ident("error") {
            continue;
        }

        if let Meta::List(meta_list) = &attr.meta {
            let lit = syn::parse2::<Lit>(meta_list.tokens.clone()).map_err(|_| {
                syn::Error::new_spanned(
                    &attr.meta,
                    "failed to parse #[error] attribute; expected a string literal like #[error(\"division by zero\")]",
                )
            })?;

            if let Lit::Str(lit_str) = lit {
                return Ok(lit_str.value());
            }

            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute: message must be a string literal",
            ));
        }

        return Err(syn::Error::new_spanned(
            &attr.meta,
            "invalid #[error] attribute; use #[error(\"message\")] to describe the error",
        ));
    }

    Err(syn::Error::new_spanned(
        variant,
        format!(
            "missing #[error(\"...\")] attribute on variant `{}`; every error variant must declare a display message",
            variant.ident
        ),
    ))
}

/// Converts positional format args `{0}`, `{1}` to named args `{f0}`, `{f1}`
/// so tuple fields can be referenced from the generated match arm.
fn rename_positional_args(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        let positional = format!("{{{}}}", i);
        let named = format!("{{f{}}}", i);
        result = result.replace(&positional, &named);
    }
    result
}
