//! Enum-specific `ToValue` derivation.
//!
//! Only field-less enums are supported: each variant becomes an enumeration
//! value carrying its name and discriminant.

use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::{spanned::Spanned, DataEnum, Fields, LitStr, Result};

use crate::strategy::parse_field_options;

pub(crate) fn derive_enum(name: &Ident, data: &DataEnum) -> Result<TokenStream> {
    if data.variants.is_empty() {
        return Err(syn::Error::new(
            name.span(),
            "`ToValue` cannot be derived for enums without variants",
        ));
    }

    let mut arms = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.fields.span(),
                "`ToValue` can only be derived for enums whose variants have no fields",
            ));
        }
        let options = parse_field_options(&variant.attrs)?;
        if options.skip {
            return Err(syn::Error::new(
                variant.span(),
                "enum variants cannot be skipped",
            ));
        }
        let ident = &variant.ident;
        let label = options
            .rename
            .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
        arms.push(quote! {
            Self::#ident => (#label, Self::#ident as i64)
        });
    }

    Ok(quote! {
        match self {
            #(#arms,)*
        }
    })
}
