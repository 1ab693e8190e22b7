//! Struct-specific `LogFields` derivation.
//!
//! This module lists the fields a struct exposes in serialize mode and
//! collects the generic parameters that need a `ToValue` bound.

use proc_macro2::{Ident, TokenStream};
use quote::{quote, quote_spanned};
use syn::{ext::IdentExt, spanned::Spanned, DataStruct, Fields, Index, LitStr, Result};

use crate::{crate_path, generics::collect_generics_from_type, strategy::parse_field_options};

pub(crate) struct StructDeriveOutput {
    pub(crate) fields_body: TokenStream,
    pub(crate) used_generics: Vec<Ident>,
}

pub(crate) fn derive_struct(data: &DataStruct, generics: &syn::Generics) -> Result<StructDeriveOutput> {
    let to_value = crate_path("ToValue");
    let mut entries = Vec::new();
    let mut used_generics = Vec::new();

    match &data.fields {
        Fields::Named(fields) => {
            for field in &fields.named {
                let options = parse_field_options(&field.attrs)?;
                if options.skip {
                    continue;
                }
                let Some(ident) = &field.ident else {
                    continue;
                };
                let label = options
                    .rename
                    .unwrap_or_else(|| LitStr::new(&ident.unraw().to_string(), ident.span()));
                collect_generics_from_type(&field.ty, generics, &mut used_generics);
                entries.push(quote_spanned! { field.span() =>
                    (#label, #to_value::to_value(&self.#ident))
                });
            }
        }
        Fields::Unnamed(fields) => {
            for (position, field) in fields.unnamed.iter().enumerate() {
                let options = parse_field_options(&field.attrs)?;
                if options.skip {
                    continue;
                }
                let index = Index::from(position);
                let label = options
                    .rename
                    .unwrap_or_else(|| LitStr::new(&position.to_string(), field.span()));
                collect_generics_from_type(&field.ty, generics, &mut used_generics);
                entries.push(quote_spanned! { field.span() =>
                    (#label, #to_value::to_value(&self.#index))
                });
            }
        }
        Fields::Unit => {}
    }

    let fields_body = quote! {
        ::std::vec![#(#entries),*]
    };
    Ok(StructDeriveOutput {
        fields_body,
        used_generics,
    })
}
