//! Derive macros for `logbook`.
//!
//! `#[derive(ToValue)]` lets a type be passed as a log argument:
//! - structs become object snapshots whose fields are walked in serialize
//!   mode (`{@Order}`), via a generated `LogFields` implementation
//! - field-less enums become enumeration values (name plus discriminant)
//!
//! It does **not** decide what is sensitive. Redaction is looked up by field
//! name in `logbook`'s registry when a value is rendered.

// <https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html>
#![warn(
    anonymous_parameters,
    bare_trait_objects,
    elided_lifetimes_in_paths,
    missing_copy_implementations,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces
)]
// <https://rust-lang.github.io/rust-clippy/stable>
#![warn(
    clippy::all,
    clippy::cargo,
    clippy::dbg_macro,
    clippy::float_cmp_const,
    clippy::get_unwrap,
    clippy::mem_forget,
    clippy::nursery,
    clippy::pedantic,
    clippy::todo,
    clippy::unwrap_used,
    clippy::uninlined_format_args
)]
// Allow some clippy lints
#![allow(
    clippy::default_trait_access,
    clippy::doc_markdown,
    clippy::if_not_else,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::use_self,
    clippy::cargo_common_metadata,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::option_if_let_else
)]
// Allow some lints while testing
#![cfg_attr(test, allow(clippy::non_ascii_literal, clippy::unwrap_used))]

#[allow(unused_extern_crates)]
extern crate proc_macro;

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::{format_ident, quote};
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, LitStr, Result};

mod container;
mod derive_enum;
mod derive_struct;
mod generics;
mod strategy;
use container::{parse_container_options, ContainerOptions};
use derive_enum::derive_enum;
use derive_struct::{derive_struct, StructDeriveOutput};
use generics::add_to_value_bounds;

/// Derives `logbook::ToValue` for structs and field-less enums.
///
/// # Container Attributes
///
/// - `#[log(display)]` - Outside serialize mode, render the value with its
///   `Display` impl instead of its type name. The type must implement
///   `Display`.
/// - `#[log(rename = "Name")]` - Type name reported to the formatter.
///
/// # Field Attributes
///
/// - **No annotation**: the field is listed under its own name and must
///   implement `ToValue`.
/// - `#[log(skip)]`: the field is not listed and needs no `ToValue` impl.
/// - `#[log(rename = "Name")]`: the field is listed as `Name`. Registry
///   lookups use this name.
///
/// On enum variants only `rename` is accepted. Enums with data-carrying
/// variants and unions are rejected at compile time.
#[proc_macro_derive(ToValue, attributes(log))]
pub fn derive_to_value(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

/// Returns the token stream to reference the logbook crate root.
///
/// Handles crate renaming (e.g., `logs = { package = "logbook", ... }`).
/// Inside `logbook` itself the crate refers to itself as `logbook` through
/// `extern crate self as logbook`, so `::logbook` works there too.
fn crate_root() -> TokenStream {
    match crate_name("logbook") {
        Ok(FoundCrate::Name(name)) => {
            let ident = format_ident!("{}", name);
            quote! { ::#ident }
        }
        Ok(FoundCrate::Itself) | Err(_) => quote! { ::logbook },
    }
}

fn crate_path(item: &str) -> TokenStream {
    let root = crate_root();
    let item_ident = format_ident!("{}", item);
    quote! { #root::#item_ident }
}

fn expand(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput {
        ident,
        generics,
        data,
        attrs,
        ..
    } = input;

    let ContainerOptions { display, rename } = parse_container_options(&attrs)?;
    let type_name = rename.unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let crate_root = crate_root();

    match &data {
        Data::Struct(data) => {
            let StructDeriveOutput {
                fields_body,
                used_generics,
            } = derive_struct(data, &generics)?;
            let mut bounded = add_to_value_bounds(generics.clone(), &used_generics);
            let (_, ty_generics, _) = generics.split_for_impl();
            let display_fn = if display {
                bounded
                    .make_where_clause()
                    .predicates
                    .push(parse_quote!(#ident #ty_generics: ::core::fmt::Display));
                quote! {
                    fn display_text(&self) -> ::core::option::Option<::std::string::String> {
                        ::core::option::Option::Some(::std::string::ToString::to_string(self))
                    }
                }
            } else {
                quote! {}
            };
            let (impl_generics, ty_generics, where_clause) = bounded.split_for_impl();

            Ok(quote! {
                impl #impl_generics #crate_root::LogFields for #ident #ty_generics #where_clause {
                    fn type_name(&self) -> &'static str {
                        #type_name
                    }

                    #display_fn

                    fn log_fields(&self) -> ::std::vec::Vec<(&'static str, #crate_root::Value)> {
                        #fields_body
                    }
                }

                impl #impl_generics #crate_root::ToValue for #ident #ty_generics #where_clause {
                    fn to_value(&self) -> #crate_root::Value {
                        #crate_root::Value::Object(#crate_root::ObjectValue::capture(self))
                    }
                }
            })
        }
        Data::Enum(data) => {
            if display {
                return Err(syn::Error::new(
                    ident.span(),
                    "`display` is not supported on enums; variants render by name or discriminant",
                ));
            }
            let arms = derive_enum(&ident, data)?;
            let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
            Ok(quote! {
                impl #impl_generics #crate_root::ToValue for #ident #ty_generics #where_clause {
                    fn to_value(&self) -> #crate_root::Value {
                        let (name, value) = #arms;
                        #crate_root::Value::Enum(#crate_root::EnumValue {
                            type_name: #type_name,
                            name,
                            value,
                        })
                    }
                }
            })
        }
        Data::Union(u) => Err(syn::Error::new(
            u.union_token.span,
            "`ToValue` cannot be derived for unions",
        )),
    }
}
