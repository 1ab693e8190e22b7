//! Parsing of `#[log(...)]` field and variant attributes.

use syn::{spanned::Spanned, Attribute, LitStr, Meta, Result};

/// How a field or variant is exposed to the formatter.
///
/// | Attribute | Effect |
/// |-----------|--------|
/// | None | listed under its own name |
/// | `#[log(skip)]` | not listed |
/// | `#[log(rename = "Name")]` | listed as `Name` |
#[derive(Clone, Debug, Default)]
pub(crate) struct FieldOptions {
    pub(crate) skip: bool,
    pub(crate) rename: Option<LitStr>,
}

pub(crate) fn parse_field_options(attrs: &[Attribute]) -> Result<FieldOptions> {
    let mut options = FieldOptions::default();
    let mut seen = false;
    for attr in attrs {
        if !attr.path().is_ident("log") {
            continue;
        }
        if seen {
            return Err(syn::Error::new(
                attr.span(),
                "multiple #[log] attributes specified on the same field",
            ));
        }
        seen = true;

        match &attr.meta {
            Meta::List(list) => {
                list.parse_nested_meta(|meta| {
                    if meta.path.is_ident("skip") {
                        options.skip = true;
                        Ok(())
                    } else if meta.path.is_ident("rename") {
                        options.rename = Some(meta.value()?.parse()?);
                        Ok(())
                    } else {
                        Err(meta.error("expected `skip` or `rename = \"...\"`"))
                    }
                })?;
            }
            Meta::Path(_) => {
                return Err(syn::Error::new(
                    attr.span(),
                    "expected `skip` or `rename = \"...\"` (e.g., #[log(skip)])",
                ));
            }
            Meta::NameValue(_) => {
                return Err(syn::Error::new(
                    attr.span(),
                    "name-value syntax is not supported for #[log]",
                ));
            }
        }
    }

    if options.skip && options.rename.is_some() {
        return Err(syn::Error::new(
            attrs.first().map_or_else(proc_macro2::Span::call_site, Spanned::span),
            "`skip` and `rename` cannot be combined",
        ));
    }
    Ok(options)
}
