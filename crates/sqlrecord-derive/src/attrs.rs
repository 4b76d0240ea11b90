//! `#[record(...)]` attribute parsing shared by both derives.

use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, ExprLit, Lit, Meta, Result, Token};

/// Every `key` or `key = "value"` entry of the `#[record(...)]` attributes.
fn record_metas(attrs: &[Attribute]) -> Result<Vec<Meta>> {
    let mut metas = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        let nested = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
        metas.extend(nested);
    }
    Ok(metas)
}

fn string_value(meta: &Meta) -> Result<String> {
    if let Meta::NameValue(nv) = meta {
        if let Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) = &nv.value
        {
            return Ok(s.value());
        }
    }
    Err(syn::Error::new_spanned(meta, "expected `key = \"value\"`"))
}

fn unknown(meta: &Meta) -> syn::Error {
    syn::Error::new_spanned(meta, "unknown record attribute")
}

#[derive(Default)]
pub struct StructAttrs {
    pub table: Option<String>,
    pub schema: Option<String>,
    pub identity: Option<String>,
}

pub fn struct_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut out = StructAttrs::default();
    for meta in record_metas(attrs)? {
        let path = meta.path();
        if path.is_ident("table") {
            out.table = Some(string_value(&meta)?);
        } else if path.is_ident("schema") {
            out.schema = Some(string_value(&meta)?);
        } else if path.is_ident("identity") {
            out.identity = Some(string_value(&meta)?);
        } else {
            return Err(unknown(&meta));
        }
    }
    Ok(out)
}

#[derive(Default)]
pub struct FieldAttrs {
    pub column: Option<String>,
    pub skip: bool,
    pub not_null: bool,
    pub identity: bool,
}

pub fn field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for meta in record_metas(attrs)? {
        match &meta {
            Meta::Path(p) if p.is_ident("skip") => out.skip = true,
            Meta::Path(p) if p.is_ident("not_null") => out.not_null = true,
            Meta::Path(p) if p.is_ident("identity") => out.identity = true,
            Meta::NameValue(nv) if nv.path.is_ident("column") => {
                out.column = Some(string_value(&meta)?);
            }
            _ => return Err(unknown(&meta)),
        }
    }
    Ok(out)
}

/// `#[record(rename = "...")]` on an enum variant.
pub fn variant_rename(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut rename = None;
    for meta in record_metas(attrs)? {
        if meta.path().is_ident("rename") {
            rename = Some(string_value(&meta)?);
        } else {
            return Err(unknown(&meta));
        }
    }
    Ok(rename)
}
