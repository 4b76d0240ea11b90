//! `#[derive(RecordEnum)]`: stores a fieldless enum by variant name.

use crate::attrs::variant_rename;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let type_name = name.to_string();

    let variants = match &input.data {
        Data::Enum(e) => &e.variants,
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "RecordEnum can only be derived for enums",
            ));
        }
    };

    let mut to_name_arms = Vec::new();
    let mut from_name_arms = Vec::new();

    for variant in variants {
        if !matches!(&variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "RecordEnum variants must be unit variants (no fields)",
            ));
        }
        let variant_ident = &variant.ident;
        let stored = variant_rename(&variant.attrs)?.unwrap_or_else(|| variant_ident.to_string());

        to_name_arms.push(quote! {
            #name::#variant_ident => #stored,
        });
        from_name_arms.push(quote! {
            #stored => ::std::result::Result::Ok(#name::#variant_ident),
        });
    }

    Ok(quote! {
        impl ::sqlrecord::mapping::FieldValue for #name {
            const FIELD_TYPE: ::sqlrecord::mapping::FieldType =
                ::sqlrecord::mapping::FieldType::Enum;

            fn to_value(&self) -> ::sqlrecord::value::Value {
                let stored: &str = match self {
                    #(#to_name_arms)*
                };
                ::sqlrecord::value::Value::Enum(::std::string::String::from(stored))
            }

            fn from_value(
                value: ::sqlrecord::value::Value,
            ) -> ::std::result::Result<Self, ::sqlrecord::value::ConversionError> {
                match &value {
                    ::sqlrecord::value::Value::Enum(s) | ::sqlrecord::value::Value::Text(s) => {
                        match s.as_str() {
                            #(#from_name_arms)*
                            _ => ::std::result::Result::Err(
                                ::sqlrecord::value::ConversionError::invalid(
                                    #type_name,
                                    &value,
                                    "unknown variant",
                                ),
                            ),
                        }
                    }
                    other => ::std::result::Result::Err(
                        ::sqlrecord::value::ConversionError::unexpected(#type_name, other),
                    ),
                }
            }
        }

        impl ::std::convert::From<#name> for ::sqlrecord::value::Value {
            fn from(v: #name) -> Self {
                ::sqlrecord::mapping::FieldValue::to_value(&v)
            }
        }
    })
}
