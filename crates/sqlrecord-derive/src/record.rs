//! Record derive macro implementation

use crate::attrs::{field_attrs, struct_attrs};
use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let attrs = struct_attrs(&input.attrs)?;
    let type_name = name.to_string();
    let table = attrs
        .table
        .unwrap_or_else(|| type_name.to_snake_case());
    let mut identity = attrs.identity;

    let mut descriptors = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();

    for field in fields {
        let field_attrs = field_attrs(&field.attrs)?;
        if field_attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let field_name = ident.to_string();
        let column = field_attrs.column.unwrap_or_else(|| field_name.clone());
        let not_null = field_attrs.not_null;

        if field_attrs.identity {
            if let Some(existing) = &identity {
                return Err(syn::Error::new_spanned(
                    ident,
                    format!("identity is already declared as `{existing}`"),
                ));
            }
            identity = Some(field_name.clone());
        }

        let index = descriptors.len();
        descriptors.push(quote! {
            ::sqlrecord::mapping::FieldDescriptor {
                name: #field_name,
                column: #column,
                field_type: <#ty as ::sqlrecord::mapping::FieldValue>::FIELD_TYPE,
                not_null: #not_null,
            }
        });
        getters.push(quote! {
            #index => ::sqlrecord::mapping::FieldValue::to_value(&self.#ident),
        });
        setters.push(quote! {
            #index => ::sqlrecord::mapping::FieldValue::assign_value(&mut self.#ident, value),
        });
    }

    let identity = match identity {
        Some(field) => quote! { ::std::option::Option::Some(#field) },
        None => quote! { ::std::option::Option::None },
    };
    let schema = match attrs.schema {
        Some(schema) => quote! { ::std::option::Option::Some(#schema) },
        None => quote! { ::std::option::Option::None },
    };

    Ok(quote! {
        impl ::sqlrecord::mapping::Record for #name {
            fn descriptor() -> &'static ::sqlrecord::mapping::RecordDescriptor {
                static DESCRIPTOR: ::sqlrecord::mapping::RecordDescriptor =
                    ::sqlrecord::mapping::RecordDescriptor {
                        type_name: #type_name,
                        table: #table,
                        schema: #schema,
                        identity: #identity,
                        fields: &[#(#descriptors),*],
                    };
                &DESCRIPTOR
            }

            fn field_value(&self, index: usize) -> ::sqlrecord::value::Value {
                match index {
                    #(#getters)*
                    _ => ::sqlrecord::value::Value::Null,
                }
            }

            #[allow(unused_variables)]
            fn set_field_value(
                &mut self,
                index: usize,
                value: ::sqlrecord::value::Value,
            ) -> ::std::result::Result<(), ::sqlrecord::value::ConversionError> {
                match index {
                    #(#setters)*
                    _ => ::std::result::Result::Err(
                        ::sqlrecord::value::ConversionError::unknown_field(index),
                    ),
                }
            }
        }
    })
}
