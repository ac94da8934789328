//! vfox Macros - Derives for crossing the Lua boundary
//!
//! This crate provides `#[derive(Marshal)]` and `#[derive(Unmarshal)]` for
//! plain records. Field attributes:
//!
//! - `#[lua(rename = "url")]` sets the serialization tag of a field
//! - `#[lua(flatten)]` promotes the fields of an embedded record, either by
//!   value (`inner: CheckSumItem`) or lazily allocated (`inner: Option<CheckSumItem>`)

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments,
    Type,
};

/// How a field takes part in the record
enum FieldMode {
    Plain,
    /// Embedded record stored by value
    Flatten,
    /// Embedded record behind an `Option`, allocated on first use
    FlattenLazy(Type),
}

struct RecordField {
    ident: Ident,
    name: String,
    tag: Option<String>,
    mode: FieldMode,
    ty: Type,
}

impl RecordField {
    /// The key used when writing the field into a Lua table
    fn key(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.name)
    }

    /// The record type whose descriptor is promoted into the outer one
    fn promoted_type(&self) -> Option<&Type> {
        match &self.mode {
            FieldMode::Plain => None,
            FieldMode::Flatten => Some(&self.ty),
            FieldMode::FlattenLazy(inner) => Some(inner),
        }
    }
}

/// Derive `Marshal` for a record with named fields
#[proc_macro_derive(Marshal, attributes(lua))]
pub fn derive_marshal(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_marshal(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `Unmarshal` for a record with named fields
///
/// The record must also implement `Default`.
#[proc_macro_derive(Unmarshal, attributes(lua))]
pub fn derive_unmarshal(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_unmarshal(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_marshal(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let fields = record_fields(input)?;

    let statements = fields.iter().map(|field| {
        let ident = &field.ident;
        match &field.mode {
            FieldMode::Plain => {
                let key = field.key();
                quote! {
                    ::vfox_lua::codec::record::set_field(lua, table, #key, &self.#ident)?;
                }
            }
            FieldMode::Flatten => quote! {
                ::vfox_lua::codec::MarshalFields::marshal_fields(&self.#ident, lua, table)?;
            },
            FieldMode::FlattenLazy(_) => quote! {
                if let ::std::option::Option::Some(inner) = &self.#ident {
                    ::vfox_lua::codec::MarshalFields::marshal_fields(inner, lua, table)?;
                }
            },
        }
    });

    Ok(quote! {
        impl ::vfox_lua::codec::MarshalFields for #name {
            fn marshal_fields(
                &self,
                lua: &::vfox_lua::mlua::Lua,
                table: &::vfox_lua::mlua::Table,
            ) -> ::std::result::Result<(), ::vfox_lua::CodecError> {
                #(#statements)*
                ::std::result::Result::Ok(())
            }
        }

        impl ::vfox_lua::codec::Marshal for #name {
            fn marshal(
                &self,
                lua: &::vfox_lua::mlua::Lua,
            ) -> ::std::result::Result<::vfox_lua::mlua::Value, ::vfox_lua::CodecError> {
                ::vfox_lua::codec::record::marshal_record(self, lua)
            }
        }
    })
}

fn expand_unmarshal(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();
    let fields = record_fields(input)?;

    let descriptors = fields
        .iter()
        .filter(|field| matches!(field.mode, FieldMode::Plain))
        .map(|field| {
            let field_name = &field.name;
            let tag = match &field.tag {
                Some(tag) => quote! { ::std::option::Option::Some(#tag) },
                None => quote! { ::std::option::Option::None },
            };
            quote! {
                ::vfox_lua::codec::FieldDescriptor { name: #field_name, tag: #tag }
            }
        });

    let promoted = fields.iter().filter_map(RecordField::promoted_type).map(|ty| {
        quote! { <#ty as ::vfox_lua::codec::UnmarshalFields>::descriptor }
    });

    // Exact names first, then tags, then promoted records in declared order.
    let by_name = fields
        .iter()
        .filter(|field| matches!(field.mode, FieldMode::Plain))
        .map(|field| assign_arm(field, &field.name));

    let by_tag = fields
        .iter()
        .filter(|field| matches!(field.mode, FieldMode::Plain))
        .filter_map(|field| field.tag.as_ref().map(|tag| assign_arm(field, tag)));

    let by_promotion = fields.iter().filter_map(|field| {
        let ident = &field.ident;
        match &field.mode {
            FieldMode::Plain => None,
            FieldMode::Flatten => Some(quote! {
                if ::vfox_lua::codec::UnmarshalFields::unmarshal_field(&mut self.#ident, key, value)? {
                    return ::std::result::Result::Ok(true);
                }
            }),
            FieldMode::FlattenLazy(inner) => Some(quote! {
                if <#inner as ::vfox_lua::codec::UnmarshalFields>::descriptor().resolves(key) {
                    let inner = self.#ident.get_or_insert_with(::std::default::Default::default);
                    if ::vfox_lua::codec::UnmarshalFields::unmarshal_field(inner, key, value)? {
                        return ::std::result::Result::Ok(true);
                    }
                }
            }),
        }
    });

    Ok(quote! {
        impl ::vfox_lua::codec::UnmarshalFields for #name {
            fn descriptor() -> &'static ::vfox_lua::codec::StructDescriptor {
                static DESCRIPTOR: ::vfox_lua::codec::StructDescriptor =
                    ::vfox_lua::codec::StructDescriptor {
                        name: #name_str,
                        fields: &[#(#descriptors),*],
                        promoted: &[#(#promoted),*],
                    };
                &DESCRIPTOR
            }

            fn unmarshal_field(
                &mut self,
                key: &str,
                value: &::vfox_lua::mlua::Value,
            ) -> ::std::result::Result<bool, ::vfox_lua::CodecError> {
                #(#by_name)*
                #(#by_tag)*
                #(#by_promotion)*
                ::std::result::Result::Ok(false)
            }
        }

        impl ::vfox_lua::codec::Unmarshal for #name {
            const KIND: ::vfox_lua::codec::Kind = ::vfox_lua::codec::Kind::Struct;

            fn unmarshal(
                &mut self,
                value: &::vfox_lua::mlua::Value,
            ) -> ::std::result::Result<(), ::vfox_lua::CodecError> {
                ::vfox_lua::codec::record::unmarshal_record(self, value)
            }
        }
    })
}

fn assign_arm(field: &RecordField, key: &str) -> TokenStream2 {
    let ident = &field.ident;
    let name = &field.name;
    quote! {
        if key == #key {
            ::vfox_lua::codec::Unmarshal::unmarshal(&mut self.#ident, value)
                .map_err(|e| e.in_field(#name))?;
            return ::std::result::Result::Ok(true);
        }
    }
}

fn record_fields(input: &DeriveInput) -> syn::Result<Vec<RecordField>> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "generic records are not supported",
        ));
    }

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "only structs can cross the Lua boundary",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "only structs with named fields are supported",
        ));
    };

    let mut fields = Vec::with_capacity(named.named.len());
    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };

        let mut tag = None;
        let mut flatten = false;
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("lua")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    tag = Some(lit.value());
                    Ok(())
                } else if meta.path.is_ident("flatten") {
                    flatten = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported lua attribute"))
                }
            })?;
        }

        let mode = if !flatten {
            FieldMode::Plain
        } else if let Some(inner) = option_inner(&field.ty) {
            FieldMode::FlattenLazy(inner.clone())
        } else {
            FieldMode::Flatten
        };

        if flatten && tag.is_some() {
            return Err(syn::Error::new_spanned(
                field,
                "a flattened field cannot be renamed",
            ));
        }

        fields.push(RecordField {
            name: ident.to_string().trim_start_matches("r#").to_string(),
            ident,
            tag,
            mode,
            ty: field.ty.clone(),
        });
    }

    Ok(fields)
}

/// `Option<T>` -> `T`
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
