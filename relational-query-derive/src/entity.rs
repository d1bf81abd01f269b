//! Derive macro for `Entity` descriptions of plain Rust structs.

use crate::helpers::{parse_docs, query_name, unwrap_type, AttrParser};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr};

/// The path of the `relational_query` crate in the scope invoking a procedural macro.
fn crate_path() -> TokenStream {
    quote!(relational_query)
}

/// Generate an `Entity` implementation for a struct.
pub fn derive(
    DeriveInput {
        ident,
        generics,
        data,
        attrs,
        ..
    }: DeriveInput,
) -> TokenStream {
    if !generics.params.is_empty() {
        panic!("Entity cannot be derived on generic types");
    }
    match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(fields) => generate_struct(ident, attrs, fields.named),
            _ => panic!("Entity can only be derived for structs with named fields"),
        },
        _ => panic!("Entity can only be derived for structs"),
    }
}

/// What a struct field turns into.
enum Member {
    /// A queryable field, with the expression which converts the Rust value into a `Value`.
    Field {
        describe: TokenStream,
        into_value: TokenStream,
    },
    /// A relation, which has no value in a row.
    Relation { describe: TokenStream },
    Skipped,
}

fn generate_struct(
    name: Ident,
    attrs: Vec<Attribute>,
    fields: impl IntoIterator<Item = syn::Field>,
) -> TokenStream {
    let krate = crate_path();
    let p = AttrParser::new("entity");

    let entity_name = p
        .get_arg::<LitStr, _>(&attrs, "name")
        .map(|lit| lit.value())
        .unwrap_or_else(|| name.to_string());

    let mut describe = vec![];
    let mut inserts = vec![];
    for field in fields {
        let Some(ident) = &field.ident else { continue };
        let field_name = field_name(&p, &field.attrs, ident);
        match generate_member(&p, &field, ident, &field_name) {
            Member::Field {
                describe: d,
                into_value,
            } => {
                describe.push(quote!(.with_field(#d)));
                inserts.push(quote! {
                    record.insert(#field_name, #into_value);
                });
            }
            Member::Relation { describe: d } => {
                describe.push(quote!(.with_relation(#d)));
            }
            Member::Skipped => {}
        }
    }

    quote! {
        impl #krate::schema::Entity for #name {
            const NAME: &'static str = #entity_name;

            fn describe() -> #krate::schema::EntityCatalog {
                #krate::schema::EntityCatalog::new(Self::NAME)
                    #(#describe)*
            }

            #[allow(unused_mut)]
            fn into_record(self) -> #krate::value::Record {
                let mut record = #krate::value::Record::new();
                #(#inserts)*
                record
            }
        }
    }
}

fn field_name(p: &AttrParser, attrs: &[Attribute], ident: &Ident) -> String {
    p.get_arg::<LitStr, _>(attrs, "rename")
        .map(|lit| lit.value())
        .unwrap_or_else(|| query_name(ident))
}

fn generate_member(p: &AttrParser, field: &syn::Field, ident: &Ident, name: &str) -> Member {
    let krate = crate_path();
    let attrs = &field.attrs;

    if p.has_bool(attrs, "skip") {
        return Member::Skipped;
    }
    let references = p
        .get_arg::<Ident, _>(attrs, "references")
        .map(|key| query_name(&key))
        .unwrap_or_else(|| "id".into());

    if let Some(target) = unwrap_type(&field.ty, "BelongsTo") {
        let key = p
            .get_arg::<Ident, _>(attrs, "key")
            .unwrap_or_else(|| panic!("BelongsTo relation {} requires a key attribute", ident));
        let key = query_name(&key);
        return Member::Relation {
            describe: quote! {
                #krate::schema::Relation::to_one(
                    #name,
                    <#target as #krate::schema::Entity>::NAME,
                    #key,
                    #references,
                )
            },
        };
    }
    if let Some(target) = unwrap_type(&field.ty, "HasMany") {
        let inverse = p.get_arg::<Ident, _>(attrs, "inverse").unwrap_or_else(|| {
            panic!("HasMany relation {} requires an inverse attribute", ident)
        });
        let inverse = query_name(&inverse);
        return Member::Relation {
            describe: quote! {
                #krate::schema::Relation::to_many(
                    #name,
                    <#target as #krate::schema::Entity>::NAME,
                    #references,
                    #inverse,
                )
            },
        };
    }

    let (ty, nullable) = match unwrap_type(&field.ty, "Option") {
        Some(inner) => (inner, true),
        None => (&field.ty, false),
    };
    let enumeration = p.has_bool(attrs, "enumeration");

    let field_type = if enumeration {
        quote!(#krate::schema::FieldType::Enum)
    } else {
        quote!(<#ty as #krate::schema::Scalar>::TYPE)
    };
    let convert = if enumeration {
        quote!(|value: #ty| #krate::value::Value::Enum(value.to_string()))
    } else {
        quote!(<#ty as #krate::schema::Scalar>::into_value)
    };
    let into_value = if nullable {
        quote!(self.#ident.map_or(#krate::value::Value::Null, #convert))
    } else {
        quote!((#convert)(self.#ident))
    };

    let mut describe = quote!(#krate::schema::EntityField::new(#name, #field_type));
    if nullable {
        describe = quote!(#describe.nullable());
    }
    let doc = parse_docs(attrs);
    if !doc.is_empty() {
        describe = quote!(#describe.with_description(#doc));
    }

    Member::Field {
        describe,
        into_value,
    }
}
