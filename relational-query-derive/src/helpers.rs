//! Helper functions for implementing procedural macros.

use convert_case::{Case, Casing};
use itertools::Itertools;
use proc_macro2::TokenStream;
use std::borrow::Borrow;
use syn::{
    parenthesized,
    parse::{Parse, Parser},
    Attribute, Expr, GenericArgument, Ident, Lit, Meta, PathArguments, Type,
};

/// Convenient parsing interface for helper attributes.
pub struct AttrParser(String);

impl AttrParser {
    /// Create a new parser for attributes in `scope`, the top-level identifier of attributes parsed
    /// by this parser.
    ///
    /// This parser will parse attributes of the form `#[scope(name)]` (boolean attributes) or
    /// `#[scope(name(arg))]` (argument attributes). Several items can share one attribute, as in
    /// `#[scope(a(x), b)]`.
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// Check if a list of attributes has a certain boolean attribute.
    ///
    /// # Panics
    ///
    /// Panics if `attrs` has an attribute in this scope which is malformed.
    pub fn has_bool<I>(&self, attrs: I, name: &str) -> bool
    where
        I: IntoIterator,
        I::Item: Borrow<Attribute>,
    {
        attrs
            .into_iter()
            .flat_map(|a| self.parse_attr(a.borrow()))
            .any(|(attr_name, param)| attr_name == name && param.is_none())
    }

    /// Check if a list of attributes has a certain attribute and return its argument.
    ///
    /// # Panics
    ///
    /// Panics if `attrs` has an attribute in this scope which is malformed, or if the attribute
    /// exists but its argument does not parse as a `T`.
    pub fn get_arg<T: Parse, I>(&self, attrs: I, name: &str) -> Option<T>
    where
        I: IntoIterator,
        I::Item: Borrow<Attribute>,
    {
        attrs
            .into_iter()
            .flat_map(|a| self.parse_attr(a.borrow()))
            .find_map(|(attr_name, param)| {
                if attr_name != name {
                    return None;
                }
                let param =
                    param.unwrap_or_else(|| panic!("{} attribute requires an argument", name));
                Some(T::parse.parse2(param).unwrap_or_else(|_| {
                    panic!(
                        "argument to {} must be a {}",
                        name,
                        std::any::type_name::<T>(),
                    )
                }))
            })
    }

    /// Parse an attribute in this scope, returning the name and parameter of each item.
    ///
    /// For example, parsing the attribute `#[scope(foo(bar), baz)]` would result in
    /// `[("foo", Some("bar")), ("baz", None)]`. If `a` is not in scope, the result is empty.
    ///
    /// # Panics
    ///
    /// Panics if `a` is in scope but malformed (e.g. it's name is `self.scope()` but one of its
    /// items does not start with an identifier).
    pub fn parse_attr(&self, a: &Attribute) -> Vec<(Ident, Option<TokenStream>)> {
        let mut parsed = vec![];
        if a.path().is_ident(&self.0) {
            a.parse_nested_meta(|meta| {
                let name = meta.path.get_ident().unwrap_or_else(|| {
                    panic!("{} attribute must start with an identifier", self.0)
                });
                let content = if meta.input.is_empty() || meta.input.peek(syn::Token![,]) {
                    None
                } else {
                    let content;
                    parenthesized!(content in meta.input);
                    Some(content.parse()?)
                };
                parsed.push((name.clone(), content));
                Ok(())
            })
            .unwrap_or_else(|err| panic!("malformed {} attribute: {}", self.0, err));
        }
        parsed
    }
}

/// Extract documentation from the attributes on an item.
///
/// The documentation is constructed by taking all the `#[doc = "..."]` attributes and concatenating
/// their arguments, separated by newlines.
pub fn parse_docs(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            let Meta::NameValue(nv) = &attr.meta else { return None; };
            if !nv.path.is_ident("doc") {
                return None;
            }
            let Expr::Lit(lit) = &nv.value else { return None; };
            let Lit::Str(s) = &lit.lit else { return None; };
            Some(s.value().trim().to_string())
        })
        .join("\n")
}

/// The name of a Rust identifier as it appears in queries.
///
/// Raw identifiers lose their `r#` prefix and snake_case becomes camelCase, so `upvote_count` is
/// `upvoteCount`.
pub fn query_name(ident: &Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#")
        .unwrap_or(&name)
        .to_case(Case::Camel)
}

/// If `ty` is a path whose last segment is `wrapper<T>`, get `T`.
///
/// This only looks at the syntax of the type, so a type alias for the wrapper will not be
/// recognized.
pub fn unwrap_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else { return None; };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else { return None; };
    match args.args.iter().exactly_one() {
        Ok(GenericArgument::Type(inner)) => Some(inner),
        _ => None,
    }
}
