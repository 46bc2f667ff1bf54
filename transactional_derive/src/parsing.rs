//! Parsing utilities for entity attributes
//!
//! This module handles the parsing of `#[entity]` and `#[id]` attributes and
//! validation of entity names.

use syn::{Attribute, Data, Error, Fields, Ident, LitStr, Result, Type};

/// Validate entity name and return syn::Error for better proc macro error handling
pub fn validate_entity_name_syn(name: &str, span: proc_macro2::Span) -> Result<()> {
    validate_identifier(name)
        .map_err(|e| Error::new(span, format!("Invalid entity name '{}': {}", name, e)))
}

/// Same rules as `persistence_provider::ValidatedName`, so a derived name is
/// always accepted by the query parser at runtime
fn validate_identifier(name: &str) -> std::result::Result<(), String> {
    const RESERVED_WORDS: &[&str] = &["SELECT", "FROM", "WHERE", "AND", "UPDATE", "DELETE"];

    let mut chars = name.chars();
    let first = chars.next().ok_or("Name cannot be empty")?;
    if name.len() > 63 {
        return Err(format!("too long: {} characters (max 63)", name.len()));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err("must start with a letter or underscore".to_string());
    }
    if let Some(found) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(format!(
            "invalid character '{}': only letters, digits and underscores are allowed",
            found
        ));
    }
    if RESERVED_WORDS.iter().any(|word| word.eq_ignore_ascii_case(name)) {
        return Err("reserved query keyword".to_string());
    }
    Ok(())
}

#[derive(Debug)]
pub struct EntityInfo {
    pub name: String,
}

#[derive(Debug)]
pub struct IdField {
    pub ident: Ident,
    pub ty: Type,
}

pub fn parse_entity_attributes(struct_name: &Ident, attrs: &[Attribute]) -> Result<EntityInfo> {
    let mut entity_name = None;

    for attr in attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    entity_name = Some((value.value(), value.span()));
                    Ok(())
                } else {
                    Err(meta.error("unsupported entity attribute, expected `name = \"...\"`"))
                }
            })?;
        }
    }

    let (name, span) = entity_name
        .unwrap_or_else(|| (struct_name.to_string().to_ascii_lowercase(), struct_name.span()));

    // Validate entity name at compile time with proper error handling
    validate_entity_name_syn(&name, span)?;

    Ok(EntityInfo { name })
}

pub fn parse_id_field(struct_name: &Ident, data: &Data) -> Result<IdField> {
    let Data::Struct(data_struct) = data else {
        return Err(Error::new_spanned(
            struct_name,
            "Entity can only be derived for structs",
        ));
    };
    let Fields::Named(fields_named) = &data_struct.fields else {
        return Err(Error::new_spanned(
            struct_name,
            "Entity can only be derived for structs with named fields",
        ));
    };

    let mut marked = None;
    let mut fallback = None;

    for field in &fields_named.named {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new_spanned(field, "Field must have a name"))?;

        if has_attribute(&field.attrs, "id") {
            if marked.is_some() {
                return Err(Error::new_spanned(
                    field_name,
                    "only one field can be marked #[id]",
                ));
            }
            marked = Some(IdField {
                ident: field_name.clone(),
                ty: field.ty.clone(),
            });
        } else if *field_name == "id" {
            fallback = Some(IdField {
                ident: field_name.clone(),
                ty: field.ty.clone(),
            });
        }
    }

    marked.or(fallback).ok_or_else(|| {
        Error::new_spanned(
            struct_name,
            "Entity requires an identifier: mark a field with #[id] or name it `id`",
        )
    })
}

fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}
