//! Procedural macros for transaction demarcation and entity metadata
//!
//! This crate provides the `#[transactional]` attribute, which runs a function
//! body inside a persistence unit's transaction boundary, and the `Entity`
//! derive used by persistence providers to name and identify stored types.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod entity_generation;
mod parsing;
mod transactional_macro;

use entity_generation::generate_entity_impl;
use parsing::{parse_entity_attributes, parse_id_field};
use transactional_macro::transactional_attribute;

/// Derive macro for the `Entity` trait
///
/// The entity name defaults to the lowercased struct name. The identifier is
/// the field marked `#[id]`, or a field called `id` when none is marked.
///
/// ```rust,ignore
/// use txscope::prelude::*;
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
/// #[entity(name = "accounts")]
/// pub struct Account {
///     #[id]
///     pub number: u64,
///     pub owner: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, id))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let entity_info = match parse_entity_attributes(name, &input.attrs) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    let id_field = match parse_id_field(name, &input.data) {
        Ok(field) => field,
        Err(e) => return e.to_compile_error().into(),
    };

    TokenStream::from(generate_entity_impl(
        name,
        &input.generics,
        &entity_info,
        &id_field,
    ))
}

/// Run a function body inside a persistence unit's transaction boundary
///
/// The argument is any expression evaluating to a `PersistenceUnit` (or a
/// reference to one). The function must return `Result<T, E>` where `E`
/// implements `GuardedError`. The outermost call opens a transaction and
/// commits or rolls it back; nested calls join the open one.
///
/// ```rust,ignore
/// use txscope::prelude::*;
///
/// #[transactional(self.unit)]
/// fn transfer(&self, from: u64, to: u64, amount: i64) -> Result<(), TransactionError> {
///     let mut source: Account = self.unit.get_reference(&from)?;
///     source.balance -= amount;
///     self.unit.merge(&source)?;
///     self.deposit(to, amount)
/// }
/// ```
#[proc_macro_attribute]
pub fn transactional(attr: TokenStream, item: TokenStream) -> TokenStream {
    transactional_attribute(attr, item)
}
