use crate::parsing::{EntityInfo, IdField};
use quote::quote;
use syn::{Generics, Ident};

/// Generate the `Entity` implementation
///
/// Paths go through the `txscope` re-export of `persistence_provider`, so
/// deriving crates only need `txscope` as a dependency.
pub fn generate_entity_impl(
    name: &Ident,
    generics: &Generics,
    entity_info: &EntityInfo,
    id_field: &IdField,
) -> proc_macro2::TokenStream {
    let entity_name = &entity_info.name;
    let id_ident = &id_field.ident;
    let id_type = &id_field.ty;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    quote! {
        impl #impl_generics ::txscope::persistence_provider::Entity for #name #ty_generics #where_clause {
            type Id = #id_type;

            fn entity_name() -> &'static str {
                #entity_name
            }

            fn id(&self) -> Self::Id {
                ::core::clone::Clone::clone(&self.#id_ident)
            }
        }
    }
}
