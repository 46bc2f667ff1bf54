use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A persistable type with a name and an identifier
///
/// Derive it with `#[derive(Entity)]`:
///
/// ```ignore
/// use txscope::prelude::*;
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
/// #[entity(name = "orders")]
/// pub struct Order {
///     #[id]
///     pub id: u64,
///     pub total: i64,
/// }
/// ```
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + 'static {
    /// The type used for the identifier
    type Id: Clone + Debug + Serialize + DeserializeOwned;

    /// Name the entity is stored and queried under
    fn entity_name() -> &'static str;

    /// Identifier of this instance
    fn id(&self) -> Self::Id;
}
