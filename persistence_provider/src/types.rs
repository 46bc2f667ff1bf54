//! Value types shared by every provider
//!
//! Lock and flush modes, property maps, find options and entity graphs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider and session properties, keyed by property name
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Lock applied to a managed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LockMode {
    #[default]
    None,
    Optimistic,
    OptimisticForceIncrement,
    PessimisticRead,
    PessimisticWrite,
    PessimisticForceIncrement,
}

impl LockMode {
    pub fn is_pessimistic(&self) -> bool {
        matches!(
            self,
            LockMode::PessimisticRead
                | LockMode::PessimisticWrite
                | LockMode::PessimisticForceIncrement
        )
    }
}

/// When pending changes are pushed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlushMode {
    /// Before query execution and at commit
    #[default]
    Auto,
    /// Only at commit
    Commit,
}

/// Optional arguments for `find` and `refresh`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub lock_mode: Option<LockMode>,
    pub properties: Properties,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_mode(mut self, lock_mode: LockMode) -> Self {
        self.lock_mode = Some(lock_mode);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// Fetch plan describing which attributes of an entity to load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityGraph {
    /// Graph name; `None` for graphs built ad hoc
    pub name: Option<String>,
    /// Entity the graph is rooted at
    pub root: String,
    /// Attribute nodes, in insertion order
    pub attributes: Vec<String>,
}

impl EntityGraph {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            name: None,
            root: root.into(),
            attributes: Vec::new(),
        }
    }

    pub fn named(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(root)
        }
    }

    pub fn add_attribute_nodes<I, S>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for attribute in attributes {
            let attribute = attribute.into();
            if !self.attributes.contains(&attribute) {
                self.attributes.push(attribute);
            }
        }
    }

    pub fn with_attribute_nodes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_attribute_nodes(attributes);
        self
    }
}
