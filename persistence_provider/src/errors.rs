use thiserror::Error;

/// Failures raised by a persistence provider and the sessions it hands out
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to construct session factory: {0}")]
    Construction(String),

    #[error("Unknown persistence unit: {0}")]
    UnknownUnit(String),

    #[error("Session factory for unit '{0}' is closed")]
    FactoryClosed(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Operation '{0}' requires an active transaction")]
    TransactionRequired(&'static str),

    #[error("Transaction is already active")]
    TransactionAlreadyActive,

    #[error("Transaction is not active")]
    TransactionNotActive,

    #[error("Entity not found: {entity} with id {id}")]
    EntityNotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    EntityExists { entity: String, id: String },

    #[error("Unknown entity graph: {0}")]
    UnknownEntityGraph(String),

    #[error("Unknown named query: {0}")]
    UnknownNamedQuery(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl ProviderError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn exists(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EntityExists {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }
}
