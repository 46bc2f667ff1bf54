//! Query support for the in-memory provider
//!
//! The grammar is deliberately small:
//!
//! ```text
//! [select] from <entity> [where <field> = :<param> [and <field> = :<param>]...]
//! delete from <entity> [where <field> = :<param> [and ...]]
//! ```
//!
//! Keywords are case-insensitive and tokens are separated by whitespace.

use super::session::{EntityKey, Pending, SessionInner};
use crate::errors::ProviderError;
use crate::traits::{Entity, Query};
use crate::types::FlushMode;
use crate::validation::ValidatedName;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueryKind {
    Select,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Condition {
    field: String,
    parameter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuerySpec {
    kind: QueryKind,
    entity: String,
    conditions: Vec<Condition>,
}

impl QuerySpec {
    pub(crate) fn parse(ql: &str) -> Result<Self, ProviderError> {
        let tokens: Vec<&str> = ql.split_whitespace().collect();
        let mut position = 0;

        let kind = match tokens.first().map(|t| t.to_ascii_lowercase()) {
            Some(first) if first == "delete" => {
                position += 1;
                QueryKind::Delete
            }
            Some(first) if first == "select" => {
                position += 1;
                QueryKind::Select
            }
            Some(_) => QueryKind::Select,
            None => return Err(ProviderError::query("query is empty")),
        };

        expect_keyword(&tokens, position, "from")?;
        position += 1;

        let entity = tokens
            .get(position)
            .ok_or_else(|| ProviderError::query("expected an entity name after 'from'"))?;
        let entity = ValidatedName::new(entity)
            .map_err(|e| ProviderError::query(e.to_string()))?
            .into_string();
        position += 1;

        let mut conditions = Vec::new();
        if position < tokens.len() {
            expect_keyword(&tokens, position, "where")?;
            position += 1;

            loop {
                conditions.push(parse_condition(&tokens, position)?);
                position += 3;

                if position >= tokens.len() {
                    break;
                }
                expect_keyword(&tokens, position, "and")?;
                position += 1;
            }
        }

        Ok(Self {
            kind,
            entity,
            conditions,
        })
    }

    fn matches(
        &self,
        row: &serde_json::Value,
        parameters: &HashMap<String, serde_json::Value>,
    ) -> Result<bool, ProviderError> {
        for condition in &self.conditions {
            let expected = parameters.get(&condition.parameter).ok_or_else(|| {
                ProviderError::query(format!("parameter '{}' is not bound", condition.parameter))
            })?;
            if row.get(&condition.field) != Some(expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn expect_keyword(tokens: &[&str], position: usize, keyword: &str) -> Result<(), ProviderError> {
    match tokens.get(position) {
        Some(token) if token.eq_ignore_ascii_case(keyword) => Ok(()),
        Some(token) => Err(ProviderError::query(format!(
            "expected '{}', found '{}'",
            keyword, token
        ))),
        None => Err(ProviderError::query(format!(
            "expected '{}' at end of query",
            keyword
        ))),
    }
}

fn parse_condition(tokens: &[&str], position: usize) -> Result<Condition, ProviderError> {
    let (Some(field), Some(&"="), Some(parameter)) = (
        tokens.get(position),
        tokens.get(position + 1),
        tokens.get(position + 2),
    ) else {
        return Err(ProviderError::query(
            "expected a condition of the form '<field> = :<param>'",
        ));
    };

    let field = ValidatedName::new(field).map_err(|e| ProviderError::query(e.to_string()))?;
    let parameter = parameter
        .strip_prefix(':')
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ProviderError::query(format!("expected a named parameter, found '{}'", parameter))
        })?;

    Ok(Condition {
        field: field.into_string(),
        parameter: parameter.to_string(),
    })
}

/// Query created by a [`MemorySession`](super::MemorySession)
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    session: Arc<SessionInner>,
    spec: QuerySpec,
    parameters: HashMap<String, serde_json::Value>,
    max_results: Option<usize>,
}

impl MemoryQuery {
    pub(crate) fn new(session: Arc<SessionInner>, spec: QuerySpec) -> Self {
        Self {
            session,
            spec,
            parameters: HashMap::new(),
            max_results: None,
        }
    }

    /// Entity the query reads from or deletes in
    pub fn entity_name(&self) -> &str {
        &self.spec.entity
    }
}

impl Query for MemoryQuery {
    fn set_parameter(mut self, name: &str, value: serde_json::Value) -> Self {
        self.parameters
            .insert(name.trim_start_matches(':').to_string(), value);
        self
    }

    fn set_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    fn result_list<E: Entity>(&self) -> Result<Vec<E>, ProviderError> {
        if self.spec.kind != QueryKind::Select {
            return Err(ProviderError::query("result_list requires a select query"));
        }
        if self.spec.entity != E::entity_name() {
            return Err(ProviderError::query(format!(
                "query reads '{}', not '{}'",
                self.spec.entity,
                E::entity_name()
            )));
        }

        let state = self.session.state()?;
        if !state.open {
            return Err(ProviderError::SessionClosed);
        }

        // In commit flush mode queries only see committed rows
        let include_pending = state.flush_mode == FlushMode::Auto;
        let rows = self
            .session
            .visible_rows(&state, &self.spec.entity, include_pending)?;

        let mut results = Vec::new();
        for row in rows.values() {
            if self.max_results.is_some_and(|max| results.len() >= max) {
                break;
            }
            if self.spec.matches(row, &self.parameters)? {
                results.push(serde_json::from_value(row.clone())?);
            }
        }
        Ok(results)
    }

    fn execute_update(&self) -> Result<u64, ProviderError> {
        if self.spec.kind != QueryKind::Delete {
            return Err(ProviderError::query("execute_update requires a delete query"));
        }

        let mut state = self.session.state()?;
        if !state.open {
            return Err(ProviderError::SessionClosed);
        }
        if !state.tx_active {
            return Err(ProviderError::TransactionRequired("execute_update"));
        }

        let rows = self.session.visible_rows(&state, &self.spec.entity, true)?;
        let mut deleted: Vec<EntityKey> = Vec::new();
        for (id, row) in &rows {
            if self.spec.matches(row, &self.parameters)? {
                deleted.push((self.spec.entity.clone(), id.clone()));
            }
        }

        let count = deleted.len() as u64;
        for key in deleted {
            state.pending.insert(key, Pending::Delete);
        }
        Ok(count)
    }
}
