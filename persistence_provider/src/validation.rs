//! Identifier validation
//!
//! Entity names, query fields and parameter names are spliced into query
//! text, so each one must be a plain identifier and not a keyword of the
//! query grammar.

use std::fmt;
use thiserror::Error;

/// Longest identifier accepted
pub const MAX_NAME_LENGTH: usize = 63;

/// Words the memory query grammar reserves, compared case-insensitively
pub const RESERVED_WORDS: &[&str] = &["SELECT", "FROM", "WHERE", "AND", "UPDATE", "DELETE"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name '{name}' is too long: {length} characters (max {max})", max = MAX_NAME_LENGTH)]
    TooLong { name: String, length: usize },

    #[error("Name '{0}' must start with a letter or underscore")]
    InvalidStartCharacter(String),

    #[error("Invalid character '{found}' in name '{name}': only letters, digits and underscores are allowed")]
    InvalidCharacters { name: String, found: char },

    #[error("Name '{0}' is a reserved query keyword")]
    ReservedKeyword(String),
}

/// An identifier that passed [`ValidatedName::new`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedName(String);

impl ValidatedName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        check(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn check(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(ValidationError::Empty)?;

    if name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            name: name.to_string(),
            length: name.len(),
        });
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(ValidationError::InvalidStartCharacter(name.to_string()));
    }
    if let Some(found) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(ValidationError::InvalidCharacters {
            name: name.to_string(),
            found,
        });
    }
    if RESERVED_WORDS
        .iter()
        .any(|word| word.eq_ignore_ascii_case(name))
    {
        return Err(ValidationError::ReservedKeyword(name.to_string()));
    }
    Ok(())
}

impl fmt::Display for ValidatedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
