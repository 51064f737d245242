//! Unified error type for the emod workspace
//!
//! [`EmodError`] covers every failure class the model-assembly pipeline can
//! raise: unreadable scenario input, failed catalogue queries, assembly
//! invariant violations, result persistence and solver plumbing. Empty
//! domains and non-optimal solver outcomes are deliberately *not* errors.
//!
//! # Example
//!
//! ```ignore
//! use emod_core::{EmodError, EmodResult};
//!
//! fn open_scenario(path: &str) -> EmodResult<()> {
//!     let store = FactStore::open(path)?;
//!     assemble(&store)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all emod operations.
#[derive(Error, Debug)]
pub enum EmodError {
    /// I/O errors (file access, directory listing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid scenario input, raised before any model work
    #[error("Input error: {0}")]
    Input(String),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// A catalogued query failed against the fact store
    #[error("Query '{name}' failed: {message}")]
    Query { name: String, message: String },

    /// Model assembly invariant violated (unknown family, duplicate declaration, ...)
    #[error("Assembly error: {0}")]
    Assembly(String),

    /// Writing a result table failed; the family's table was rolled back
    #[error("Persisting '{family}' failed: {message}")]
    Persistence { family: String, message: String },

    /// Solver plumbing errors (backend unavailable, translation failure)
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using EmodError.
pub type EmodResult<T> = Result<T, EmodError>;

impl EmodError {
    pub fn query(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        EmodError::Query {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn persistence(family: impl Into<String>, message: impl std::fmt::Display) -> Self {
        EmodError::Persistence {
            family: family.into(),
            message: message.to_string(),
        }
    }

    /// True for failures that happen before any model work begins.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EmodError::Io(_) | EmodError::Input(_) | EmodError::Parse(_) | EmodError::Config(_)
        )
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for EmodError {
    fn from(err: anyhow::Error) -> Self {
        EmodError::Other(err.to_string())
    }
}

impl From<String> for EmodError {
    fn from(s: String) -> Self {
        EmodError::Other(s)
    }
}

impl From<&str> for EmodError {
    fn from(s: &str) -> Self {
        EmodError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for EmodError {
    fn from(err: serde_json::Error) -> Self {
        EmodError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for EmodError {
    fn from(err: toml::de::Error) -> Self {
        EmodError::Config(err.to_string())
    }
}
