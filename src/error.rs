//! Error types for retrosearch.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the specific failure instead of parsing messages.

use std::path::PathBuf;

use thiserror::Error;

/// Validation errors raised while reading user input.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField {
        field: String,
        reason: String,
    },

    #[error("Invalid SMILES '{smiles}': {reason}")]
    InvalidSmiles {
        smiles: String,
        reason: String,
    },

    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfiguration {
        field: String,
        reason: String,
    },

    #[error("Invalid selection: {reason}")]
    InvalidSelection {
        reason: String,
    },

    #[error("Probability {value} is out of range [0.0, 1.0]")]
    InvalidProbability {
        value: f64,
    },
}

/// Execution errors raised while preparing, running or post-processing a search.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ExecutionError {
    #[error("No target molecule has been set")]
    NoTarget,

    #[error("No search tree exists; prepare and run a search before building routes")]
    NoTree,

    #[error("Scorer not found: '{name}'")]
    UnknownScorer {
        name: String,
    },

    #[error("Unknown {kind} selection: '{name}'")]
    UnknownSelection {
        kind: String,
        name: String,
    },

    #[error("{component} failed: {message}")]
    Collaborator {
        component: String,
        message: String,
    },
}

/// Errors raised while loading a configuration source.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {message}")]
    Parse {
        message: String,
    },
}

/// Top-level error type for retrosearch.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum RetroError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl RetroError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a collaborator failure attributed to `component`.
    #[must_use]
    pub fn collaborator(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution(ExecutionError::Collaborator {
            component: component.into(),
            message: message.into(),
        })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a configuration loading error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns the field name if this is a missing-field error.
    #[must_use]
    pub fn missing_field(&self) -> Option<&str> {
        match self {
            Self::Validation(ValidationError::MissingField { field }) => Some(field),
            _ => None,
        }
    }
}

/// Result type alias for retrosearch operations.
pub type RetroResult<T> = Result<T, RetroError>;
