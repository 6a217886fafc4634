//! Named selections of stocks and policies.
//!
//! A selection is an order-preserving, deduplicated list of names. Unlike a
//! priority list it may be empty: an empty filter selection means "no
//! filter".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, RetroResult, ValidationError};

/// An ordered, deduplicated set of names.
///
/// - Duplicate names are ignored (first occurrence wins).
/// - Blank names are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection(Vec<String>);

impl Selection {
    /// Construct a validated selection.
    pub fn new<I, S>(names: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut deduped = Vec::new();
        for name in names {
            let name: String = name.into();
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ValidationError::InvalidSelection {
                    reason: "selection names cannot be blank".to_string(),
                });
            }
            if seen.insert(name.clone()) {
                deduped.push(name);
            }
        }
        Ok(Self(deduped))
    }

    /// A selection of exactly one name.
    pub fn single(name: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new([name.into()])
    }

    /// The empty selection.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Number of selected names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the names as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the first name, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// True when `name` is selected.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    /// Iterate over the names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let names = match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(name) => vec![name],
            OneOrMany::Many(names) => names,
        };
        Selection::new(names).map_err(serde::de::Error::custom)
    }
}

/// A collaborator whose active subset is chosen by name.
///
/// Implementations check names against what they have loaded and fail with
/// `ExecutionError::UnknownSelection` for anything else.
pub trait Selectable: Send + Sync {
    /// Replace the active selection.
    fn select(&self, names: &Selection) -> RetroResult<()>;

    /// Clear the active selection.
    fn deselect(&self) -> RetroResult<()>;

    /// The active selection, in selection order.
    fn selection(&self) -> RetroResult<Selection>;

    /// Every loaded name, selectable or not.
    fn available(&self) -> RetroResult<Vec<String>>;
}

/// Fails with `UnknownSelection` for the first name not in `loaded`.
pub(crate) fn ensure_known(
    kind: &str,
    names: &Selection,
    mut loaded: impl FnMut(&str) -> bool,
) -> RetroResult<()> {
    if let Some(unknown) = names.iter().find(|n| !loaded(*n)) {
        return Err(ExecutionError::UnknownSelection {
            kind: kind.to_string(),
            name: unknown.to_string(),
        }
        .into());
    }
    Ok(())
}
