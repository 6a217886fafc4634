//! Replay requests and responses.
//!
//! A request is a flat JSON object holding every configuration field, the
//! target SMILES and the collaborator selections. It is parsed strictly:
//! replays never fall back to defaults.
//!
//! The expansion selection is written under `policy` (a string) when exactly
//! one policy is active and under `policies` (a list) otherwise. Both keys are
//! accepted on input; `policy` takes precedence when a request carries both.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::chem::Molecule;
use crate::config::Configuration;
use crate::error::{RetroError, RetroResult, ValidationError};
use crate::selection::Selection;

/// Keys that must be present in every request, in the order they are checked.
pub const REQUIRED_KEYS: [&str; 12] = [
    "stocks",
    "policy",
    "C",
    "max_transforms",
    "cutoff_cumulative",
    "cutoff_number",
    "smiles",
    "return_first",
    "time_limit",
    "iteration_limit",
    "exclude_target_from_stock",
    "filter_cutoff",
];

/// How the expansion selection is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyField<'a> {
    /// Exactly one active policy: `"policy": "<name>"`.
    Single(&'a str),
    /// Any other count: `"policies": [...]`.
    Many(&'a Selection),
}

impl<'a> PolicyField<'a> {
    /// Pick the key for `selection`.
    #[must_use]
    pub fn for_selection(selection: &'a Selection) -> Self {
        match selection.as_slice() {
            [only] => Self::Single(only),
            _ => Self::Many(selection),
        }
    }

    /// The JSON key this form is written under.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Single(_) => "policy",
            Self::Many(_) => "policies",
        }
    }
}

/// Everything needed to replay a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Active stock inventories.
    pub stocks: Selection,
    /// Active expansion policies.
    pub policies: Selection,
    /// Empty when no filter is active.
    pub filter: Selection,
    /// Target SMILES.
    pub smiles: String,
    /// Search properties.
    pub config: Configuration,
    /// Annotate returned routes with every registered scorer. Input only.
    pub score_trees: bool,
}

impl SearchRequest {
    /// Parse and validate a request.
    ///
    /// Missing keys fail with [`ValidationError::MissingField`]; a missing
    /// expansion selection is reported as `policy`. Nothing outside the
    /// returned value is touched.
    pub fn from_value(value: &Value) -> RetroResult<Self> {
        let obj = value.as_object().ok_or_else(|| ValidationError::InvalidField {
            field: "request".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;

        for key in REQUIRED_KEYS {
            let present = match key {
                "policy" => obj.contains_key("policy") || obj.contains_key("policies"),
                _ => obj.contains_key(key),
            };
            if !present {
                return Err(ValidationError::MissingField {
                    field: key.to_string(),
                }
                .into());
            }
        }

        let policies = match obj.get("policy") {
            Some(v) => selection_field(v, "policy")?,
            None => selection_field(&obj["policies"], "policies")?,
        };
        let filter = match obj.get("filter") {
            None | Some(Value::Null) => Selection::empty(),
            Some(v) => selection_field(v, "filter")?,
        };

        let smiles = string_field(obj, "smiles")?;
        Molecule::from_smiles(&smiles)?;

        let config = Configuration {
            c: f64_field(obj, "C")?,
            max_transforms: usize_field(obj, "max_transforms")?,
            cutoff_cumulative: f64_field(obj, "cutoff_cumulative")?,
            cutoff_number: usize_field(obj, "cutoff_number")?,
            return_first: bool_field(obj, "return_first")?,
            time_limit: f64_field(obj, "time_limit")?,
            iteration_limit: usize_field(obj, "iteration_limit")?,
            exclude_target_from_stock: bool_field(obj, "exclude_target_from_stock")?,
            filter_cutoff: f64_field(obj, "filter_cutoff")?,
        };
        config.validate()?;

        let score_trees = match obj.get("score_trees") {
            None | Some(Value::Null) => false,
            Some(_) => bool_field(obj, "score_trees")?,
        };

        Ok(Self {
            stocks: selection_field(&obj["stocks"], "stocks")?,
            policies,
            filter,
            smiles,
            config,
            score_trees,
        })
    }

    /// The target molecule.
    pub fn target(&self) -> RetroResult<Molecule> {
        Ok(Molecule::from_smiles(&self.smiles)?)
    }

    /// How the expansion selection is written.
    #[must_use]
    pub fn policy_field(&self) -> PolicyField<'_> {
        PolicyField::for_selection(&self.policies)
    }

    /// The request as a JSON object.
    pub fn to_value(&self) -> RetroResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| RetroError::internal(format!("failed to serialize request: {e}")))
    }
}

impl Serialize for SearchRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cfg = &self.config;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("stocks", &self.stocks)?;
        let policy = self.policy_field();
        match policy {
            PolicyField::Single(name) => map.serialize_entry(policy.key(), name)?,
            PolicyField::Many(all) => map.serialize_entry(policy.key(), all)?,
        }
        if !self.filter.is_empty() {
            map.serialize_entry("filter", &self.filter)?;
        }
        map.serialize_entry("C", &cfg.c)?;
        map.serialize_entry("max_transforms", &cfg.max_transforms)?;
        map.serialize_entry("cutoff_cumulative", &cfg.cutoff_cumulative)?;
        map.serialize_entry("cutoff_number", &cfg.cutoff_number)?;
        map.serialize_entry("smiles", &self.smiles)?;
        map.serialize_entry("return_first", &cfg.return_first)?;
        map.serialize_entry("time_limit", &cfg.time_limit)?;
        map.serialize_entry("iteration_limit", &cfg.iteration_limit)?;
        map.serialize_entry(
            "exclude_target_from_stock",
            &cfg.exclude_target_from_stock,
        )?;
        map.serialize_entry("filter_cutoff", &cfg.filter_cutoff)?;
        map.end()
    }
}

/// Result of a replayed search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// The request as reconstructed from the finder's live settings.
    pub request: SearchRequest,
    /// Route dictionaries, best first.
    pub trees: Vec<Value>,
}

impl SearchResponse {
    /// The response as a JSON object.
    pub fn to_value(&self) -> RetroResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| RetroError::internal(format!("failed to serialize response: {e}")))
    }
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn selection_field(value: &Value, field: &str) -> Result<Selection, ValidationError> {
    serde_json::from_value(value.clone()).map_err(|e| invalid(field, &e.to_string()))
}

fn string_field(obj: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    obj[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(field, "expected a string"))
}

fn f64_field(obj: &Map<String, Value>, field: &str) -> Result<f64, ValidationError> {
    obj[field]
        .as_f64()
        .ok_or_else(|| invalid(field, "expected a number"))
}

fn usize_field(obj: &Map<String, Value>, field: &str) -> Result<usize, ValidationError> {
    obj[field]
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(field, "expected a non-negative integer"))
}

fn bool_field(obj: &Map<String, Value>, field: &str) -> Result<bool, ValidationError> {
    obj[field]
        .as_bool()
        .ok_or_else(|| invalid(field, "expected a boolean"))
}
