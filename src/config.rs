//! Search configuration.
//!
//! A [`Configuration`] holds every tunable of one search. It can be built
//! from defaults, a JSON file, or an in-memory mapping; replay requests set
//! it field by field (see [`crate::request`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, RetroResult, ValidationError};
use crate::policy::TemplateEntry;

/// Tunable parameters of a tree search.
///
/// Every field always holds a value; missing keys in a file or mapping keep
/// the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Exploration constant of the child selection rule.
    #[serde(rename = "C")]
    pub c: f64,
    /// Maximum number of reactions applied along one route.
    pub max_transforms: usize,
    /// Cumulative prior at which expansion candidates stop being kept.
    pub cutoff_cumulative: f64,
    /// Maximum number of expansion candidates kept per molecule.
    pub cutoff_number: usize,
    /// Stop at the first solved route.
    pub return_first: bool,
    /// Wall-clock budget in seconds.
    pub time_limit: f64,
    /// Maximum number of search iterations.
    pub iteration_limit: usize,
    /// Do not treat the target itself as purchasable.
    pub exclude_target_from_stock: bool,
    /// Minimum filter feasibility for a reaction to be kept.
    pub filter_cutoff: f64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            c: 1.4,
            max_transforms: 6,
            cutoff_cumulative: 0.995,
            cutoff_number: 50,
            return_first: false,
            time_limit: 120.0,
            iteration_limit: 100,
            exclude_target_from_stock: true,
            filter_cutoff: 0.05,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidConfiguration {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl Configuration {
    /// Read the `properties` section of a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> RetroResult<Self> {
        Ok(ConfigFile::from_file(path)?.properties)
    }

    /// Build from a mapping.
    ///
    /// Accepts either a flat object of properties or a full configuration
    /// document with a `properties` section.
    pub fn from_dict(value: &Value) -> RetroResult<Self> {
        if ConfigFile::is_document(value) {
            return Ok(ConfigFile::from_value(value)?.properties);
        }
        let config: Self = serde_json::from_value(value.clone()).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges.
    ///
    /// This must be called before preparing a search tree.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.c.is_finite() || self.c < 0.0 {
            return Err(invalid("C", "must be a finite value >= 0"));
        }
        if self.max_transforms == 0 {
            return Err(invalid("max_transforms", "must be > 0"));
        }
        if !(self.cutoff_cumulative > 0.0 && self.cutoff_cumulative <= 1.0) {
            return Err(invalid("cutoff_cumulative", "must be in (0, 1]"));
        }
        if self.cutoff_number == 0 {
            return Err(invalid("cutoff_number", "must be > 0"));
        }
        if !self.time_limit.is_finite() || self.time_limit < 0.0 {
            return Err(invalid("time_limit", "must be a finite value >= 0"));
        }
        if !(0.0..=1.0).contains(&self.filter_cutoff) {
            return Err(invalid("filter_cutoff", "must be in [0, 1]"));
        }
        Ok(())
    }
}

/// A full configuration document.
///
/// Besides the search properties it can carry the data for the in-memory
/// collaborators: stock inventories, expansion tables and filter tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Search properties.
    #[serde(default)]
    pub properties: Configuration,
    /// Inventory name to purchasable SMILES.
    #[serde(default)]
    pub stock: BTreeMap<String, Vec<String>>,
    /// Policy name to product SMILES to known disconnections.
    #[serde(default)]
    pub expansion: BTreeMap<String, BTreeMap<String, Vec<TemplateEntry>>>,
    /// Filter name to reaction SMILES to feasibility.
    #[serde(default)]
    pub filter: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ConfigFile {
    const SECTIONS: [&'static str; 4] = ["properties", "stock", "expansion", "filter"];

    /// Read and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> RetroResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(s: &str) -> RetroResult<Self> {
        let value: Value = serde_json::from_str(s).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        Self::from_value(&value)
    }

    /// Parse and validate a configuration document held in memory.
    pub fn from_value(value: &Value) -> RetroResult<Self> {
        let file: Self = serde_json::from_value(value.clone()).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        file.properties.validate()?;
        Ok(file)
    }

    /// Like [`Self::from_value`], but a flat properties object is also
    /// accepted and yields a document with no collaborator sections.
    pub fn from_dict(value: &Value) -> RetroResult<Self> {
        if Self::is_document(value) {
            return Self::from_value(value);
        }
        Ok(Self {
            properties: Configuration::from_dict(value)?,
            ..Self::default()
        })
    }

    fn is_document(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|obj| Self::SECTIONS.iter().any(|k| obj.contains_key(*k)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn default_is_valid() {
        Configuration::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut c = Configuration::default();
        c.c = -1.0;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.cutoff_cumulative = 0.0;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.cutoff_number = 0;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.time_limit = f64::NAN;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.filter_cutoff = 1.5;
        assert!(c.validate().is_err());

        let mut c = Configuration::default();
        c.max_transforms = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_budgets_are_allowed() {
        let mut c = Configuration::default();
        c.time_limit = 0.0;
        c.iteration_limit = 0;
        c.validate().unwrap();
    }

    #[test]
    fn from_dict_overrides_only_given_keys() {
        let config = Configuration::from_dict(&json!({"C": 2.0, "iteration_limit": 7})).unwrap();
        assert!((config.c - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.iteration_limit, 7);
        assert_eq!(config.max_transforms, Configuration::default().max_transforms);
    }

    #[test]
    fn from_dict_accepts_properties_section() {
        let config =
            Configuration::from_dict(&json!({"properties": {"return_first": true}})).unwrap();
        assert!(config.return_first);
    }

    #[test]
    fn from_dict_rejects_unknown_keys_and_bad_values() {
        let err = Configuration::from_dict(&json!({"c": 2.0})).unwrap_err();
        assert!(err.is_config());

        let err = Configuration::from_dict(&json!({"filter_cutoff": 3.0})).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn from_file_reads_json_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "properties": {{"max_transforms": 3, "time_limit": 10}},
                "stock": {{"zinc": ["CCO"]}},
                "expansion": {{"uspto": {{"CCOC(C)=O": [{{"precursors": ["CCO", "CC(=O)O"], "prior": 0.9}}]}}}},
                "filter": {{"quick": {{"CCO.CC(=O)O>>CCOC(C)=O": 0.8}}}}
            }}"#
        )
        .unwrap();

        let config = Configuration::from_file(file.path()).unwrap();
        assert_eq!(config.max_transforms, 3);
        assert!((config.time_limit - 10.0).abs() < f64::EPSILON);

        let doc = ConfigFile::from_file(file.path()).unwrap();
        assert_eq!(doc.stock["zinc"], vec!["CCO".to_string()]);
        assert_eq!(doc.expansion["uspto"]["CCOC(C)=O"][0].precursors.len(), 2);
        assert_eq!(doc.filter["quick"].len(), 1);
    }

    #[test]
    fn from_file_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Configuration::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_config());
        assert!(format!("{err}").contains("absent.json"));
    }
}
