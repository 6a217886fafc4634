//! Compound and reaction representations.
//!
//! Chemistry is an external concern: a [`Molecule`] is identified by its
//! SMILES string and only checked for a plausible alphabet and balanced
//! brackets. Equality and hashing are on that identifier.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const SMILES_PATTERN: &str = r"^[A-Za-z0-9@+\-\[\]()=#$%/\\.:*~]+$";

static SMILES_ALPHABET: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn smiles_alphabet() -> Result<&'static Regex, String> {
    SMILES_ALPHABET
        .get_or_init(|| Regex::new(SMILES_PATTERN))
        .as_ref()
        .map_err(|e| format!("invalid SMILES pattern: {e}"))
}

fn check_balanced(smiles: &str) -> Result<(), String> {
    let mut parens = 0i32;
    let mut in_bracket = false;
    for ch in smiles.chars() {
        match ch {
            '(' if !in_bracket => parens += 1,
            ')' if !in_bracket => {
                parens -= 1;
                if parens < 0 {
                    return Err("unbalanced parentheses".to_string());
                }
            }
            '[' => {
                if in_bracket {
                    return Err("nested atom brackets".to_string());
                }
                in_bracket = true;
            }
            ']' => {
                if !in_bracket {
                    return Err("unbalanced atom brackets".to_string());
                }
                in_bracket = false;
            }
            _ => {}
        }
    }
    if parens != 0 {
        return Err("unbalanced parentheses".to_string());
    }
    if in_bracket {
        return Err("unbalanced atom brackets".to_string());
    }
    Ok(())
}

/// A compound identified by its SMILES string.
///
/// # Examples
///
/// ```
/// use retrosearch::Molecule;
///
/// let ethanol = Molecule::from_smiles("CCO").unwrap();
/// assert_eq!(ethanol.smiles(), "CCO");
/// assert!(Molecule::from_smiles("C(C").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Molecule {
    smiles: String,
}

impl Molecule {
    /// Parses a molecule from SMILES.
    ///
    /// Surrounding whitespace is trimmed; the trimmed text becomes the identifier.
    pub fn from_smiles(smiles: &str) -> Result<Self, ValidationError> {
        let trimmed = smiles.trim();
        let invalid = |reason: &str| ValidationError::InvalidSmiles {
            smiles: smiles.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("SMILES cannot be empty"));
        }
        let alphabet = smiles_alphabet().map_err(|reason| invalid(&reason))?;
        if !alphabet.is_match(trimmed) {
            return Err(invalid("contains characters outside the SMILES alphabet"));
        }
        check_balanced(trimmed).map_err(|reason| invalid(&reason))?;

        Ok(Self {
            smiles: trimmed.to_string(),
        })
    }

    /// Returns the SMILES identifier.
    #[must_use]
    pub fn smiles(&self) -> &str {
        &self.smiles
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.smiles)
    }
}

impl TryFrom<String> for Molecule {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_smiles(&value)
    }
}

impl From<Molecule> for String {
    fn from(mol: Molecule) -> Self {
        mol.smiles
    }
}

/// A single retrosynthetic step: `product` is made from `precursors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// The molecule being disconnected.
    pub product: Molecule,
    /// Precursors, in the order the policy proposed them.
    pub precursors: Vec<Molecule>,
    /// Prior probability assigned by the proposing policy.
    pub prior: f64,
    /// Name of the policy that proposed this reaction.
    pub policy: String,
    /// Template identifier, if the policy is template based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Reaction {
    /// Creates a reaction, validating the prior and the precursor list.
    pub fn new(
        product: Molecule,
        precursors: Vec<Molecule>,
        prior: f64,
        policy: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&prior) {
            return Err(ValidationError::InvalidProbability { value: prior });
        }
        if precursors.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "precursors".to_string(),
                reason: format!("reaction for '{product}' has no precursors"),
            });
        }
        Ok(Self {
            product,
            precursors,
            prior,
            policy: policy.into(),
            template: None,
        })
    }

    /// Attaches a template identifier.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Reaction SMILES in forward notation, `precursors>>product`.
    #[must_use]
    pub fn smiles(&self) -> String {
        let precursors: Vec<&str> = self.precursors.iter().map(Molecule::smiles).collect();
        format!("{}>>{}", precursors.join("."), self.product.smiles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smiles_pattern_compiles() {
        let alphabet = smiles_alphabet().unwrap();
        assert!(alphabet.is_match("CC(=O)O"));
        assert!(!alphabet.is_match("CC O"));
    }

    #[test]
    fn molecule_trims_whitespace() {
        let mol = Molecule::from_smiles("  c1ccccc1O ").unwrap();
        assert_eq!(mol.smiles(), "c1ccccc1O");
        assert_eq!(mol.to_string(), "c1ccccc1O");
    }

    #[test]
    fn molecule_accepts_bracket_atoms_and_stereo() {
        assert!(Molecule::from_smiles("C[C@H](N)C(=O)O").is_ok());
        assert!(Molecule::from_smiles("[Na+].[Cl-]").is_ok());
        assert!(Molecule::from_smiles("F/C=C/F").is_ok());
    }

    #[test]
    fn molecule_rejects_malformed_input() {
        assert!(Molecule::from_smiles("").is_err());
        assert!(Molecule::from_smiles("   ").is_err());
        assert!(Molecule::from_smiles("CC O").is_err());
        assert!(Molecule::from_smiles("C(C").is_err());
        assert!(Molecule::from_smiles("C)C(").is_err());
        assert!(Molecule::from_smiles("[Na").is_err());
        assert!(Molecule::from_smiles("[[Na]]").is_err());
    }

    #[test]
    fn molecule_serde_is_transparent_and_validated() {
        let mol = Molecule::from_smiles("CCO").unwrap();
        assert_eq!(serde_json::to_string(&mol).unwrap(), "\"CCO\"");
        let back: Molecule = serde_json::from_str("\"CCO\"").unwrap();
        assert_eq!(back, mol);
        assert!(serde_json::from_str::<Molecule>("\"C(\"").is_err());
    }

    #[test]
    fn reaction_smiles_is_forward_notation() {
        let rxn = Reaction::new(
            Molecule::from_smiles("CCOC(C)=O").unwrap(),
            vec![
                Molecule::from_smiles("CCO").unwrap(),
                Molecule::from_smiles("CC(=O)O").unwrap(),
            ],
            0.7,
            "uspto",
        )
        .unwrap()
        .with_template("esterification");
        assert_eq!(rxn.smiles(), "CCO.CC(=O)O>>CCOC(C)=O");
        assert_eq!(rxn.template.as_deref(), Some("esterification"));
    }

    #[test]
    fn reaction_rejects_bad_prior_and_empty_precursors() {
        let product = Molecule::from_smiles("CCO").unwrap();
        let precursor = Molecule::from_smiles("C").unwrap();
        assert!(Reaction::new(product.clone(), vec![precursor], 1.5, "p").is_err());
        assert!(Reaction::new(product, Vec::new(), 0.5, "p").is_err());
    }
}
