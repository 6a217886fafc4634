//! Table-driven policy backends.
//!
//! These stand in for model-backed policies: an expansion table maps a
//! product SMILES to its known disconnections, and a filter table maps a
//! reaction SMILES to a feasibility score.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::chem::{Molecule, Reaction};
use crate::error::{RetroError, RetroResult, ValidationError};
use crate::policy::traits::{ExpansionPolicy, FilterPolicy};
use crate::selection::{ensure_known, Selectable, Selection};

fn lock_err(context: &'static str) -> RetroError {
    RetroError::internal(format!("poisoned lock: {context}"))
}

fn check_name(kind: &str, name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidSelection {
            reason: format!("{kind} name cannot be blank"),
        });
    }
    Ok(name.to_string())
}

/// One known disconnection of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// Precursors of the product.
    pub precursors: Vec<Molecule>,
    /// Prior probability of the disconnection.
    pub prior: f64,
    /// Template identifier, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

type TemplateTable = HashMap<String, Vec<TemplateEntry>>;

#[derive(Debug, Default)]
struct ExpansionState {
    tables: BTreeMap<String, TemplateTable>,
    selection: Selection,
}

/// Expansion policy backed by named lookup tables.
#[derive(Debug, Default)]
pub struct TemplateExpansionPolicy {
    state: RwLock<ExpansionState>,
}

impl TemplateExpansionPolicy {
    /// Create a policy with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or replace) a named table keyed by product SMILES.
    pub fn add_policy(
        &self,
        name: &str,
        table: impl IntoIterator<Item = (Molecule, Vec<TemplateEntry>)>,
    ) -> RetroResult<()> {
        let name = check_name("expansion policy", name)?;
        let mut converted = TemplateTable::new();
        for (product, entries) in table {
            for entry in &entries {
                // Same checks as a constructed reaction.
                Reaction::new(product.clone(), entry.precursors.clone(), entry.prior, &name)?;
            }
            converted.entry(product.into()).or_default().extend(entries);
        }

        let mut state = self.state.write().map_err(|_| lock_err("expansion.state"))?;
        state.tables.insert(name, converted);
        Ok(())
    }

    /// Add a single disconnection to a table, creating the table if needed.
    pub fn add_action(
        &self,
        name: &str,
        product: &Molecule,
        entry: TemplateEntry,
    ) -> RetroResult<()> {
        let name = check_name("expansion policy", name)?;
        Reaction::new(product.clone(), entry.precursors.clone(), entry.prior, &name)?;

        let mut state = self.state.write().map_err(|_| lock_err("expansion.state"))?;
        state
            .tables
            .entry(name)
            .or_default()
            .entry(product.smiles().to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    /// Select only the alphabetically first table, if any.
    pub fn select_first_by_name(&self) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("expansion.state"))?;
        state.selection = match state.tables.keys().next() {
            Some(first) => Selection::single(first.clone())?,
            None => Selection::empty(),
        };
        Ok(())
    }
}

impl Selectable for TemplateExpansionPolicy {
    fn select(&self, names: &Selection) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("expansion.state"))?;
        ensure_known("expansion policy", names, |n| state.tables.contains_key(n))?;
        state.selection = names.clone();
        Ok(())
    }

    fn deselect(&self) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("expansion.state"))?;
        state.selection = Selection::empty();
        Ok(())
    }

    fn selection(&self) -> RetroResult<Selection> {
        let state = self.state.read().map_err(|_| lock_err("expansion.state"))?;
        Ok(state.selection.clone())
    }

    fn available(&self) -> RetroResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("expansion.state"))?;
        Ok(state.tables.keys().cloned().collect())
    }
}

impl ExpansionPolicy for TemplateExpansionPolicy {
    fn actions(&self, molecule: &Molecule) -> RetroResult<Vec<Reaction>> {
        let state = self.state.read().map_err(|_| lock_err("expansion.state"))?;
        let mut actions = Vec::new();
        for name in state.selection.iter() {
            let Some(entries) = state
                .tables
                .get(name)
                .and_then(|table| table.get(molecule.smiles()))
            else {
                continue;
            };
            for entry in entries {
                let mut reaction =
                    Reaction::new(molecule.clone(), entry.precursors.clone(), entry.prior, name)?;
                reaction.template.clone_from(&entry.template);
                actions.push(reaction);
            }
        }
        Ok(actions)
    }
}

#[derive(Debug, Default)]
struct FilterState {
    tables: BTreeMap<String, HashMap<String, f64>>,
    selection: Selection,
}

/// Filter policy backed by named feasibility tables.
///
/// Reactions missing from a table are considered feasible (1.0).
#[derive(Debug, Default)]
pub struct TableFilterPolicy {
    state: RwLock<FilterState>,
}

impl TableFilterPolicy {
    /// Create a filter with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or replace) a named table keyed by reaction SMILES.
    pub fn add_filter(
        &self,
        name: &str,
        table: impl IntoIterator<Item = (String, f64)>,
    ) -> RetroResult<()> {
        let name = check_name("filter policy", name)?;
        let mut converted = HashMap::new();
        for (reaction_smiles, feasibility) in table {
            if !(0.0..=1.0).contains(&feasibility) {
                return Err(ValidationError::InvalidProbability { value: feasibility }.into());
            }
            converted.insert(reaction_smiles, feasibility);
        }

        let mut state = self.state.write().map_err(|_| lock_err("filter.state"))?;
        state.tables.insert(name, converted);
        Ok(())
    }

    /// Select every loaded table, in name order.
    pub fn select_all(&self) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("filter.state"))?;
        state.selection = Selection::new(state.tables.keys().cloned())?;
        Ok(())
    }
}

impl Selectable for TableFilterPolicy {
    fn select(&self, names: &Selection) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("filter.state"))?;
        ensure_known("filter policy", names, |n| state.tables.contains_key(n))?;
        state.selection = names.clone();
        Ok(())
    }

    fn deselect(&self) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("filter.state"))?;
        state.selection = Selection::empty();
        Ok(())
    }

    fn selection(&self) -> RetroResult<Selection> {
        let state = self.state.read().map_err(|_| lock_err("filter.state"))?;
        Ok(state.selection.clone())
    }

    fn available(&self) -> RetroResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("filter.state"))?;
        Ok(state.tables.keys().cloned().collect())
    }
}

impl FilterPolicy for TableFilterPolicy {
    fn feasibility(&self, reaction: &Reaction) -> RetroResult<f64> {
        let state = self.state.read().map_err(|_| lock_err("filter.state"))?;
        let smiles = reaction.smiles();
        Ok(state
            .selection
            .iter()
            .filter_map(|name| state.tables.get(name))
            .map(|table| table.get(&smiles).copied().unwrap_or(1.0))
            .fold(1.0, f64::min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mol(s: &str) -> Molecule {
        Molecule::from_smiles(s).unwrap()
    }

    fn entry(precursors: &[&str], prior: f64) -> TemplateEntry {
        TemplateEntry {
            precursors: precursors.iter().map(|s| mol(s)).collect(),
            prior,
            template: None,
        }
    }

    #[test]
    fn actions_follow_selection_order() {
        let policy = TemplateExpansionPolicy::new();
        let product = mol("CCOC(C)=O");
        policy
            .add_action("uspto", &product, entry(&["CCO", "CC(=O)O"], 0.8))
            .unwrap();
        policy
            .add_action("ringbreaker", &product, entry(&["CCOC(=O)Cl", "C"], 0.1))
            .unwrap();

        assert!(policy.actions(&product).unwrap().is_empty());

        policy
            .select(&Selection::new(["ringbreaker", "uspto"]).unwrap())
            .unwrap();
        let actions = policy.actions(&product).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].policy, "ringbreaker");
        assert_eq!(actions[1].policy, "uspto");
        assert_eq!(actions[1].smiles(), "CCO.CC(=O)O>>CCOC(C)=O");
    }

    #[test]
    fn select_first_by_name_ignores_load_order() {
        let policy = TemplateExpansionPolicy::new();
        policy.add_policy("b", Vec::new()).unwrap();
        policy.add_policy("a", Vec::new()).unwrap();
        policy.select_first_by_name().unwrap();
        assert_eq!(policy.selection().unwrap().as_slice(), &["a"]);
    }

    #[test]
    fn unknown_policy_selection_fails() {
        let policy = TemplateExpansionPolicy::new();
        assert!(policy.select(&Selection::single("nope").unwrap()).is_err());
    }

    #[test]
    fn add_policy_rejects_invalid_prior() {
        let policy = TemplateExpansionPolicy::new();
        let table = vec![(mol("CCO"), vec![entry(&["C"], 2.0)])];
        assert!(policy.add_policy("bad", table).is_err());
        assert!(policy.available().unwrap().is_empty());
    }

    #[test]
    fn filter_takes_minimum_over_selected_tables() {
        let reaction = Reaction::new(mol("CCO"), vec![mol("C"), mol("CO")], 0.5, "p").unwrap();
        let filter = TableFilterPolicy::new();
        filter
            .add_filter("strict", [(reaction.smiles(), 0.02)])
            .unwrap();
        filter.add_filter("lenient", [(reaction.smiles(), 0.9)]).unwrap();

        assert!((filter.feasibility(&reaction).unwrap() - 1.0).abs() < f64::EPSILON);

        filter.select(&Selection::single("lenient").unwrap()).unwrap();
        assert!((filter.feasibility(&reaction).unwrap() - 0.9).abs() < f64::EPSILON);

        filter.select_all().unwrap();
        assert!((filter.feasibility(&reaction).unwrap() - 0.02).abs() < f64::EPSILON);

        filter.deselect().unwrap();
        assert!(filter.selection().unwrap().is_empty());
    }

    #[test]
    fn filter_rejects_out_of_range_feasibility() {
        let filter = TableFilterPolicy::new();
        assert!(filter.add_filter("bad", [("C>>CC".to_string(), -0.1)]).is_err());
    }
}
