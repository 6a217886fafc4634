//! In-memory stock backend.
//!
//! Thread-safe reference implementation of [`Stock`], intended for embedded
//! usage, tests and small curated inventories.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::RwLock;

use crate::chem::Molecule;
use crate::error::{RetroError, RetroResult, ValidationError};
use crate::selection::{ensure_known, Selectable, Selection};
use crate::stock::traits::Stock;

fn lock_err(context: &'static str) -> RetroError {
    RetroError::internal(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct StockState {
    inventories: BTreeMap<String, HashSet<String>>,
    selection: Selection,
    excluded: BTreeSet<String>,
}

/// Named SMILES inventories held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStock {
    state: RwLock<StockState>,
}

impl InMemoryStock {
    /// Create an empty stock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or replace) an inventory. The selection is unchanged.
    pub fn add_inventory<I, S>(&self, name: &str, smiles: I) -> RetroResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidSelection {
                reason: "inventory name cannot be blank".to_string(),
            }
            .into());
        }
        let mut entries = HashSet::new();
        for s in smiles {
            let mol = Molecule::from_smiles(s.as_ref())?;
            entries.insert(String::from(mol));
        }

        let mut state = self.state.write().map_err(|_| lock_err("stock.state"))?;
        state.inventories.insert(name.to_string(), entries);
        Ok(())
    }

    /// Select every loaded inventory, in name order.
    pub fn select_all(&self) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("stock.state"))?;
        state.selection = Selection::new(state.inventories.keys().cloned())?;
        Ok(())
    }

    /// Number of compounds in the named inventory.
    pub fn inventory_len(&self, name: &str) -> RetroResult<Option<usize>> {
        let state = self.state.read().map_err(|_| lock_err("stock.state"))?;
        Ok(state.inventories.get(name).map(HashSet::len))
    }
}

impl Selectable for InMemoryStock {
    fn select(&self, names: &Selection) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("stock.state"))?;
        ensure_known("stock", names, |n| state.inventories.contains_key(n))?;
        state.selection = names.clone();
        Ok(())
    }

    fn deselect(&self) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("stock.state"))?;
        state.selection = Selection::empty();
        Ok(())
    }

    fn selection(&self) -> RetroResult<Selection> {
        let state = self.state.read().map_err(|_| lock_err("stock.state"))?;
        Ok(state.selection.clone())
    }

    fn available(&self) -> RetroResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("stock.state"))?;
        Ok(state.inventories.keys().cloned().collect())
    }
}

impl Stock for InMemoryStock {
    fn contains(&self, molecule: &Molecule) -> RetroResult<bool> {
        let state = self.state.read().map_err(|_| lock_err("stock.state"))?;
        let smiles = molecule.smiles();
        if state.excluded.contains(smiles) {
            return Ok(false);
        }
        let found = state
            .selection
            .iter()
            .filter_map(|name| state.inventories.get(name))
            .any(|inventory| inventory.contains(smiles));
        Ok(found)
    }

    fn exclude(&self, molecule: &Molecule) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("stock.state"))?;
        state.excluded.insert(molecule.smiles().to_string());
        Ok(())
    }

    fn reset_exclusion_list(&self) -> RetroResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("stock.state"))?;
        state.excluded.clear();
        Ok(())
    }

    fn exclusion_list(&self) -> RetroResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("stock.state"))?;
        Ok(state.excluded.iter().cloned().collect())
    }
}
