//! Search states of the reference tree.

use crate::chem::{Molecule, Reaction};
use crate::error::RetroResult;
use crate::stock::Stock;

/// Weight of the in-stock fraction in the state score; the rest rewards short routes.
const STOCK_WEIGHT: f64 = 0.95;

fn transform_penalty(transforms: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let x = transforms as f64;
    1.0 / (1.0 + (x - 3.0).exp())
}

/// The set of molecules still to be made, plus derived flags.
#[derive(Debug, Clone, PartialEq)]
pub struct MctsState {
    molecules: Vec<Molecule>,
    in_stock: Vec<bool>,
    transforms: usize,
    score: f64,
    is_solved: bool,
    is_terminal: bool,
}

impl MctsState {
    /// Build a state, testing every molecule against the stock.
    ///
    /// Duplicate molecules are collapsed (first occurrence wins).
    pub fn new(
        molecules: Vec<Molecule>,
        transforms: usize,
        stock: &dyn Stock,
        max_transforms: usize,
    ) -> RetroResult<Self> {
        let mut unique: Vec<Molecule> = Vec::with_capacity(molecules.len());
        for mol in molecules {
            if !unique.contains(&mol) {
                unique.push(mol);
            }
        }

        let in_stock = unique
            .iter()
            .map(|m| stock.contains(m))
            .collect::<RetroResult<Vec<bool>>>()?;

        let in_stock_count = in_stock.iter().filter(|s| **s).count();
        #[allow(clippy::cast_precision_loss)]
        let fraction = if unique.is_empty() {
            0.0
        } else {
            in_stock_count as f64 / unique.len() as f64
        };
        let is_solved = !unique.is_empty() && in_stock_count == unique.len();

        Ok(Self {
            score: STOCK_WEIGHT * fraction + (1.0 - STOCK_WEIGHT) * transform_penalty(transforms),
            is_terminal: is_solved || transforms >= max_transforms,
            molecules: unique,
            in_stock,
            transforms,
            is_solved,
        })
    }

    /// The state reached by applying `reaction` to this one.
    ///
    /// Returns `None` when the reaction's product is not an unsolved molecule
    /// of this state.
    pub fn apply(
        &self,
        reaction: &Reaction,
        stock: &dyn Stock,
        max_transforms: usize,
    ) -> RetroResult<Option<Self>> {
        let Some(pos) = self
            .molecules
            .iter()
            .zip(&self.in_stock)
            .position(|(m, in_stock)| !in_stock && *m == reaction.product)
        else {
            return Ok(None);
        };

        let mut molecules = Vec::with_capacity(self.molecules.len() + reaction.precursors.len());
        molecules.extend_from_slice(&self.molecules[..pos]);
        molecules.extend(reaction.precursors.iter().cloned());
        molecules.extend_from_slice(&self.molecules[pos + 1..]);

        Self::new(molecules, self.transforms + 1, stock, max_transforms).map(Some)
    }

    /// The first molecule not in stock, which is the next to disconnect.
    #[must_use]
    pub fn expandable(&self) -> Option<&Molecule> {
        self.molecules
            .iter()
            .zip(&self.in_stock)
            .find(|(_, in_stock)| !**in_stock)
            .map(|(m, _)| m)
    }

    /// Molecules still to be made.
    #[must_use]
    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    /// Stock flag for each molecule.
    #[must_use]
    pub fn in_stock(&self) -> &[bool] {
        &self.in_stock
    }

    /// Reactions applied to reach this state.
    #[must_use]
    pub const fn transforms(&self) -> usize {
        self.transforms
    }

    /// State score in `[0, 1]`.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// True when every molecule is in stock.
    #[must_use]
    pub const fn is_solved(&self) -> bool {
        self.is_solved
    }

    /// True when the state cannot be expanded further.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.is_terminal
    }
}
