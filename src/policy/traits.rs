//! Abstract policy contracts.

use crate::chem::{Molecule, Reaction};
use crate::error::RetroResult;
use crate::selection::Selectable;

/// Proposes candidate reactions for a molecule.
pub trait ExpansionPolicy: Selectable {
    /// Candidate reactions from every selected policy, in selection order.
    ///
    /// Returns an empty list when nothing applies; cutoffs are applied by the caller.
    fn actions(&self, molecule: &Molecule) -> RetroResult<Vec<Reaction>>;
}

/// Scores the feasibility of a proposed reaction.
pub trait FilterPolicy: Selectable {
    /// Feasibility in `[0.0, 1.0]`; 1.0 when no filter is selected.
    fn feasibility(&self, reaction: &Reaction) -> RetroResult<f64>;
}

/// Keep the most probable reactions.
///
/// Reactions are ordered by descending prior (ties keep their input order)
/// and kept until the cumulative prior reaches `cutoff_cumulative`, the
/// reaction that crosses the threshold included. At most `cutoff_number`
/// reactions are kept.
#[must_use]
pub fn apply_cutoffs(
    mut actions: Vec<Reaction>,
    cutoff_cumulative: f64,
    cutoff_number: usize,
) -> Vec<Reaction> {
    actions.sort_by(|a, b| b.prior.total_cmp(&a.prior));

    let mut cumulative = 0.0;
    let mut keep = 0;
    for action in &actions {
        if keep >= cutoff_number || cumulative >= cutoff_cumulative {
            break;
        }
        cumulative += action.prior;
        keep += 1;
    }
    actions.truncate(keep);
    actions
}
