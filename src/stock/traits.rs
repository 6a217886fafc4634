//! Abstract stock contract.

use crate::chem::Molecule;
use crate::error::RetroResult;
use crate::selection::Selectable;

/// Storage trait for stock inventories.
///
/// The selection chooses which named inventories take part in membership
/// tests. The exclusion list removes individual compounds from every
/// inventory until it is reset.
pub trait Stock: Selectable {
    /// Returns true if `molecule` is in a selected inventory and not excluded.
    fn contains(&self, molecule: &Molecule) -> RetroResult<bool>;

    /// Exclude `molecule` from membership until the next reset.
    fn exclude(&self, molecule: &Molecule) -> RetroResult<()>;

    /// Clear the exclusion list.
    fn reset_exclusion_list(&self) -> RetroResult<()>;

    /// Currently excluded SMILES, sorted.
    fn exclusion_list(&self) -> RetroResult<Vec<String>>;
}
