//! Expansion and filter policies.
//!
//! An expansion policy proposes retrosynthetic reactions for a molecule; a
//! filter policy scores how plausible a proposed reaction is. Both are
//! selected by name, and several expansion policies may be active at once.

mod memory;
mod traits;

pub use memory::{TableFilterPolicy, TemplateEntry, TemplateExpansionPolicy};
pub use traits::{apply_cutoffs, ExpansionPolicy, FilterPolicy};
