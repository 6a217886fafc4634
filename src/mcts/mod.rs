//! Reference Monte Carlo tree search.

mod state;
mod tree;

pub use state::MctsState;
pub use tree::{MctsTree, MctsTreeFactory};
