//! Search tree contract.
//!
//! The loop controller drives a [`SearchTree`] without knowing how it
//! selects, expands or scores nodes. A [`TreeFactory`] builds a fresh tree
//! for every prepared search.
//!
//! | Operation | Used by |
//! |-----------|---------|
//! | `select_leaf`, `expand`, `is_terminal`, `promising_child`, `backpropagate`, `status` | search loop |
//! | `nodes`, `children`, `route` | results builder |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chem::Molecule;
use crate::config::Configuration;
use crate::error::RetroResult;
use crate::policy::{ExpansionPolicy, FilterPolicy};
use crate::route::Route;
use crate::stock::Stock;

/// Index of a node inside one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Wraps an arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the loop needs to know about a node after descending to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStatus {
    /// Score to backpropagate from this node.
    pub score: f64,
    /// True when every molecule of the node's state is in stock.
    pub is_solved: bool,
}

/// A tree searched by the loop controller.
///
/// Node ids are only valid for the tree that issued them; implementations
/// may panic when handed a foreign id.
pub trait SearchTree: Send {
    /// The root node.
    fn root(&self) -> NodeId;

    /// Walk from the root to the node to expand next.
    fn select_leaf(&mut self) -> RetroResult<NodeId>;

    /// Expand a node. Expanding an already expanded or terminal node is a no-op.
    fn expand(&mut self, node: NodeId) -> RetroResult<()>;

    /// True when no further expansion of `node` is possible or useful.
    fn is_terminal(&self, node: NodeId) -> bool;

    /// The most promising child of `node`, or `None` if no viable child exists.
    fn promising_child(&mut self, node: NodeId) -> RetroResult<Option<NodeId>>;

    /// Propagate `score` from `node` to the root.
    fn backpropagate(&mut self, node: NodeId, score: f64);

    /// Score and solved flag of `node`.
    fn status(&self, node: NodeId) -> NodeStatus;

    /// Instantiated children of `node`.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Every node, in creation order.
    fn nodes(&self) -> Vec<NodeId>;

    /// The route from the root to `node`.
    fn route(&self, node: NodeId) -> Route;
}

/// Collaborators a tree may consult while it grows.
#[derive(Clone)]
pub struct SearchContext {
    /// Purchasable compounds.
    pub stock: Arc<dyn Stock>,
    /// Proposes reactions.
    pub expansion_policy: Arc<dyn ExpansionPolicy>,
    /// Rejects infeasible reactions.
    pub filter_policy: Arc<dyn FilterPolicy>,
}

/// Builds a tree rooted at a target.
pub trait TreeFactory: Send + Sync {
    /// Create a fresh tree for `root` searched under `config`.
    fn create_tree(
        &self,
        root: &Molecule,
        config: &Configuration,
        context: &SearchContext,
    ) -> RetroResult<Box<dyn SearchTree>>;
}
