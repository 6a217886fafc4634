//! UCT search tree over table-driven policies.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Each node keeps one slot
//! per candidate reaction; a slot only becomes a child node the first time
//! it is chosen, and is rejected if the filter vetoes it.

use crate::chem::{Molecule, Reaction};
use crate::config::Configuration;
use crate::error::RetroResult;
use crate::mcts::state::MctsState;
use crate::policy::apply_cutoffs;
use crate::route::{Route, RouteLeaf};
use crate::tree::{NodeId, NodeStatus, SearchContext, SearchTree, TreeFactory};

#[derive(Debug, Clone)]
struct ChildSlot {
    reaction: Reaction,
    value: f64,
    visits: u32,
    node: Option<NodeId>,
    rejected: bool,
}

#[derive(Debug, Clone)]
struct MctsNode {
    state: MctsState,
    /// Parent node and the slot index this node fills in it.
    parent: Option<(NodeId, usize)>,
    reaction: Option<Reaction>,
    expanded: bool,
    visits: u32,
    slots: Vec<ChildSlot>,
}

impl MctsNode {
    fn new(state: MctsState, parent: Option<(NodeId, usize)>, reaction: Option<Reaction>) -> Self {
        Self {
            state,
            parent,
            reaction,
            expanded: false,
            visits: 0,
            slots: Vec::new(),
        }
    }
}

/// Reference [`SearchTree`] using UCT child selection.
pub struct MctsTree {
    nodes: Vec<MctsNode>,
    config: Configuration,
    context: SearchContext,
}

impl std::fmt::Debug for MctsTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MctsTree")
            .field("nodes", &self.nodes.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MctsTree {
    /// Create a tree holding only the root state.
    pub fn new(
        root: &Molecule,
        config: &Configuration,
        context: &SearchContext,
    ) -> RetroResult<Self> {
        let state = MctsState::new(
            vec![root.clone()],
            0,
            context.stock.as_ref(),
            config.max_transforms,
        )?;
        Ok(Self {
            nodes: vec![MctsNode::new(state, None, None)],
            config: config.clone(),
            context: context.clone(),
        })
    }

    /// State of `node`.
    ///
    /// # Panics
    /// Panics if `node` was not issued by this tree.
    #[must_use]
    pub fn state(&self, node: NodeId) -> &MctsState {
        &self.nodes[node.index()].state
    }

    /// Number of visits recorded at `node`.
    #[must_use]
    pub fn visits(&self, node: NodeId) -> u32 {
        self.nodes[node.index()].visits
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Best non-rejected slot of `node` by UCT.
    fn best_slot(&self, node: NodeId) -> Option<usize> {
        let slots = &self.nodes[node.index()].slots;
        let total: u32 = slots.iter().map(|s| s.visits).sum();
        let log_total = f64::from(total.max(1)).ln();

        let mut best: Option<(usize, f64)> = None;
        for (idx, slot) in slots.iter().enumerate() {
            if slot.rejected {
                continue;
            }
            let visits = f64::from(slot.visits.max(1));
            let uct = slot.value / visits + self.config.c * (2.0 * log_total / visits).sqrt();
            // Strict comparison keeps the earliest slot on ties.
            if best.map_or(true, |(_, score)| uct > score) {
                best = Some((idx, uct));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Turn a slot into a child node, or return `None` if the reaction is vetoed.
    fn instantiate(&mut self, node: NodeId, slot_idx: usize) -> RetroResult<Option<NodeId>> {
        let reaction = self.nodes[node.index()].slots[slot_idx].reaction.clone();

        if !self.context.filter_policy.selection()?.is_empty() {
            let feasibility = self.context.filter_policy.feasibility(&reaction)?;
            if feasibility < self.config.filter_cutoff {
                tracing::trace!(
                    reaction = %reaction.smiles(),
                    feasibility,
                    "filter rejected reaction"
                );
                return Ok(None);
            }
        }

        let Some(state) = self.nodes[node.index()].state.apply(
            &reaction,
            self.context.stock.as_ref(),
            self.config.max_transforms,
        )?
        else {
            return Ok(None);
        };

        let child = NodeId::new(self.nodes.len());
        self.nodes
            .push(MctsNode::new(state, Some((node, slot_idx)), Some(reaction)));
        self.nodes[node.index()].slots[slot_idx].node = Some(child);
        Ok(Some(child))
    }
}

impl SearchTree for MctsTree {
    fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    fn select_leaf(&mut self) -> RetroResult<NodeId> {
        let mut current = self.root();
        while self.nodes[current.index()].expanded && !self.is_terminal(current) {
            match self.promising_child(current)? {
                Some(child) => current = child,
                None => break,
            }
        }
        Ok(current)
    }

    fn expand(&mut self, node: NodeId) -> RetroResult<()> {
        let entry = &self.nodes[node.index()];
        if entry.expanded {
            return Ok(());
        }
        let Some(molecule) = entry.state.expandable().filter(|_| !entry.state.is_terminal()) else {
            self.nodes[node.index()].expanded = true;
            return Ok(());
        };

        let actions = apply_cutoffs(
            self.context.expansion_policy.actions(molecule)?,
            self.config.cutoff_cumulative,
            self.config.cutoff_number,
        );
        tracing::trace!(node = %node, molecule = %molecule, actions = actions.len(), "expanded node");

        let entry = &mut self.nodes[node.index()];
        entry.slots = actions
            .into_iter()
            .map(|reaction| ChildSlot {
                value: reaction.prior,
                visits: 1,
                reaction,
                node: None,
                rejected: false,
            })
            .collect();
        entry.expanded = true;
        Ok(())
    }

    fn is_terminal(&self, node: NodeId) -> bool {
        let entry = &self.nodes[node.index()];
        entry.state.is_terminal() || (entry.expanded && entry.slots.iter().all(|s| s.rejected))
    }

    fn promising_child(&mut self, node: NodeId) -> RetroResult<Option<NodeId>> {
        while let Some(slot_idx) = self.best_slot(node) {
            if let Some(child) = self.nodes[node.index()].slots[slot_idx].node {
                return Ok(Some(child));
            }
            match self.instantiate(node, slot_idx)? {
                Some(child) => return Ok(Some(child)),
                None => self.nodes[node.index()].slots[slot_idx].rejected = true,
            }
        }
        Ok(None)
    }

    fn backpropagate(&mut self, node: NodeId, score: f64) {
        let mut current = Some(node);
        while let Some(id) = current {
            let entry = &mut self.nodes[id.index()];
            entry.visits += 1;
            let parent = entry.parent;
            current = None;
            if let Some((parent, slot_idx)) = parent {
                let slot = &mut self.nodes[parent.index()].slots[slot_idx];
                slot.visits += 1;
                slot.value += score;
                current = Some(parent);
            }
        }
    }

    fn status(&self, node: NodeId) -> NodeStatus {
        let state = &self.nodes[node.index()].state;
        NodeStatus {
            score: state.score(),
            is_solved: state.is_solved(),
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.index()]
            .slots
            .iter()
            .filter_map(|s| s.node)
            .collect()
    }

    fn nodes(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId::new).collect()
    }

    fn route(&self, node: NodeId) -> Route {
        let mut reactions = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let entry = &self.nodes[id.index()];
            if let Some(reaction) = &entry.reaction {
                reactions.push(reaction.clone());
            }
            current = entry.parent.map(|(parent, _)| parent);
        }
        reactions.reverse();

        let state = &self.nodes[node.index()].state;
        let target = self.nodes[0].state.molecules()[0].clone();
        Route {
            target,
            reactions,
            leaves: state
                .molecules()
                .iter()
                .zip(state.in_stock())
                .map(|(m, in_stock)| RouteLeaf {
                    molecule: m.clone(),
                    in_stock: *in_stock,
                })
                .collect(),
            state_score: state.score(),
            is_solved: state.is_solved(),
        }
    }
}

/// Builds [`MctsTree`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct MctsTreeFactory;

impl TreeFactory for MctsTreeFactory {
    fn create_tree(
        &self,
        root: &Molecule,
        config: &Configuration,
        context: &SearchContext,
    ) -> RetroResult<Box<dyn SearchTree>> {
        Ok(Box::new(MctsTree::new(root, config, context)?))
    }
}
