//! Run state of one finder.
//!
//! The tree and everything derived from it live in a single phase value, so
//! an analysis can never outlive the tree it was built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{RouteCollection, TreeAnalysis};
use crate::tree::SearchTree;

/// Why the last search loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchExit {
    /// The time budget ran out.
    TimeLimit,
    /// The iteration budget ran out.
    IterationLimit,
    /// `return_first` was set and the root became solved.
    FirstSolution,
}

/// Figures recorded by the last search loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Completed iterations.
    pub iterations: usize,
    /// True when the loop stopped at the first solved tree.
    pub returned_first: bool,
    /// Wall-clock seconds spent in the loop.
    pub time: f64,
    /// When the loop started.
    pub started_at: Option<DateTime<Utc>>,
    /// `None` while a loop is running or if it failed.
    pub exit: Option<SearchExit>,
}

impl Default for SearchStats {
    fn default() -> Self {
        Self {
            iterations: 0,
            returned_first: false,
            time: 0.0,
            started_at: None,
            exit: None,
        }
    }
}

impl SearchStats {
    /// Fresh stats for a loop starting now.
    #[must_use]
    pub fn started() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// Where a finder is between preparation and results.
#[derive(Default)]
pub enum RunPhase {
    /// No tree.
    #[default]
    Empty,
    /// A tree exists; nothing has been derived from it.
    Ready {
        /// The prepared tree.
        tree: Box<dyn SearchTree>,
    },
    /// Analysis and routes built from `tree`.
    Analyzed {
        /// The searched tree.
        tree: Box<dyn SearchTree>,
        /// Ranked candidates of `tree`.
        analysis: TreeAnalysis,
        /// Routes kept from `analysis`.
        routes: RouteCollection,
    },
}

impl std::fmt::Debug for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Ready { .. } => f.write_str("Ready"),
            Self::Analyzed { routes, .. } => f
                .debug_struct("Analyzed")
                .field("routes", &routes.len())
                .finish_non_exhaustive(),
        }
    }
}

/// Tree, derived results and stats of a finder.
#[derive(Debug, Default)]
pub struct SearchRunState {
    phase: RunPhase,
    stats: SearchStats,
}

impl SearchRunState {
    /// An empty run state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the tree and anything derived from it.
    pub fn clear(&mut self) {
        self.phase = RunPhase::Empty;
    }

    /// Replace the tree, dropping any analysis and routes.
    pub fn install_tree(&mut self, tree: Box<dyn SearchTree>) {
        self.phase = RunPhase::Ready { tree };
    }

    /// Reset the stats and hand out the tree for searching.
    ///
    /// Analysis and routes are dropped because the tree is about to change.
    /// Returns `None` when no tree exists.
    pub fn begin_search(&mut self) -> Option<&mut dyn SearchTree> {
        self.phase = match std::mem::take(&mut self.phase) {
            RunPhase::Analyzed { tree, .. } => RunPhase::Ready { tree },
            other => other,
        };
        match &mut self.phase {
            RunPhase::Ready { tree } => {
                self.stats = SearchStats::started();
                Some(tree.as_mut())
            }
            _ => None,
        }
    }

    /// Attach results built from the current tree.
    ///
    /// Does nothing when no tree exists.
    pub fn attach_results(&mut self, analysis: TreeAnalysis, routes: RouteCollection) {
        self.phase = match std::mem::take(&mut self.phase) {
            RunPhase::Ready { tree } | RunPhase::Analyzed { tree, .. } => RunPhase::Analyzed {
                tree,
                analysis,
                routes,
            },
            RunPhase::Empty => RunPhase::Empty,
        };
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    /// Current tree, if any.
    #[must_use]
    pub fn tree(&self) -> Option<&dyn SearchTree> {
        match &self.phase {
            RunPhase::Empty => None,
            RunPhase::Ready { tree } | RunPhase::Analyzed { tree, .. } => Some(tree.as_ref()),
        }
    }

    /// True when a tree is installed.
    #[must_use]
    pub fn has_tree(&self) -> bool {
        self.tree().is_some()
    }

    /// Analysis of the current tree, once results are attached.
    #[must_use]
    pub fn analysis(&self) -> Option<&TreeAnalysis> {
        match &self.phase {
            RunPhase::Analyzed { analysis, .. } => Some(analysis),
            _ => None,
        }
    }

    /// Routes of the current tree, once results are attached.
    #[must_use]
    pub fn routes(&self) -> Option<&RouteCollection> {
        match &self.phase {
            RunPhase::Analyzed { routes, .. } => Some(routes),
            _ => None,
        }
    }

    /// Mutable access for scoring routes in place.
    pub fn routes_mut(&mut self) -> Option<&mut RouteCollection> {
        match &mut self.phase {
            RunPhase::Analyzed { routes, .. } => Some(routes),
            _ => None,
        }
    }

    /// Figures from the last loop.
    #[must_use]
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Mutable loop figures.
    pub fn stats_mut(&mut self) -> &mut SearchStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::FixedTree;
    use crate::scoring::StateScorer;

    fn tree() -> Box<dyn SearchTree> {
        Box::new(FixedTree::new(&[(&[("CCO", true)], 0.97)]))
    }

    fn analyzed() -> SearchRunState {
        let mut state = SearchRunState::new();
        state.install_tree(tree());
        let analysis = TreeAnalysis::new(state.tree().unwrap(), &StateScorer);
        let routes = RouteCollection::from_analysis(&analysis, 5);
        state.attach_results(analysis, routes);
        state
    }

    #[test]
    fn empty_state_has_nothing() {
        let mut state = SearchRunState::new();
        assert!(!state.has_tree());
        assert!(state.analysis().is_none());
        assert!(state.begin_search().is_none());
    }

    #[test]
    fn attach_results_moves_to_analyzed() {
        let state = analyzed();
        assert!(matches!(state.phase(), RunPhase::Analyzed { .. }));
        assert_eq!(state.routes().unwrap().len(), 1);
    }

    #[test]
    fn begin_search_drops_results_but_keeps_tree() {
        let mut state = analyzed();
        assert!(state.begin_search().is_some());
        assert!(state.has_tree());
        assert!(state.analysis().is_none());
        assert!(state.routes().is_none());
        assert!(state.stats().started_at.is_some());
    }

    #[test]
    fn install_tree_drops_results() {
        let mut state = analyzed();
        state.install_tree(tree());
        assert!(matches!(state.phase(), RunPhase::Ready { .. }));
    }

    #[test]
    fn clear_drops_everything() {
        let mut state = analyzed();
        state.clear();
        assert!(matches!(state.phase(), RunPhase::Empty));
    }

    #[test]
    fn results_without_tree_are_ignored() {
        let mut state = SearchRunState::new();
        let analysis = TreeAnalysis::new(tree().as_ref(), &StateScorer);
        let routes = RouteCollection::from_analysis(&analysis, 1);
        state.attach_results(analysis, routes);
        assert!(state.analysis().is_none());
    }
}
