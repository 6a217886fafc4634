//! Post-processing of a finished search tree.
//!
//! [`TreeAnalysis`] ranks the tree's candidate routes with one scorer and
//! summarises the tree. [`RouteCollection`] keeps the top of that ranking
//! for serialization.

mod collection;

use std::collections::HashSet;

use serde_json::{json, Map, Value};

pub use collection::RouteCollection;

use crate::route::Route;
use crate::scoring::Scorer;
use crate::tree::{NodeId, SearchTree};

/// A route candidate with its rank score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRoute {
    /// Node the route ends at.
    pub node: NodeId,
    /// The route itself.
    pub route: Route,
    /// Score under the ranking scorer.
    pub score: f64,
}

/// Ranked routes and summary figures of one tree.
///
/// The analysis owns everything it reports; it does not borrow the tree.
#[derive(Debug, Clone)]
pub struct TreeAnalysis {
    scorer: String,
    ranked: Vec<RankedRoute>,
    number_of_nodes: usize,
    max_transforms: usize,
    max_children: usize,
    number_of_solved_routes: usize,
}

impl TreeAnalysis {
    /// Rank the routes of `tree` by `scorer`.
    ///
    /// Solved nodes are the candidates when any exist; otherwise every node
    /// is. Routes sharing a hash key are kept once, and ties keep node
    /// creation order.
    pub fn new(tree: &dyn SearchTree, scorer: &dyn Scorer) -> Self {
        let nodes = tree.nodes();

        let mut max_transforms = 0;
        let mut max_children = 0;
        let mut solved = Vec::new();
        let mut unsolved = Vec::new();
        for &node in &nodes {
            let route = tree.route(node);
            max_transforms = max_transforms.max(route.number_of_reactions());
            max_children = max_children.max(tree.children(node).len());
            if route.is_solved {
                solved.push((node, route));
            } else {
                unsolved.push((node, route));
            }
        }

        let number_of_solved_routes = solved
            .iter()
            .map(|(_, r)| r.hash_key())
            .collect::<HashSet<_>>()
            .len();

        let candidates = if solved.is_empty() {
            unsolved
        } else {
            solved
        };

        let mut seen = HashSet::new();
        let mut ranked: Vec<RankedRoute> = candidates
            .into_iter()
            .filter(|(_, route)| seen.insert(route.hash_key()))
            .map(|(node, route)| RankedRoute {
                node,
                score: scorer.score(&route),
                route,
            })
            .collect();

        if scorer.higher_is_better() {
            ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        } else {
            ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
        }

        tracing::debug!(
            scorer = scorer.name(),
            nodes = nodes.len(),
            candidates = ranked.len(),
            solved = number_of_solved_routes,
            "analysed search tree"
        );

        Self {
            scorer: scorer.name().to_string(),
            ranked,
            number_of_nodes: nodes.len(),
            max_transforms,
            max_children,
            number_of_solved_routes,
        }
    }

    /// Name of the scorer used for ranking.
    #[must_use]
    pub fn scorer(&self) -> &str {
        &self.scorer
    }

    /// Candidates, best first.
    #[must_use]
    pub fn ranked(&self) -> &[RankedRoute] {
        &self.ranked
    }

    /// Top-ranked candidate, if any.
    #[must_use]
    pub fn best(&self) -> Option<&RankedRoute> {
        self.ranked.first()
    }

    /// Summary figures for [`crate::RetroFinder::extract_statistics`].
    #[must_use]
    pub fn tree_statistics(&self) -> Map<String, Value> {
        let mut stats = Map::new();
        stats.insert("number_of_nodes".into(), json!(self.number_of_nodes));
        stats.insert("max_transforms".into(), json!(self.max_transforms));
        stats.insert("max_children".into(), json!(self.max_children));
        stats.insert("number_of_routes".into(), json!(self.ranked.len()));
        stats.insert(
            "number_of_solved_routes".into(),
            json!(self.number_of_solved_routes),
        );

        let Some(top) = self.best() else {
            stats.insert("top_score".into(), Value::Null);
            stats.insert("is_solved".into(), json!(false));
            return stats;
        };

        let (in_stock, not_in_stock): (Vec<_>, Vec<_>) =
            top.route.leaves.iter().partition(|leaf| leaf.in_stock);
        let join = |leaves: &[&crate::route::RouteLeaf]| {
            leaves
                .iter()
                .map(|leaf| leaf.molecule.smiles())
                .collect::<Vec<_>>()
                .join(", ")
        };

        stats.insert("top_score".into(), json!(top.score));
        stats.insert("is_solved".into(), json!(top.route.is_solved));
        stats.insert(
            "number_of_steps".into(),
            json!(top.route.number_of_reactions()),
        );
        stats.insert(
            "number_of_precursors".into(),
            json!(top.route.number_of_precursors()),
        );
        stats.insert(
            "number_of_precursors_in_stock".into(),
            json!(top.route.number_of_precursors_in_stock()),
        );
        stats.insert("precursors_in_stock".into(), json!(join(&in_stock)));
        stats.insert("precursors_not_in_stock".into(), json!(join(&not_in_stock)));
        stats
    }
}
