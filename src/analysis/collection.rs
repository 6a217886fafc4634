use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::analysis::TreeAnalysis;
use crate::route::Route;
use crate::scoring::Scorer;
use crate::tree::NodeId;

/// The top routes of an analysis, ready for serialization.
#[derive(Debug, Clone, Default)]
pub struct RouteCollection {
    nodes: Vec<NodeId>,
    routes: Vec<Route>,
    scores: Vec<f64>,
    all_scores: Vec<BTreeMap<String, f64>>,
}

impl RouteCollection {
    /// Take at least `min_nodes` routes from the top of the ranking.
    ///
    /// Routes tied with the last one taken are included as well, so the
    /// collection may be longer than `min_nodes`. It is shorter only when the
    /// analysis has fewer routes.
    #[must_use]
    pub fn from_analysis(analysis: &TreeAnalysis, min_nodes: usize) -> Self {
        let ranked = analysis.ranked();
        let mut take = min_nodes.min(ranked.len());
        if take > 0 {
            let last = ranked[take - 1].score;
            while take < ranked.len() && ranked[take].score.total_cmp(&last).is_eq() {
                take += 1;
            }
        }

        let mut collection = Self::default();
        for entry in &ranked[..take] {
            collection.nodes.push(entry.node);
            collection.routes.push(entry.route.clone());
            collection.scores.push(entry.score);
            collection
                .all_scores
                .push(BTreeMap::from([(analysis.scorer().to_string(), entry.score)]));
        }
        collection
    }

    /// Number of routes kept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no route was kept.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Tree nodes the routes end at.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The kept routes, best first.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Scores under the ranking scorer.
    #[must_use]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Per-route scores by scorer name: the ranking scorer plus any added by
    /// [`Self::compute_scores`].
    #[must_use]
    pub fn all_scores(&self) -> &[BTreeMap<String, f64>] {
        &self.all_scores
    }

    /// Score every route with each of `scorers`.
    pub fn compute_scores(&mut self, scorers: &[Arc<dyn Scorer>]) {
        for (route, scores) in self.routes.iter().zip(&mut self.all_scores) {
            for scorer in scorers {
                scores.insert(scorer.name().to_string(), scorer.score(route));
            }
        }
    }

    /// Nested route dictionaries.
    #[must_use]
    pub fn dicts(&self) -> Vec<Value> {
        self.routes.iter().map(Route::to_dict).collect()
    }

    /// Route dictionaries with a `scores` object on each.
    #[must_use]
    pub fn dict_with_scores(&self) -> Vec<Value> {
        self.routes
            .iter()
            .zip(&self.all_scores)
            .map(|(route, scores)| {
                let mut dict = route.to_dict();
                if let Value::Object(map) = &mut dict {
                    let scores: Map<String, Value> = scores
                        .iter()
                        .map(|(name, value)| (name.clone(), Value::from(*value)))
                        .collect();
                    map.insert("scores".to_string(), Value::Object(scores));
                }
                dict
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::FixedTree;
    use crate::scoring::{ScorerRegistry, StateScorer};

    fn tree() -> FixedTree {
        FixedTree::new(&[
            (&[("CCO", true), ("CC(=O)O", true)], 0.98),
            (&[("CCOC(=O)O", true)], 0.98),
            (&[("CC", true), ("OC(=O)C", true), ("O", true)], 0.7),
        ])
    }

    #[test]
    fn ties_extend_past_min_nodes() {
        let analysis = TreeAnalysis::new(&tree(), &StateScorer);
        let collection = RouteCollection::from_analysis(&analysis, 1);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.nodes(), &[NodeId::new(1), NodeId::new(2)]);
    }

    #[test]
    fn short_tree_gives_fewer_routes() {
        let analysis = TreeAnalysis::new(&tree(), &StateScorer);
        let collection = RouteCollection::from_analysis(&analysis, 5);
        assert_eq!(collection.len(), 3);
        assert!(RouteCollection::from_analysis(&analysis, 0).is_empty());
    }

    #[test]
    fn dicts_without_scores() {
        let analysis = TreeAnalysis::new(&tree(), &StateScorer);
        let collection = RouteCollection::from_analysis(&analysis, 5);
        let dicts = collection.dicts();
        assert_eq!(dicts.len(), 3);
        assert_eq!(dicts[0]["type"], "mol");
        assert!(dicts[0].get("scores").is_none());
    }

    #[test]
    fn computed_scores_cover_every_scorer() {
        let registry = ScorerRegistry::default();
        let analysis = TreeAnalysis::new(&tree(), &StateScorer);
        let mut collection = RouteCollection::from_analysis(&analysis, 5);
        collection.compute_scores(&registry.objects());

        for dict in collection.dict_with_scores() {
            let scores = dict["scores"].as_object().unwrap();
            for name in registry.names() {
                assert!(scores.contains_key(name), "missing {name}");
            }
        }
        assert!((collection.all_scores()[2]["number of pre-cursors"] - 3.0).abs() < f64::EPSILON);
    }
}
