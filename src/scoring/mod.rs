//! Route scoring.
//!
//! Scorers rank routes for the results builder. The registry looks them up
//! by name and enumerates them for full scoring of a response.

mod scorers;

use std::sync::Arc;

pub use scorers::{
    NumberOfPrecursorsInStockScorer, NumberOfPrecursorsScorer, NumberOfReactionsScorer,
    StateScorer,
};

use crate::error::{ExecutionError, RetroResult};
use crate::route::Route;

/// Name of the scorer used when none is requested.
pub const DEFAULT_SCORER: &str = "state score";

/// Evaluates a route.
pub trait Scorer: Send + Sync {
    /// Registry name of the scorer.
    fn name(&self) -> &str;

    /// Raw score of `route`.
    fn score(&self, route: &Route) -> f64;

    /// Whether larger scores rank first.
    fn higher_is_better(&self) -> bool {
        true
    }
}

/// Named scorers, kept in registration order.
#[derive(Clone)]
pub struct ScorerRegistry {
    scorers: Vec<Arc<dyn Scorer>>,
}

impl std::fmt::Debug for ScorerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScorerRegistry")
            .field("scorers", &self.names())
            .finish()
    }
}

impl Default for ScorerRegistry {
    /// The four built-in scorers.
    fn default() -> Self {
        Self {
            scorers: vec![
                Arc::new(StateScorer),
                Arc::new(NumberOfReactionsScorer),
                Arc::new(NumberOfPrecursorsScorer),
                Arc::new(NumberOfPrecursorsInStockScorer),
            ],
        }
    }
}

impl ScorerRegistry {
    /// A registry with no scorers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            scorers: Vec::new(),
        }
    }

    /// Add a scorer, replacing any scorer with the same name in place.
    pub fn register(&mut self, scorer: Arc<dyn Scorer>) {
        match self.scorers.iter().position(|s| s.name() == scorer.name()) {
            Some(idx) => self.scorers[idx] = scorer,
            None => self.scorers.push(scorer),
        }
    }

    /// Look up a scorer by name.
    pub fn get(&self, name: &str) -> RetroResult<Arc<dyn Scorer>> {
        self.scorers
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| {
                ExecutionError::UnknownScorer {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Every registered scorer, in registration order.
    #[must_use]
    pub fn objects(&self) -> Vec<Arc<dyn Scorer>> {
        self.scorers.clone()
    }

    /// Scorer names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.scorers.iter().map(|s| s.name()).collect()
    }

    /// Number of registered scorers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    /// True when no scorer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }
}
