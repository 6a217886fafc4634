//! Built-in route scorers.

use crate::route::Route;
use crate::scoring::Scorer;

/// Score of the route's final search state.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateScorer;

impl Scorer for StateScorer {
    fn name(&self) -> &str {
        "state score"
    }

    fn score(&self, route: &Route) -> f64 {
        route.state_score
    }
}

/// Number of reactions; shorter routes rank first.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberOfReactionsScorer;

impl Scorer for NumberOfReactionsScorer {
    fn name(&self) -> &str {
        "number of reactions"
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, route: &Route) -> f64 {
        route.number_of_reactions() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }
}

/// Number of starting materials; fewer rank first.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberOfPrecursorsScorer;

impl Scorer for NumberOfPrecursorsScorer {
    fn name(&self) -> &str {
        "number of pre-cursors"
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, route: &Route) -> f64 {
        route.number_of_precursors() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }
}

/// Number of starting materials already in stock.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberOfPrecursorsInStockScorer;

impl Scorer for NumberOfPrecursorsInStockScorer {
    fn name(&self) -> &str {
        "number of pre-cursors in stock"
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, route: &Route) -> f64 {
        route.number_of_precursors_in_stock() as f64
    }
}
