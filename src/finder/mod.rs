//! Search orchestration.
//!
//! [`RetroFinder`] ties the collaborators together: it prepares a tree for
//! the target, runs the budgeted search loop over it and turns the finished
//! tree into ranked routes.
//!
//! ```text
//! set_target -> prepare_tree -> tree_search -> build_routes -> extract_statistics
//!                         \______ run_from_json does all of it ______/
//! ```

mod progress;
mod state;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};

pub use progress::{ProgressSink, TracingProgress};
pub use state::{RunPhase, SearchExit, SearchRunState, SearchStats};

use crate::analysis::{RouteCollection, TreeAnalysis};
use crate::chem::Molecule;
use crate::config::{ConfigFile, Configuration};
use crate::error::{ExecutionError, RetroResult};
use crate::mcts::MctsTreeFactory;
use crate::policy::{ExpansionPolicy, FilterPolicy, TableFilterPolicy, TemplateExpansionPolicy};
use crate::request::{SearchRequest, SearchResponse};
use crate::scoring::{ScorerRegistry, DEFAULT_SCORER};
use crate::stock::{InMemoryStock, Stock};
use crate::tree::{SearchContext, SearchTree, TreeFactory};
use progress::ProgressGuard;

/// Number of routes kept by [`RetroFinder::run_from_json`].
pub const DEFAULT_MIN_NODES: usize = 5;

/// Drives one retrosynthesis search at a time.
pub struct RetroFinder {
    config: Configuration,
    stock: Arc<dyn Stock>,
    expansion_policy: Arc<dyn ExpansionPolicy>,
    filter_policy: Arc<dyn FilterPolicy>,
    scorers: ScorerRegistry,
    tree_factory: Arc<dyn TreeFactory>,
    progress: Arc<dyn ProgressSink>,
    target: Option<Molecule>,
    run: SearchRunState,
}

impl std::fmt::Debug for RetroFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetroFinder")
            .field("config", &self.config)
            .field("target", &self.target)
            .field("scorers", &self.scorers)
            .field("run", &self.run)
            .finish_non_exhaustive()
    }
}

impl Default for RetroFinder {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetroFinder {
    /// Start building a finder with default collaborators.
    #[must_use]
    pub fn builder() -> RetroFinderBuilder {
        RetroFinderBuilder::new()
    }

    /// Build a finder from a JSON configuration file.
    ///
    /// The file's stock, expansion and filter sections become in-memory
    /// collaborators. Every stock and filter is selected, along with the
    /// first expansion policy by name.
    pub fn from_config_file(path: impl AsRef<Path>) -> RetroResult<Self> {
        Self::from_config(ConfigFile::from_file(path)?)
    }

    /// Like [`Self::from_config_file`] for a document already in memory.
    /// A flat properties object is accepted too.
    pub fn from_config_dict(value: &Value) -> RetroResult<Self> {
        Self::from_config(ConfigFile::from_dict(value)?)
    }

    /// Build a finder from a parsed configuration document.
    pub fn from_config(file: ConfigFile) -> RetroResult<Self> {
        let stock = InMemoryStock::new();
        for (name, smiles) in &file.stock {
            stock.add_inventory(name, smiles)?;
        }
        stock.select_all()?;

        let expansion = TemplateExpansionPolicy::new();
        for (name, table) in file.expansion {
            let mut entries = Vec::with_capacity(table.len());
            for (product, actions) in table {
                entries.push((Molecule::from_smiles(&product)?, actions));
            }
            expansion.add_policy(&name, entries)?;
        }
        expansion.select_first_by_name()?;

        let filter = TableFilterPolicy::new();
        for (name, table) in file.filter {
            filter.add_filter(&name, table)?;
        }
        filter.select_all()?;

        tracing::debug!(
            stocks = file.stock.len(),
            "finder configured from document"
        );

        Ok(Self::builder()
            .config(file.properties)
            .stock(Arc::new(stock))
            .expansion_policy(Arc::new(expansion))
            .filter_policy(Arc::new(filter))
            .build())
    }

    /// Active search configuration.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Mutable configuration. Changes apply from the next prepared tree.
    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// Stock collaborator.
    #[must_use]
    pub fn stock(&self) -> &Arc<dyn Stock> {
        &self.stock
    }

    /// Expansion policy collaborator.
    #[must_use]
    pub fn expansion_policy(&self) -> &Arc<dyn ExpansionPolicy> {
        &self.expansion_policy
    }

    /// Filter policy collaborator.
    #[must_use]
    pub fn filter_policy(&self) -> &Arc<dyn FilterPolicy> {
        &self.filter_policy
    }

    /// Registered scorers.
    #[must_use]
    pub fn scorers(&self) -> &ScorerRegistry {
        &self.scorers
    }

    /// Mutable scorer registry.
    pub fn scorers_mut(&mut self) -> &mut ScorerRegistry {
        &mut self.scorers
    }

    /// Current target, if one is set.
    #[must_use]
    pub fn target(&self) -> Option<&Molecule> {
        self.target.as_ref()
    }

    /// SMILES of the target, if one is set.
    #[must_use]
    pub fn target_smiles(&self) -> Option<&str> {
        self.target.as_ref().map(Molecule::smiles)
    }

    /// Set the target, discarding any tree and results for the old one.
    pub fn set_target(&mut self, target: Molecule) {
        self.target = Some(target);
        self.run.clear();
    }

    /// Parse and set the target.
    pub fn set_target_smiles(&mut self, smiles: &str) -> RetroResult<()> {
        self.set_target(Molecule::from_smiles(smiles)?);
        Ok(())
    }

    /// Remove the target together with its tree and results.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.run.clear();
    }

    /// Tree, analysis and routes of the current run.
    #[must_use]
    pub fn run_state(&self) -> &SearchRunState {
        &self.run
    }

    /// Figures from the last search loop.
    #[must_use]
    pub fn search_stats(&self) -> &SearchStats {
        self.run.stats()
    }

    /// Current search tree, if prepared.
    #[must_use]
    pub fn tree(&self) -> Option<&dyn SearchTree> {
        self.run.tree()
    }

    /// Analysis of the last built routes.
    #[must_use]
    pub fn analysis(&self) -> Option<&TreeAnalysis> {
        self.run.analysis()
    }

    /// Routes from the last [`Self::build_routes`] call.
    #[must_use]
    pub fn routes(&self) -> Option<&RouteCollection> {
        self.run.routes()
    }

    fn context(&self) -> SearchContext {
        SearchContext {
            stock: Arc::clone(&self.stock),
            expansion_policy: Arc::clone(&self.expansion_policy),
            filter_policy: Arc::clone(&self.filter_policy),
        }
    }

    /// Build a fresh tree rooted at the target.
    ///
    /// The stock exclusion list is reset first. With
    /// `exclude_target_from_stock` set, a target found in stock is excluded
    /// so the search has to disconnect it.
    pub fn prepare_tree(&mut self) -> RetroResult<()> {
        let target = self.target.clone().ok_or(ExecutionError::NoTarget)?;
        self.config.validate()?;
        self.run.clear();

        self.stock.reset_exclusion_list()?;
        if self.config.exclude_target_from_stock && self.stock.contains(&target)? {
            self.stock.exclude(&target)?;
            tracing::debug!(molecule = %target, "excluded target from stock");
        }

        let tree = self
            .tree_factory
            .create_tree(&target, &self.config, &self.context())?;
        tracing::debug!(molecule = %target, root = %tree.root(), "prepared search tree");
        self.run.install_tree(tree);
        Ok(())
    }

    /// Run the search loop until a budget runs out or, with
    /// `return_first`, a solved leaf is reached.
    ///
    /// Prepares a tree first when none exists. Returns the elapsed seconds,
    /// which are also recorded in [`Self::search_stats`] on every exit,
    /// failed ones included.
    pub fn tree_search(&mut self, show_progress: bool) -> RetroResult<f64> {
        if !self.run.has_tree() {
            self.prepare_tree()?;
        }

        let progress = ProgressGuard::start(&self.progress, show_progress, self.config.iteration_limit);
        let tree = self
            .run
            .begin_search()
            .ok_or(ExecutionError::NoTree)?;

        tracing::info!(
            smiles = ?self.target.as_ref().map(Molecule::smiles),
            time_limit = self.config.time_limit,
            iteration_limit = self.config.iteration_limit,
            "search started"
        );

        let start = Instant::now();
        let mut iterations = 0;
        let result = search_loop(tree, &self.config, &progress, start, &mut iterations);
        drop(progress);
        let elapsed = start.elapsed().as_secs_f64();

        let stats = self.run.stats_mut();
        stats.iterations = iterations;
        stats.time = elapsed;
        match result {
            Ok(exit) => {
                stats.exit = Some(exit);
                stats.returned_first = exit == SearchExit::FirstSolution;
                tracing::info!(iterations, time = elapsed, exit = ?exit, "search finished");
                Ok(elapsed)
            }
            Err(err) => {
                tracing::warn!(iterations, time = elapsed, error = %err, "search failed");
                Err(err)
            }
        }
    }

    /// Rank the routes of the current tree with the named scorer and keep at
    /// least `min_nodes` of them.
    pub fn build_routes(&mut self, min_nodes: usize, scorer: &str) -> RetroResult<()> {
        let tree = self.run.tree().ok_or(ExecutionError::NoTree)?;
        let scorer = self.scorers.get(scorer)?;

        let analysis = TreeAnalysis::new(tree, scorer.as_ref());
        let routes = RouteCollection::from_analysis(&analysis, min_nodes);
        tracing::debug!(routes = routes.len(), scorer = scorer.name(), "built routes");
        self.run.attach_results(analysis, routes);
        Ok(())
    }

    /// Summary of the last analysis; empty if routes have not been built.
    #[must_use]
    pub fn extract_statistics(&self) -> Map<String, Value> {
        let Some(analysis) = self.run.analysis() else {
            return Map::new();
        };
        let mut stats = Map::new();
        stats.insert("target".into(), json!(self.target_smiles()));
        stats.insert("search_time".into(), json!(self.run.stats().time));
        stats.extend(analysis.tree_statistics());
        stats
    }

    /// Replay a serialized request to completion.
    ///
    /// The request is parsed and validated before any collaborator or
    /// setting changes. The response carries the request rebuilt from the
    /// live settings and the top routes, annotated with every registered
    /// scorer when `score_trees` is set.
    pub fn run_from_json(&mut self, value: &Value) -> RetroResult<SearchResponse> {
        let request = SearchRequest::from_value(value)?;
        let target = request.target()?;

        self.stock.select(&request.stocks)?;
        self.expansion_policy.select(&request.policies)?;
        if request.filter.is_empty() {
            self.filter_policy.deselect()?;
        } else {
            self.filter_policy.select(&request.filter)?;
        }
        self.config = request.config.clone();
        self.set_target(target);

        self.prepare_tree()?;
        self.tree_search(false)?;
        self.build_routes(DEFAULT_MIN_NODES, DEFAULT_SCORER)?;

        let scorers = self.scorers.objects();
        let routes = self.run.routes_mut().ok_or(ExecutionError::NoTree)?;
        let trees = if request.score_trees {
            routes.compute_scores(&scorers);
            routes.dict_with_scores()
        } else {
            routes.dicts()
        };

        Ok(SearchResponse {
            request: self.settings()?,
            trees,
        })
    }

    /// The current settings as a replay request.
    pub fn settings(&self) -> RetroResult<SearchRequest> {
        let smiles = self.target_smiles().ok_or(ExecutionError::NoTarget)?;
        Ok(SearchRequest {
            stocks: self.stock.selection()?,
            policies: self.expansion_policy.selection()?,
            filter: self.filter_policy.selection()?,
            smiles: smiles.to_string(),
            config: self.config.clone(),
            score_trees: false,
        })
    }
}

/// The budgeted loop. `iterations` is left at the number of completed
/// iterations even when a collaborator fails.
fn search_loop(
    tree: &mut dyn SearchTree,
    config: &Configuration,
    progress: &ProgressGuard,
    start: Instant,
    iterations: &mut usize,
) -> RetroResult<SearchExit> {
    loop {
        if start.elapsed().as_secs_f64() >= config.time_limit {
            return Ok(SearchExit::TimeLimit);
        }
        if *iterations >= config.iteration_limit {
            return Ok(SearchExit::IterationLimit);
        }
        progress.advance(*iterations + 1);

        let mut leaf = tree.select_leaf()?;
        tree.expand(leaf)?;
        while !tree.is_terminal(leaf) {
            let Some(child) = tree.promising_child(leaf)? else {
                break;
            };
            tree.expand(child)?;
            leaf = child;
        }

        let status = tree.status(leaf);
        tree.backpropagate(leaf, status.score);
        *iterations += 1;

        if config.return_first && status.is_solved {
            tracing::debug!(leaf = %leaf, iterations = *iterations, "returning first solution");
            return Ok(SearchExit::FirstSolution);
        }
    }
}

/// Builder for [`RetroFinder`].
///
/// Unset collaborators default to empty in-memory ones, the built-in
/// scorers, the reference tree and the tracing progress sink.
#[derive(Default)]
pub struct RetroFinderBuilder {
    config: Option<Configuration>,
    stock: Option<Arc<dyn Stock>>,
    expansion_policy: Option<Arc<dyn ExpansionPolicy>>,
    filter_policy: Option<Arc<dyn FilterPolicy>>,
    scorers: Option<ScorerRegistry>,
    tree_factory: Option<Arc<dyn TreeFactory>>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl RetroFinderBuilder {
    /// A builder with every collaborator unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the search configuration.
    #[must_use]
    pub fn config(mut self, config: Configuration) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the stock.
    #[must_use]
    pub fn stock(mut self, stock: Arc<dyn Stock>) -> Self {
        self.stock = Some(stock);
        self
    }

    /// Sets the expansion policy.
    #[must_use]
    pub fn expansion_policy(mut self, policy: Arc<dyn ExpansionPolicy>) -> Self {
        self.expansion_policy = Some(policy);
        self
    }

    /// Sets the filter policy.
    #[must_use]
    pub fn filter_policy(mut self, policy: Arc<dyn FilterPolicy>) -> Self {
        self.filter_policy = Some(policy);
        self
    }

    /// Sets the scorer registry.
    #[must_use]
    pub fn scorers(mut self, scorers: ScorerRegistry) -> Self {
        self.scorers = Some(scorers);
        self
    }

    /// Sets the factory used by [`RetroFinder::prepare_tree`].
    #[must_use]
    pub fn tree_factory(mut self, factory: Arc<dyn TreeFactory>) -> Self {
        self.tree_factory = Some(factory);
        self
    }

    /// Sets where `tree_search(true)` reports progress.
    #[must_use]
    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Build the finder, filling unset collaborators with in-memory defaults.
    #[must_use]
    pub fn build(self) -> RetroFinder {
        RetroFinder {
            config: self.config.unwrap_or_default(),
            stock: self
                .stock
                .unwrap_or_else(|| Arc::new(InMemoryStock::new())),
            expansion_policy: self
                .expansion_policy
                .unwrap_or_else(|| Arc::new(TemplateExpansionPolicy::new())),
            filter_policy: self
                .filter_policy
                .unwrap_or_else(|| Arc::new(TableFilterPolicy::new())),
            scorers: self.scorers.unwrap_or_default(),
            tree_factory: self
                .tree_factory
                .unwrap_or_else(|| Arc::new(MctsTreeFactory)),
            progress: self.progress.unwrap_or_else(|| Arc::new(TracingProgress)),
            target: None,
            run: SearchRunState::new(),
        }
    }
}
