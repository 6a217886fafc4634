//! # retrosearch - budgeted retrosynthesis search orchestration
//!
//! retrosearch configures a retrosynthesis search, drives a tree search over
//! it under time and iteration budgets, and turns the finished tree into
//! ranked, scored synthesis routes. Searches can be replayed exactly from a
//! serialized request.
//!
//! ## Core Concepts
//!
//! - **Stock**: purchasable compounds; a molecule in stock needs no further disconnection
//! - **Expansion policy**: proposes reactions that make a molecule
//! - **Filter policy**: vetoes implausible reactions
//! - **Search tree**: grows by selecting, expanding and backpropagating nodes
//! - **Route**: the reactions from the target to one tree node
//!
//! ## Usage
//!
//! ```rust,ignore
//! use retrosearch::{RetroFinder, DEFAULT_SCORER};
//!
//! let mut finder = RetroFinder::from_config_file("config.json")?;
//! finder.set_target_smiles("CCOC(C)=O")?;
//! finder.tree_search(false)?;
//! finder.build_routes(5, DEFAULT_SCORER)?;
//! println!("{:?}", finder.extract_statistics());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod chem;
pub mod error;
pub mod route;
pub mod selection;

// Collaborators
pub mod policy;
pub mod scoring;
pub mod stock;
pub mod tree;

// Reference tree
pub mod mcts;

// Configuration and orchestration
pub mod analysis;
pub mod config;
pub mod finder;
pub mod request;

pub use analysis::{RankedRoute, RouteCollection, TreeAnalysis};
pub use chem::{Molecule, Reaction};
pub use config::{ConfigFile, Configuration};
pub use error::{ConfigError, ExecutionError, RetroError, RetroResult, ValidationError};
pub use finder::{
    ProgressSink, RetroFinder, RetroFinderBuilder, RunPhase, SearchExit, SearchRunState,
    SearchStats, TracingProgress, DEFAULT_MIN_NODES,
};
pub use mcts::{MctsState, MctsTree, MctsTreeFactory};
pub use policy::{
    apply_cutoffs, ExpansionPolicy, FilterPolicy, TableFilterPolicy, TemplateEntry,
    TemplateExpansionPolicy,
};
pub use request::{PolicyField, SearchRequest, SearchResponse};
pub use route::{Route, RouteLeaf};
pub use scoring::{Scorer, ScorerRegistry, DEFAULT_SCORER};
pub use selection::{Selectable, Selection};
pub use stock::{InMemoryStock, Stock};
pub use tree::{NodeId, NodeStatus, SearchContext, SearchTree, TreeFactory};
