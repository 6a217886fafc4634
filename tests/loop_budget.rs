use std::sync::{Arc, Mutex};
use std::time::Duration;

use retrosearch::{
    Configuration, Molecule, NodeId, NodeStatus, ProgressSink, RetroError, RetroFinder,
    RetroResult, Route, RouteLeaf, SearchContext, SearchExit, SearchTree, TreeFactory,
    DEFAULT_SCORER,
};

#[derive(Clone)]
struct ScriptNode {
    score: f64,
    terminal: bool,
    children: Vec<usize>,
}

/// Behaviour of every tree the factory builds.
#[derive(Clone, Default)]
struct Script {
    nodes: Vec<ScriptNode>,
    /// The root reports solved from this `select_leaf` call on (1-based).
    solved_from: Option<usize>,
    /// `select_leaf` fails on this call (1-based).
    fail_at: Option<usize>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct Log {
    selects: usize,
    expanded: Vec<usize>,
    backpropagated: Vec<(usize, f64)>,
}

struct ScriptedTree {
    target: Molecule,
    script: Script,
    log: Arc<Mutex<Log>>,
}

impl ScriptedTree {
    fn selects(&self) -> usize {
        self.log.lock().unwrap().selects
    }
}

impl SearchTree for ScriptedTree {
    fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    fn select_leaf(&mut self) -> RetroResult<NodeId> {
        if let Some(delay) = self.script.delay {
            std::thread::sleep(delay);
        }
        let call = {
            let mut log = self.log.lock().unwrap();
            log.selects += 1;
            log.selects
        };
        if self.script.fail_at == Some(call) {
            return Err(RetroError::collaborator("tree", "selection failed"));
        }
        Ok(self.root())
    }

    fn expand(&mut self, node: NodeId) -> RetroResult<()> {
        self.log.lock().unwrap().expanded.push(node.index());
        Ok(())
    }

    fn is_terminal(&self, node: NodeId) -> bool {
        self.script.nodes[node.index()].terminal
    }

    fn promising_child(&mut self, node: NodeId) -> RetroResult<Option<NodeId>> {
        Ok(self.script.nodes[node.index()]
            .children
            .first()
            .map(|&c| NodeId::new(c)))
    }

    fn backpropagate(&mut self, node: NodeId, score: f64) {
        self.log
            .lock()
            .unwrap()
            .backpropagated
            .push((node.index(), score));
    }

    fn status(&self, node: NodeId) -> NodeStatus {
        let solved_root = self
            .script
            .solved_from
            .is_some_and(|from| self.selects() >= from);
        NodeStatus {
            score: self.script.nodes[node.index()].score,
            is_solved: node.index() == 0 && solved_root,
        }
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.script.nodes[node.index()]
            .children
            .iter()
            .map(|&c| NodeId::new(c))
            .collect()
    }

    fn nodes(&self) -> Vec<NodeId> {
        (0..self.script.nodes.len()).map(NodeId::new).collect()
    }

    fn route(&self, node: NodeId) -> Route {
        let status = self.status(node);
        Route {
            target: self.target.clone(),
            reactions: Vec::new(),
            leaves: vec![RouteLeaf {
                molecule: self.target.clone(),
                in_stock: status.is_solved,
            }],
            state_score: status.score,
            is_solved: status.is_solved,
        }
    }
}

struct ScriptedFactory {
    script: Script,
    log: Arc<Mutex<Log>>,
}

impl TreeFactory for ScriptedFactory {
    fn create_tree(
        &self,
        root: &Molecule,
        _config: &Configuration,
        _context: &SearchContext,
    ) -> RetroResult<Box<dyn SearchTree>> {
        Ok(Box::new(ScriptedTree {
            target: root.clone(),
            script: self.script.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

#[derive(Default)]
struct CountingProgress {
    started: Mutex<usize>,
    advanced: Mutex<usize>,
    finished: Mutex<usize>,
}

impl ProgressSink for CountingProgress {
    fn start(&self, _total: usize) {
        *self.started.lock().unwrap() += 1;
    }

    fn advance(&self, _done: usize) {
        *self.advanced.lock().unwrap() += 1;
    }

    fn finish(&self) {
        *self.finished.lock().unwrap() += 1;
    }
}

fn leaf_root(score: f64) -> Script {
    Script {
        nodes: vec![ScriptNode {
            score,
            terminal: true,
            children: Vec::new(),
        }],
        ..Script::default()
    }
}

struct Harness {
    finder: RetroFinder,
    log: Arc<Mutex<Log>>,
    progress: Arc<CountingProgress>,
}

fn harness(script: Script, config: Configuration) -> Harness {
    let log = Arc::new(Mutex::new(Log::default()));
    let progress = Arc::new(CountingProgress::default());
    let mut finder = RetroFinder::builder()
        .config(config)
        .tree_factory(Arc::new(ScriptedFactory {
            script,
            log: Arc::clone(&log),
        }))
        .progress(progress.clone())
        .build();
    finder.set_target_smiles("CCOC(C)=O").unwrap();
    Harness {
        finder,
        log,
        progress,
    }
}

fn config(iteration_limit: usize) -> Configuration {
    Configuration {
        iteration_limit,
        time_limit: 60.0,
        ..Configuration::default()
    }
}

#[test]
fn zero_time_limit_runs_no_iterations() {
    let mut h = harness(
        leaf_root(0.5),
        Configuration {
            time_limit: 0.0,
            ..config(10)
        },
    );
    h.finder.tree_search(false).unwrap();

    let stats = h.finder.search_stats();
    assert_eq!(stats.iterations, 0);
    assert_eq!(stats.exit, Some(SearchExit::TimeLimit));
    assert!(!stats.returned_first);
    assert!(h.log.lock().unwrap().backpropagated.is_empty());
}

#[test]
fn iterations_never_exceed_limit() {
    for limit in [0, 1, 2, 7] {
        let mut h = harness(leaf_root(0.5), config(limit));
        h.finder.tree_search(false).unwrap();
        assert_eq!(h.finder.search_stats().iterations, limit);
        assert_eq!(h.finder.search_stats().exit, Some(SearchExit::IterationLimit));
        assert_eq!(h.log.lock().unwrap().selects, limit);
    }
}

#[test]
fn return_first_stops_at_first_solved_iteration() {
    let script = Script {
        solved_from: Some(3),
        ..leaf_root(0.9)
    };
    let mut h = harness(
        script,
        Configuration {
            return_first: true,
            ..config(20)
        },
    );
    h.finder.tree_search(true).unwrap();

    let stats = h.finder.search_stats();
    assert!(stats.returned_first);
    assert_eq!(stats.iterations, 3);
    assert_eq!(stats.exit, Some(SearchExit::FirstSolution));
    // The winning iteration is backpropagated before the loop stops.
    assert_eq!(h.log.lock().unwrap().backpropagated.len(), 3);
    assert_eq!(*h.progress.finished.lock().unwrap(), 1);
}

#[test]
fn solved_leaf_without_return_first_runs_full_budget() {
    let script = Script {
        solved_from: Some(1),
        ..leaf_root(0.9)
    };
    let mut h = harness(script, config(6));
    h.finder.tree_search(false).unwrap();
    assert_eq!(h.finder.search_stats().iterations, 6);
    assert!(!h.finder.search_stats().returned_first);
}

#[test]
fn missing_promising_child_ends_descent_and_still_counts() {
    let script = Script {
        nodes: vec![ScriptNode {
            score: 0.3,
            terminal: false,
            children: Vec::new(),
        }],
        ..Script::default()
    };
    let mut h = harness(script, config(4));
    h.finder.tree_search(false).unwrap();

    assert_eq!(h.finder.search_stats().iterations, 4);
    let log = h.log.lock().unwrap();
    assert_eq!(log.backpropagated, vec![(0, 0.3); 4]);
}

#[test]
fn descent_expands_each_promising_child() {
    let script = Script {
        nodes: vec![
            ScriptNode {
                score: 0.1,
                terminal: false,
                children: vec![1],
            },
            ScriptNode {
                score: 0.2,
                terminal: false,
                children: vec![2],
            },
            ScriptNode {
                score: 0.7,
                terminal: true,
                children: Vec::new(),
            },
        ],
        ..Script::default()
    };
    let mut h = harness(script, config(1));
    h.finder.tree_search(false).unwrap();

    let log = h.log.lock().unwrap();
    assert_eq!(log.expanded, vec![0, 1, 2]);
    assert_eq!(log.backpropagated, vec![(2, 0.7)]);
}

#[test]
fn time_limit_stops_slow_search() {
    let script = Script {
        delay: Some(Duration::from_millis(5)),
        ..leaf_root(0.5)
    };
    let mut h = harness(
        script,
        Configuration {
            time_limit: 0.05,
            ..config(100_000)
        },
    );
    let elapsed = h.finder.tree_search(true).unwrap();

    let stats = h.finder.search_stats();
    assert_eq!(stats.exit, Some(SearchExit::TimeLimit));
    assert!(stats.iterations > 0);
    assert!(stats.iterations < 100_000);
    assert!(elapsed >= 0.05);
    assert!((stats.time - elapsed).abs() < f64::EPSILON);
    assert_eq!(*h.progress.finished.lock().unwrap(), 1);
}

#[test]
fn collaborator_error_propagates_and_records_time() {
    let script = Script {
        fail_at: Some(2),
        ..leaf_root(0.5)
    };
    let mut h = harness(script, config(10));
    let err = h.finder.tree_search(true).unwrap_err();
    assert!(err.is_execution());

    let stats = h.finder.search_stats();
    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.exit, None);
    assert!(stats.time >= 0.0);
    assert!(stats.started_at.is_some());
    assert_eq!(*h.progress.started.lock().unwrap(), 1);
    assert_eq!(*h.progress.finished.lock().unwrap(), 1);
}

#[test]
fn progress_tracks_iterations_when_enabled() {
    let mut h = harness(leaf_root(0.5), config(5));
    h.finder.tree_search(true).unwrap();
    assert_eq!(*h.progress.advanced.lock().unwrap(), 5);
    assert_eq!(*h.progress.finished.lock().unwrap(), 1);

    let mut quiet = harness(leaf_root(0.5), config(5));
    quiet.finder.tree_search(false).unwrap();
    assert_eq!(*quiet.progress.started.lock().unwrap(), 0);
    assert_eq!(*quiet.progress.finished.lock().unwrap(), 0);
}

#[test]
fn rerunning_search_drops_previous_analysis() {
    let mut h = harness(leaf_root(0.5), config(2));
    h.finder.tree_search(false).unwrap();
    h.finder.build_routes(5, DEFAULT_SCORER).unwrap();
    assert!(h.finder.analysis().is_some());
    assert!(!h.finder.extract_statistics().is_empty());

    h.finder.tree_search(false).unwrap();
    assert!(h.finder.analysis().is_none());
    assert!(h.finder.routes().is_none());
    assert!(h.finder.extract_statistics().is_empty());
    // Same tree: the second run continued it.
    assert_eq!(h.log.lock().unwrap().selects, 4);
}

#[test]
fn stats_reset_between_runs() {
    let script = Script {
        solved_from: Some(1),
        ..leaf_root(0.9)
    };
    let mut h = harness(
        script,
        Configuration {
            return_first: true,
            ..config(5)
        },
    );
    h.finder.tree_search(false).unwrap();
    assert!(h.finder.search_stats().returned_first);

    h.finder.config_mut().return_first = false;
    h.finder.tree_search(false).unwrap();
    assert!(!h.finder.search_stats().returned_first);
    assert_eq!(h.finder.search_stats().iterations, 5);
}
