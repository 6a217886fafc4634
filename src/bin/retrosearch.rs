//! retrosearch command-line runner
//!
//! Replays a JSON search request, or searches a single SMILES target, with
//! collaborators loaded from a JSON configuration file.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use retrosearch::{RetroFinder, RetroResult, DEFAULT_MIN_NODES, DEFAULT_SCORER};

enum Job {
    Request(PathBuf),
    Smiles(String),
}

/// Command-line options
struct Options {
    config: Option<PathBuf>,
    job: Option<Job>,
    output: Option<PathBuf>,
    progress: bool,
    min_nodes: usize,
    scorer: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            job: None,
            output: None,
            progress: false,
            min_nodes: DEFAULT_MIN_NODES,
            scorer: DEFAULT_SCORER.to_string(),
        }
    }
}

fn usage() {
    println!("retrosearch - budgeted retrosynthesis search");
    println!();
    println!("USAGE:");
    println!("    retrosearch --config <FILE> (--request <FILE> | --smiles <SMILES>) [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>       Configuration document [required]");
    println!("    -r, --request <FILE>      Replay a JSON search request");
    println!("    -s, --smiles <SMILES>     Search a single target");
    println!("    -o, --output <FILE>       Write JSON output to a file instead of stdout");
    println!("        --progress            Report loop progress");
    println!("        --min-nodes <N>       Routes to keep [default: {DEFAULT_MIN_NODES}]");
    println!("        --scorer <NAME>       Ranking scorer [default: {DEFAULT_SCORER}]");
    println!("    -h, --help                Print help information");
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(2);
}

fn value_of(args: &[String], i: usize, flag: &str) -> String {
    args.get(i + 1)
        .cloned()
        .unwrap_or_else(|| fail(&format!("{flag} requires a value")))
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                options.config = Some(PathBuf::from(value_of(&args, i, "--config")));
                i += 2;
            }
            "--request" | "-r" => {
                options.job = Some(Job::Request(PathBuf::from(value_of(&args, i, "--request"))));
                i += 2;
            }
            "--smiles" | "-s" => {
                options.job = Some(Job::Smiles(value_of(&args, i, "--smiles")));
                i += 2;
            }
            "--output" | "-o" => {
                options.output = Some(PathBuf::from(value_of(&args, i, "--output")));
                i += 2;
            }
            "--progress" => {
                options.progress = true;
                i += 1;
            }
            "--min-nodes" => {
                let raw = value_of(&args, i, "--min-nodes");
                options.min_nodes = raw
                    .parse()
                    .unwrap_or_else(|_| fail(&format!("invalid --min-nodes: {raw}")));
                i += 2;
            }
            "--scorer" => {
                options.scorer = value_of(&args, i, "--scorer");
                i += 2;
            }
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            arg => fail(&format!("unknown argument: {arg}")),
        }
    }

    options
}

fn run(options: Options) -> RetroResult<serde_json::Value> {
    let Some(config) = options.config else {
        fail("--config is required");
    };
    let mut finder = RetroFinder::from_config_file(&config)?;

    match options.job {
        Some(Job::Request(path)) => {
            let raw = fs::read_to_string(&path).map_err(|source| retrosearch::ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let request: serde_json::Value =
                serde_json::from_str(&raw).map_err(|e| retrosearch::ConfigError::Parse {
                    message: e.to_string(),
                })?;
            finder.run_from_json(&request)?.to_value()
        }
        Some(Job::Smiles(smiles)) => {
            finder.set_target_smiles(&smiles)?;
            finder.tree_search(options.progress)?;
            finder.build_routes(options.min_nodes, &options.scorer)?;
            let stats = finder.search_stats();
            tracing::info!(
                iterations = stats.iterations,
                time = stats.time,
                "search complete"
            );
            Ok(serde_json::Value::Object(finder.extract_statistics()))
        }
        None => fail("one of --request or --smiles is required"),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args();
    let output = options.output.clone();

    let value = match run(options) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let text = match serde_json::to_string_pretty(&value) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("error: failed to encode output: {err}");
            return ExitCode::FAILURE;
        }
    };

    match output {
        Some(path) => {
            if let Err(err) = fs::write(&path, text) {
                eprintln!("error: failed to write {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        }
        None => println!("{text}"),
    }
    ExitCode::SUCCESS
}
