//! Nuru blocklist CLI
//!
//! Operator tool for inspecting and managing the blocklist engine's
//! on-disk state, and for compiling filter lists offline.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use env_logger::Env;

use nb_compiler::RuleStoreBuilder;
use nb_engine::{BlocklistEngine, EngineConfig, LoadReport};

#[derive(Parser)]
#[command(name = "nb-cli")]
#[command(about = "Nuru Browser blocklist engine tools")]
struct Cli {
    /// Storage root holding the list cache and custom filters
    #[arg(short, long, global = true, default_value = ".nuru")]
    storage: PathBuf,

    /// JSON engine config; overrides --storage
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the lists and evaluate URLs
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Re-download every list, ignoring the cache
    Update,

    /// Add a custom filter rule
    Add { rule: String },

    /// Remove a custom filter by id
    Remove { id: String },

    /// List custom filters
    List,

    /// Enable blocking
    Enable,

    /// Disable blocking
    Disable,

    /// Print statistics and rule counts as JSON
    Stats,

    /// Parse local filter lists without touching the engine's storage
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// URLs to evaluate against the compiled rules
        #[arg(short, long)]
        url: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Compile { input, url } => cmd_compile(&input, &url),
        command => load_config(&cli.storage, cli.config.as_deref()).and_then(|config| run_engine(config, command)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(storage: &Path, config: Option<&Path>) -> Result<EngineConfig, String> {
    match config {
        Some(path) => EngineConfig::from_json_file(path).map_err(|e| e.to_string()),
        None => Ok(EngineConfig::new(storage)),
    }
}

fn run_engine(config: EngineConfig, command: Commands) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(run_engine_async(config, command))
}

async fn run_engine_async(config: EngineConfig, command: Commands) -> Result<(), String> {
    let engine = BlocklistEngine::with_http(config).map_err(|e| e.to_string())?;
    let report = engine
        .initialize()
        .await
        .map_err(|e| format!("Engine initialization failed: {}", e))?;

    match command {
        Commands::Check { urls } => {
            if !engine.is_enabled() {
                println!("Blocking is disabled; every request is allowed");
            }
            for url in &urls {
                println!("{:<14} {}", engine.evaluate(url).to_string(), url);
            }
            let stats = engine.get_statistics();
            println!();
            println!("Checked {} URLs, {} blocked ({})", stats.total, stats.blocked, stats.block_rate);
        }
        Commands::Update => {
            let report = engine.force_update().await;
            print_report(&report);
        }
        Commands::Add { rule } => {
            let id = engine.add_custom_filter(&rule).await.map_err(|e| e.to_string())?;
            println!("Added custom filter {}", id);
        }
        Commands::Remove { id } => {
            engine.remove_custom_filter(&id).await.map_err(|e| e.to_string())?;
            println!("Removed custom filter {}", id);
        }
        Commands::List => {
            let entries = engine.custom_filters().await;
            if entries.is_empty() {
                println!("No custom filters");
            }
            for entry in entries {
                let state = if entry.enabled { "on" } else { "off" };
                println!("{:<24} {:<4} {}", entry.id, state, entry.rule);
            }
        }
        Commands::Enable => {
            engine.set_enabled(true);
            println!("Blocking enabled");
        }
        Commands::Disable => {
            engine.set_enabled(false);
            println!("Blocking disabled");
        }
        Commands::Stats => {
            let counts = report.counts;
            let json = serde_json::json!({
                "enabled": engine.is_enabled(),
                "domains": counts.domains,
                "patterns": counts.patterns,
                "statistics": engine.get_statistics(),
            });
            let text = serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?;
            println!("{}", text);
        }
        Commands::Compile { .. } => return Err("compile runs without the engine".to_string()),
    }

    Ok(())
}

fn print_report(report: &LoadReport) {
    for list in &report.lists {
        println!(
            "  {:<16} {:?}: {} lines, {} domains, {} patterns, {} skipped",
            list.name, list.outcome, list.stats.lines, list.stats.domains, list.stats.patterns, list.stats.skipped
        );
    }
    if report.custom.lines > 0 {
        println!(
            "  {:<16} {} domains, {} patterns",
            "custom", report.custom.domains, report.custom.patterns
        );
    }
    println!(
        "Loaded {} domains, {} patterns",
        report.counts.domains, report.counts.patterns
    );
}

fn cmd_compile(inputs: &[String], urls: &[String]) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut builder = RuleStoreBuilder::new();
    let mut total_lines = 0usize;
    let mut total_invalid = 0usize;

    for (list_id, path) in inputs.iter().enumerate() {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

        let name = Path::new(path).file_name().unwrap_or_default().to_string_lossy();
        let stats = builder.add_list(&name, &content);
        total_lines += stats.lines;
        total_invalid += stats.invalid;

        println!(
            "  [{}] {} - {} lines, {} domains, {} patterns, {} skipped",
            list_id, name, stats.lines, stats.domains, stats.patterns, stats.skipped
        );
    }

    let parse_time = start.elapsed();
    let store = builder.build();
    let counts = store.counts();

    println!("Compiled {} filter lists", inputs.len());
    println!("  Lines:    {}", total_lines);
    println!("  Domains:  {}", counts.domains);
    println!("  Patterns: {} ({} failed to compile)", counts.patterns, total_invalid);
    println!("  Time:     {:.1}ms", parse_time.as_secs_f64() * 1000.0);

    if !urls.is_empty() {
        println!();
        for url in urls {
            println!("{:<14} {}", store.evaluate(url).to_string(), url);
        }
    }

    Ok(())
}
