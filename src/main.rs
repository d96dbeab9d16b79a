//! closecheck - finds Go values that are opened but never closed
//!
//! # Usage
//!
//! ```bash
//! # Analyze every package below a GOPATH-style source root
//! closecheck run ./src
//!
//! # Only some packages, machine-readable output
//! closecheck run ./src app/... --format json
//!
//! # Reuse facts of already analyzed packages
//! closecheck run ./src app --facts-in deps.facts --facts-out app.facts
//!
//! # Show which functions close what they are given
//! closecheck facts ./src app
//! ```
//!
//! Exit status: 0 when nothing was found, 1 when findings were reported and
//! 2 when loading or configuration failed.

use std::path::{Path, PathBuf};
use std::process;

use analyzer::closecheck::{analyze, summarize_into, FactStore, Finding};
use analyzer::config::{self, Config, OutputFormat};
use analyzer::loader::{Loader, SourceTree};
use analyzer::logging;
use clap::{Args, Parser, Subcommand, ValueEnum};
use diagnostics::{Diagnostics, ErrorFormatter};
use log::LevelFilter;
use source_map::SourceMap;

#[derive(Parser)]
#[command(name = "closecheck")]
#[command(version = "0.1.0")]
#[command(about = "Finds Go values that are opened but never closed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze packages and report leaks
    Run {
        #[command(flatten)]
        target: Target,

        /// Output format (overrides the config file)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Trace every statement the analysis looks at
        #[arg(long)]
        trace: bool,

        /// Maximum summarizer passes (overrides the config file)
        #[arg(long)]
        passes: Option<usize>,

        /// Fact file of previously analyzed packages
        #[arg(long)]
        facts_in: Option<PathBuf>,

        /// Write the facts of this run to a file
        #[arg(long)]
        facts_out: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print the disposer fact of every summarized function
    Facts {
        #[command(flatten)]
        target: Target,

        /// Fact file of previously analyzed packages
        #[arg(long)]
        facts_in: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Target {
    /// Source root; import paths are directories below it
    root: PathBuf,

    /// Package patterns (`app`, `app/...`, `...`); all packages when omitted
    packages: Vec<String>,

    /// Configuration file (defaults to `closecheck.toml` in the root)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Outcome of a command that ran to completion
enum Status {
    Clean,
    Findings,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            target,
            format,
            verbose,
            trace,
            passes,
            facts_in,
            facts_out,
            no_color,
        } => {
            let level = if trace {
                LevelFilter::Trace
            } else if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Warn
            };
            logging::init_with_level(level);

            load_target_config(&target).and_then(|mut config| {
                if let Some(format) = format {
                    config.output.format = format.into();
                }
                if let Some(passes) = passes {
                    config.analysis.max_summary_passes = passes;
                }
                config.analysis.trace |= trace;
                config.output.color &= !no_color;
                config.validate().map_err(|e| format!("[{}] {}", e.code(), e))?;

                run(&target, &config, facts_in.as_deref(), facts_out.as_deref())
            })
        }
        Commands::Facts { target, facts_in } => {
            logging::init_from_env();
            load_target_config(&target).and_then(|config| show_facts(&target, &config, facts_in.as_deref()))
        }
    };

    match result {
        Ok(Status::Clean) => {}
        Ok(Status::Findings) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

fn load_target_config(target: &Target) -> Result<Config, String> {
    let config = match &target.config {
        Some(path) => config::load_config(path),
        None => config::discover(&target.root),
    };
    config.map_err(|e| format!("[{}] {}", e.code(), e))
}

fn fact_store(facts_in: Option<&Path>) -> FactStore {
    match facts_in {
        Some(path) => FactStore::with_fallback(path),
        None => FactStore::new(),
    }
}

/// Load the target packages, printing load diagnostics against their sources
fn load_program(target: &Target, config: &Config) -> Result<analyzer::loader::Program, String> {
    if !target.root.is_dir() {
        return Err(format!("Source root not found: {}", target.root.display()));
    }

    let tree = SourceTree::from_dir(&target.root, &config.load)
        .map_err(|e| format!("[{}] {}", e.code(), e))?;
    let mut loader = Loader::new(config);

    loader.load(&tree, &target.packages).map_err(|e| {
        if let Some(diagnostic) = e.diagnostic() {
            let mut diagnostics = Diagnostics::new();
            diagnostics.push(diagnostic.clone());
            eprintln!("{}", formatter(config).format_diagnostics(&diagnostics, loader.source_map()));
        }
        format!("[{}] {}", e.code(), e)
    })
}

fn formatter(config: &Config) -> ErrorFormatter {
    if config.output.color {
        ErrorFormatter::with_colors()
    } else {
        ErrorFormatter::new()
    }
}

fn run(
    target: &Target,
    config: &Config,
    facts_in: Option<&Path>,
    facts_out: Option<&Path>,
) -> Result<Status, String> {
    let program = load_program(target, config)?;
    let facts = fact_store(facts_in);

    let findings = analyze(&program, &facts, &config.analysis).map_err(|e| e.to_string())?;

    if let Some(path) = facts_out {
        facts
            .save(path)
            .map_err(|e| format!("Failed to write facts to {}: {}", path.display(), e))?;
    }

    match config.output.format {
        OutputFormat::Text => print_text(&findings, &program.source_map, config),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&findings)
                .map_err(|e| format!("Failed to serialize findings: {}", e))?;
            println!("{}", json);
        }
    }

    if findings.is_empty() {
        Ok(Status::Clean)
    } else {
        Ok(Status::Findings)
    }
}

fn print_text(findings: &[Finding], source_map: &SourceMap, config: &Config) {
    let mut diagnostics = Diagnostics::new();
    for finding in findings {
        diagnostics.push(finding.to_diagnostic());
    }

    if !diagnostics.is_empty() {
        println!("{}", formatter(config).format_diagnostics(&diagnostics, source_map));
    }

    match findings.len() {
        0 => println!("No leaks found"),
        1 => println!("1 finding"),
        n => println!("{} findings", n),
    }
}

fn show_facts(target: &Target, config: &Config, facts_in: Option<&Path>) -> Result<Status, String> {
    let program = load_program(target, config)?;
    let facts = fact_store(facts_in);

    let reports = summarize_into(&program, &facts, &config.analysis).map_err(|e| e.to_string())?;

    for (package, report) in &reports {
        let requested = program.package(package).is_some_and(|p| p.requested);
        if !requested {
            continue;
        }
        for (key, fact) in &report.facts {
            let verdict = if fact.is_disposer {
                "disposer"
            } else {
                "not a disposer"
            };
            println!("{}: {}", key, verdict);
        }
    }

    Ok(Status::Clean)
}
