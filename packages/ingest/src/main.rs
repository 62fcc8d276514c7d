#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the task order extraction tool.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use task_orders_cli_utils::{IndicatifProgress, init_logger};
use task_orders_extract::RuleSet;
use task_orders_ingest::{extract_document, paths, run_batch};
use task_orders_models::{Field, TaskOrder};
use task_orders_models::events::LogSink;
use task_orders_store::{MergeOptions, Store, UnkeyedPolicy};

#[derive(Parser)]
#[command(name = "task_orders", about = "Task order PDF extraction tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every PDF in the input directory and merge the records into
    /// the store
    Process {
        /// Directory scanned for PDFs (overrides `TASK_ORDERS_INPUT_DIR`)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Store CSV file (overrides `TASK_ORDERS_STORE`)
        #[arg(long)]
        store: Option<PathBuf>,
        /// TOML rule table to use instead of the built-in one
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Append records that have no task order number instead of
        /// skipping them
        #[arg(long)]
        allow_unkeyed: bool,
    },
    /// Extract a single PDF and print the record as JSON. The store is not
    /// touched.
    Extract {
        /// PDF to extract
        pdf: PathBuf,
        /// TOML rule table to use instead of the built-in one
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Print the stored task orders
    Show {
        /// Store CSV file (overrides `TASK_ORDERS_STORE`)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Print the active rule table as TOML
    Rules {
        /// TOML rule table to use instead of the built-in one
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            store,
            rules,
            allow_unkeyed,
        } => {
            let rules = load_rules(rules.as_deref())?;
            let input_dir = paths::resolve_input_dir(input);
            let store_path = paths::resolve_store_path(store);
            let options = MergeOptions {
                unkeyed: if allow_unkeyed {
                    UnkeyedPolicy::Append
                } else {
                    UnkeyedPolicy::Reject
                },
            };

            let progress = IndicatifProgress::documents_bar(&multi, "Scanning input...");
            let summary = run_batch(
                &input_dir,
                &store_path,
                &rules,
                &options,
                &LogSink,
                &progress,
            )?;

            println!();
            println!("Documents:       {}", summary.documents);
            println!("Inserted:        {}", summary.inserted);
            println!("Already stored:  {}", summary.duplicates);
            println!("Skipped unkeyed: {}", summary.skipped_unkeyed);
            println!("Failed:          {}", summary.failed.len());
            for failed in &summary.failed {
                println!("  {}: {}", failed.path.display(), failed.error);
            }
            println!("Store:           {}", store_path.display());
            println!("Elapsed:         {:.1}s", summary.duration.as_secs_f64());
        }
        Commands::Extract { pdf, rules } => {
            let rules = load_rules(rules.as_deref())?;
            let record = extract_document(&pdf, &rules, &LogSink)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Show { store } => {
            let store_path = paths::resolve_store_path(store);
            let store = Store::load(&store_path)?;
            if store.is_empty() {
                println!("No task orders in {}", store_path.display());
            } else {
                print_table(&store);
            }
        }
        Commands::Rules { rules } => {
            let rules = load_rules(rules.as_deref())?;
            print!("{}", toml::to_string_pretty(&rules.to_definitions())?);
        }
    }

    Ok(())
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet, task_orders_extract::RuleError> {
    path.map_or_else(
        || Ok(RuleSet::default_rules()),
        |path| {
            log::info!("Loading rules from {}", path.display());
            RuleSet::load(path)
        },
    )
}

fn print_table(store: &Store) {
    let headers = Field::headers();
    let rows: Vec<Vec<String>> = store.rows().iter().map(TaskOrder::cells).collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let line = |cells: &[&str]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    println!("{}", line(&headers));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        println!("{}", line(&cells));
    }
    println!();
    println!("{} task order(s)", rows.len());
}
