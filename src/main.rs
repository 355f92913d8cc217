//! Biograph - regrouping and statistics over SPARQL result sets
//!
//! This is the command-line entry point. It works on saved SPARQL JSON result
//! documents, which makes it handy for checking a schema against real endpoint
//! output before deploying it.
//!
//! Usage:
//!   biograph regroup --results persons.json --schema config/schemas.json --template search_entities
//!   biograph histogram --results births.json --bins 10
//!   biograph taxonomy --results occupations.json --schema config/schemas.json --template statistics_occupations
//!   biograph validate-schema --schema config/schemas.json

use biograph::{
    core::Row,
    execution::{flattener, regroup},
    parsing::{schema_config::SchemaRegistry, sparql_results::parse_results},
    stats::{
        histogram::{self, BoundaryMode},
        taxonomy::{self, DEFAULT_MAX_DEPTH},
    },
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "biograph")]
#[command(about = "Regroup flat SPARQL results into nested JSON and compute statistics")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regroup a SPARQL JSON result document with a named schema
    Regroup {
        #[arg(short, long)]
        results: PathBuf,
        #[arg(short, long, env = "BIOGRAPH_SCHEMA_FILE")]
        schema: PathBuf,
        #[arg(short, long)]
        template: String,
    },
    /// Bin `date`/`count` rows into an equal-width histogram
    Histogram {
        #[arg(short, long)]
        results: PathBuf,
        #[arg(short, long, default_value = "10")]
        bins: NonZeroU32,
        #[arg(long, default_value = "inclusive")]
        mode: BoundaryMode,
    },
    /// Build an occupation tree from regrouped statistics rows
    Taxonomy {
        #[arg(short, long)]
        results: PathBuf,
        #[arg(short, long, env = "BIOGRAPH_SCHEMA_FILE")]
        schema: PathBuf,
        #[arg(short, long, default_value = "statistics_occupations")]
        template: String,
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },
    /// Load and validate a schema file, listing the templates it configures
    ValidateSchema {
        #[arg(short, long, env = "BIOGRAPH_SCHEMA_FILE")]
        schema: PathBuf,
    },
}

fn read_rows(path: &Path) -> biograph::Result<Vec<Row>> {
    let json = std::fs::read_to_string(path)?;
    flattener::flatten(parse_results(&json)?)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> biograph::Result<()> {
    let out = if pretty { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
    println!("{}", out);
    Ok(())
}

fn run(cli: Cli) -> biograph::Result<()> {
    match cli.command {
        Command::Regroup { results, schema, template } => {
            let schemas = SchemaRegistry::from_file(&schema)?;
            let rows = read_rows(&results)?;
            let objects = regroup::regroup(&rows, schemas.get(&template)?, None)?;
            tracing::info!(rows = rows.len(), objects = objects.len(), "regrouped");
            print_json(&objects, cli.pretty)
        }
        Command::Histogram { results, bins, mode } => {
            let rows = read_rows(&results)?;
            let points = histogram::points_from_rows(&rows)?;
            print_json(&histogram::bin(points, bins, mode)?, cli.pretty)
        }
        Command::Taxonomy { results, schema, template, max_depth } => {
            let schemas = SchemaRegistry::from_file(&schema)?;
            let rows = read_rows(&results)?;
            let grouped = regroup::regroup(&rows, schemas.get(&template)?, None)?;
            let tree = taxonomy::build_tree(taxonomy::entries_from_grouped(&grouped)?, max_depth);
            print_json(&tree, cli.pretty)
        }
        Command::ValidateSchema { schema } => {
            let schemas = SchemaRegistry::from_file(&schema)?;
            for name in schemas.names() {
                println!("{}", name);
            }
            eprintln!("{}: {} schema(s) OK", schema.display(), schemas.len());
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
