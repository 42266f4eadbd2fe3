//! pgschema-plan CLI
//!
//! A thin front end over [`pgschema_plan::plan`]: load two DDL snapshots
//! with the crate's minimal loader, compute the migration, print the
//! script to stdout. Everything that makes this a database-schema-aware
//! tool (parsing, ordering, emission) lives in the library; this binary
//! only wires files to it, mirroring how the teacher's own binary stayed a
//! thin wrapper over its library crate.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pgschema_plan::ir::Ir;
use pgschema_plan::{plan, IgnoreFile, PlannerConfig, RecordingTracer};

#[derive(Parser, Debug)]
#[command(name = "pgschema-plan")]
#[command(about = "Compute an ordered DDL migration between two PostgreSQL schema snapshots", long_about = None)]
struct Args {
    /// DDL file describing the current schema.
    current: PathBuf,

    /// DDL file describing the desired schema.
    desired: PathBuf,

    /// Path to a PlannerConfig TOML file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to an ignore-file TOML (§6.4).
    #[arg(long)]
    ignore: Option<PathBuf>,

    /// Print each traced decision to stderr as the plan is computed.
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PlannerConfig::from_file(path).context("failed to load planner config")?,
        None => PlannerConfig::default(),
    };

    let ignore = match &args.ignore {
        Some(path) => {
            let text = std::fs::read_to_string(path).context("failed to read ignore file")?;
            IgnoreFile::parse_toml(&text).context("failed to parse ignore file")?
        }
        None => IgnoreFile::new(),
    };

    let current = load_ir(&args.current, &config.target_schema)?;
    let desired = load_ir(&args.desired, &config.target_schema)?;

    let tracer = RecordingTracer::new();
    let output = plan(current, desired, &config, &ignore, &tracer)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to compute migration plan")?;

    if args.trace {
        for event in tracer.events() {
            eprintln!("trace: {event}");
        }
    }

    print!("{}", output.script);
    Ok(())
}

fn load_ir(path: &PathBuf, default_schema: &str) -> Result<Ir> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    pgschema_plan::load::load_sql(&source, default_schema)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("failed to parse {}", path.display()))
}
