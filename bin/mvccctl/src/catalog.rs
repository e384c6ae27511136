//! ---
//! mvcc_section: "06-operator-cli"
//! mvcc_subsection: "binary"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Read-only scenario listing and step plans."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use mvcc_common::{Dialect, RunnerConfig};
use mvcc_core::assign_slots;
use mvcc_logging as logging;
use mvcc_scenario::{list_tests, parse, LoadedScenario};

use crate::{parse_dialect, SourceArgs};

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Database dialect: oracle, mysql, postgres, or sqlserver.
    pub dialect: String,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Print the listing as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Database dialect: oracle, mysql, postgres, or sqlserver.
    pub dialect: String,
    /// Test id inside the dialect's test section, e.g. `test2`.
    pub test_id: String,
    #[command(flatten)]
    pub source: SourceArgs,
}

fn read_scenario(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("cannot read scenario file {}", path.display()))
}

pub fn list(args: ListArgs) -> Result<()> {
    logging::init();
    let Some(dialect) = parse_dialect(&args.dialect) else {
        return Ok(());
    };
    let config = args.source.load_config()?.config;
    let path = args.source.scenario_path(&config);
    let raw = read_scenario(&path)?;
    let tests = list_tests(&raw, dialect)
        .with_context(|| format!("cannot list {dialect} tests in {}", path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tests)?);
    } else {
        for test in &tests {
            println!("{test}");
        }
    }
    Ok(())
}

pub fn show(args: ShowArgs) -> Result<()> {
    logging::init();
    let Some(dialect) = parse_dialect(&args.dialect) else {
        return Ok(());
    };
    let config = args.source.load_config()?.config;
    let path = args.source.scenario_path(&config);
    let raw = read_scenario(&path)?;
    let loaded = parse(&raw, dialect, &args.test_id)?;
    print!("{}", render_plan(dialect, &loaded, &config)?);
    Ok(())
}

fn render_plan(dialect: Dialect, loaded: &LoadedScenario, config: &RunnerConfig) -> Result<String> {
    use std::fmt::Write;

    let scenario = &loaded.scenario;
    let profile = dialect.profile();
    let routes = assign_slots(&scenario.transactions, config.slot_layout)
        .with_context(|| format!("cannot route {}", scenario.test_id))?;
    let mut out = String::new();

    let _ = writeln!(out, "{} {}  {}", dialect, scenario.test_id, scenario.comment);
    let _ = writeln!(
        out,
        "connect: {}",
        profile.masked_connection_command(&loaded.connection)
    );
    let sessions: Vec<String> = routes
        .iter()
        .map(|(tag, slot)| format!("{tag} -> session {slot}"))
        .collect();
    let _ = writeln!(out, "sessions: {}", sessions.join(", "));
    for step in &scenario.steps {
        let slot = routes.get(&step.transaction).copied().unwrap_or_default();
        let _ = writeln!(out, "  {} [{} @ session {slot}]", step.key, step.transaction);
        for statement in &step.statements {
            let _ = writeln!(out, "      {statement}");
        }
    }
    Ok(out)
}
