//! ---
//! mvcc_section: "06-operator-cli"
//! mvcc_subsection: "binary"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "The `run` subcommand: plays a scenario in tmux panes."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use mvcc_common::{init_tracing, SlotLayout};
use mvcc_core::{ScenarioRunner, StdoutDots};
use mvcc_host::{EchoGuard, SystemdProbe, TmuxHost};
use tokio::signal;
use tracing::{info, warn};

use crate::{parse_dialect, SourceArgs};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Database dialect: oracle, mysql, postgres, or sqlserver.
    pub dialect: String,
    /// Test id inside the dialect's test section, e.g. `test2`.
    pub test_id: String,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Route T1, T3 and T2 to panes left to right.
    #[arg(long)]
    pub legacy_layout: bool,
    /// Leave sessions open when the run fails.
    #[arg(long)]
    pub keep_sessions: bool,
}

/// Run a scenario and return the process exit code.
pub async fn execute(args: RunArgs) -> Result<i32> {
    let Some(dialect) = parse_dialect(&args.dialect) else {
        return Ok(0);
    };
    let loaded = args.source.load_config()?;
    let mut config = loaded.config;
    if args.legacy_layout {
        config.slot_layout = SlotLayout::Legacy;
    }
    if args.keep_sessions {
        config.teardown_on_failure = false;
    }
    init_tracing("mvccctl", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found, using defaults"),
    }

    let scenario_path = args.source.scenario_path(&config);
    let host = TmuxHost::new(config.tmux_session_name.clone());
    let runner = ScenarioRunner::new(config, host, SystemdProbe::new())
        .with_heartbeat(Arc::new(StdoutDots));

    let cancel = runner.cancel_token();
    let interrupt = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, abandoning run");
            cancel.cancel();
        }
    });
    let echo = EchoGuard::hide();
    let result = runner.run(dialect, &args.test_id, &scenario_path).await;
    drop(echo);
    interrupt.abort();

    match result {
        Ok(outcome) => {
            info!(
                dialect = %outcome.dialect,
                test = %outcome.test_id,
                sessions = outcome.sessions,
                statements = outcome.transcript.sends().len(),
                elapsed_ms = (outcome.finished_at - outcome.started_at).num_milliseconds(),
                "run finished"
            );
            Ok(0)
        }
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:#}", anyhow::Error::new(err));
            Ok(code)
        }
    }
}
