//! Binary entry point: parse parameters, run the query, emit the outcome.
//!
//! Exactly one JSON document goes to stdout; logs go to stderr so the
//! calling host can consume stdout as the outcome payload.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mssql_query::params::{Cli, ModuleParams};
use mssql_query::{report, runner};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(run_invocation().await);
}

async fn run_invocation() -> i32 {
    let mut stdout = std::io::stdout();

    // Capability check comes before any parameter processing.
    if let Err(err) = runner::capability_check() {
        let _ = report::emit_failure(&mut stdout, &err);
        return 1;
    }

    let cli = Cli::parse();
    let params = match ModuleParams::from_cli(cli) {
        Ok(params) => params,
        Err(err) => {
            tracing::error!(error = %err, "invalid parameters");
            let _ = report::emit_failure(&mut stdout, &err);
            return 1;
        }
    };

    match runner::run(&params).await {
        Ok(outcome) => {
            tracing::debug!(
                changed = outcome.changed,
                rowcount = outcome.rowcount,
                "query completed"
            );
            match report::emit_success(&mut stdout, &outcome) {
                Ok(()) => 0,
                Err(_) => 1,
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "invocation failed");
            let _ = report::emit_failure(&mut stdout, &err);
            1
        }
    }
}
