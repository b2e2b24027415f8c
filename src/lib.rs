//! Single-shot SQL Server query runner for automation hosts.
//!
//! Opens one connection with the supplied credentials, executes one
//! caller-supplied statement, and reports a single structured outcome:
//! `{changed, result, rowcount}` on success or `{failed, msg, errno?}` on
//! failure. Result rows come back either mapping-shaped (column name to
//! value) or sequence-shaped (positional), with one automatic fallback from
//! mapping-shaped to sequence-shaped when the result's columns carry no
//! names.
//!
//! The connection is used exactly once and closed on every path reached
//! after it was opened. No pooling, no retries, no partial success.

pub mod error;
pub mod params;
pub mod report;
pub mod runner;
pub mod types;

pub use error::RunnerError;
pub use params::{Cli, ModuleParams};
pub use runner::{
    Fetched, QuerySession, ShapedExecutor, capability_check, run, run_query, run_session,
};
pub use types::{QueryOutcome, ResultRows, RowShape, RowValues};
