//! The query runner: one connection, one statement, one outcome.
//!
//! The driver sits behind two seams: [`ShapedExecutor`] for execute/fetch and
//! [`QuerySession`] for the housekeeping batches and the final close. Both
//! are traits so the shape-negotiation fallback, the changed/rowcount policy,
//! and the session lifecycle can be tested without a live server.

#[cfg(feature = "mssql")]
pub mod client;
#[cfg(feature = "mssql")]
mod query;

use async_trait::async_trait;

use crate::error::RunnerError;
use crate::params::ModuleParams;
use crate::types::{QueryOutcome, ResultRows, RowShape};

/// What one execute/fetch attempt produced.
#[derive(Debug)]
pub enum Fetched {
    /// The statement returned a result set, fetched in the requested shape.
    /// Statements that both mutate and return rows (`OUTPUT` clauses) land
    /// here too and are reported as unchanged reads.
    Rows(ResultRows),
    /// The statement produced no result set; `affected` is the session's
    /// reported affected-row count.
    NoResultSet { affected: i64 },
    /// Mapping-shaped fetch was requested but the result has columns without
    /// addressable names. The session has been drained and is clean for a
    /// re-run.
    UnnamedColumns,
}

/// One execute-and-fetch attempt against an open session.
#[async_trait]
pub trait ShapedExecutor {
    async fn fetch(&mut self, query: &str, shape: RowShape) -> Result<Fetched, RunnerError>;
}

/// A connected session: execute/fetch plus the housekeeping surface the
/// runner drives around the statement.
#[async_trait]
pub trait QuerySession: ShapedExecutor {
    /// Run a housekeeping batch (SET/COMMIT/ROLLBACK) and drain its stream.
    async fn batch(&mut self, batch: &str) -> Result<(), RunnerError>;

    /// Close the session. Takes the session by value, so a session can be
    /// closed at most once.
    async fn close(self) -> Result<(), RunnerError>
    where
        Self: Sized;
}

/// Fail fast when the driver backend is not compiled in. Called before any
/// parameter processing.
///
/// # Errors
///
/// Returns `RunnerError::MissingDependency` when built without the `mssql`
/// feature.
pub fn capability_check() -> Result<(), RunnerError> {
    #[cfg(feature = "mssql")]
    {
        Ok(())
    }
    #[cfg(not(feature = "mssql"))]
    {
        Err(RunnerError::MissingDependency)
    }
}

/// Execute the statement with at most one shape-negotiation fallback.
///
/// Attempt one uses the caller's requested shape. If the result has columns
/// without names and mappings were requested, the statement is re-run once
/// with positional rows forced. There is no further fallback.
///
/// # Errors
///
/// Returns `RunnerError::QueryError` for any driver failure other than the
/// two benign conditions, or when the second attempt still cannot name its
/// columns.
pub async fn run_query<E: ShapedExecutor + Send>(
    executor: &mut E,
    query: &str,
    requested: RowShape,
) -> Result<QueryOutcome, RunnerError> {
    match executor.fetch(query, requested).await? {
        Fetched::Rows(rows) => Ok(row_outcome(rows)),
        Fetched::NoResultSet { affected } => Ok(affected_outcome(affected, requested)),
        Fetched::UnnamedColumns => {
            tracing::debug!("result columns carry no names; re-running with positional rows");
            match executor.fetch(query, RowShape::Positional).await? {
                Fetched::Rows(rows) => Ok(row_outcome(rows)),
                Fetched::NoResultSet { affected } => {
                    Ok(affected_outcome(affected, RowShape::Positional))
                }
                Fetched::UnnamedColumns => Err(RunnerError::QueryError {
                    message: "driver reported unnamed columns for positional rows".to_string(),
                    errno: None,
                }),
            }
        }
    }
}

// A result set marks the invocation as a read: fetched rows never count as a
// data change.
fn row_outcome(rows: ResultRows) -> QueryOutcome {
    QueryOutcome {
        changed: false,
        rowcount: i64::try_from(rows.len()).unwrap_or(i64::MAX),
        rows,
    }
}

fn affected_outcome(affected: i64, shape: RowShape) -> QueryOutcome {
    QueryOutcome {
        changed: affected != 0,
        rowcount: affected,
        rows: ResultRows::empty(shape),
    }
}

/// Run one invocation end to end: connect, set autocommit behavior, execute
/// with the fallback, commit, close, and return the outcome.
///
/// A connect failure surfaces before any session exists, so nothing is
/// executed and nothing is closed on that path.
///
/// # Errors
///
/// Returns `RunnerError::ConnectionError` if the connection cannot be
/// established and `RunnerError::QueryError` for execute/fetch failures.
#[cfg(feature = "mssql")]
pub async fn run(params: &ModuleParams) -> Result<QueryOutcome, RunnerError> {
    params.validate()?;

    tracing::debug!(
        host = params.host(),
        port = params.port,
        db = %params.db,
        user = %params.login_user,
        "connecting"
    );
    let conn = client::connect(params).await?;

    run_session(query::TiberiusSession::new(conn), params).await
}

#[cfg(not(feature = "mssql"))]
pub async fn run(_params: &ModuleParams) -> Result<QueryOutcome, RunnerError> {
    Err(RunnerError::MissingDependency)
}

/// Drive an established session to an outcome, then close it exactly once —
/// on the success path and on every failure path alike.
///
/// # Errors
///
/// Propagates the first fatal error from the execute/commit cycle; a close
/// failure is logged, not surfaced, since the outcome is already decided.
pub async fn run_session<S: QuerySession + Send>(
    mut session: S,
    params: &ModuleParams,
) -> Result<QueryOutcome, RunnerError> {
    let result = drive(&mut session, params).await;

    // Closed is always entered once Connected was reached.
    if let Err(err) = session.close().await {
        tracing::debug!(error = %err, "connection close reported an error");
    }

    result
}

async fn drive<S: QuerySession + Send>(
    session: &mut S,
    params: &ModuleParams,
) -> Result<QueryOutcome, RunnerError> {
    if !params.autocommit {
        // Session-level autocommit off; the final commit below closes the
        // implicit transaction.
        session.batch("SET IMPLICIT_TRANSACTIONS ON").await?;
    }

    match run_query(session, &params.query, params.shape()).await {
        Ok(outcome) => {
            session.batch("IF @@TRANCOUNT > 0 COMMIT TRANSACTION").await?;
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback_err) = session
                .batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")
                .await
            {
                tracing::debug!(error = %rollback_err, "rollback after failed query also failed");
            }
            Err(err)
        }
    }
}
