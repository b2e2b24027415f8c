//! Execute-and-fetch against an open Tiberius session.
//!
//! Statements run as plain SQL batches (`simple_query`), never through
//! `sp_executesql`, so session settings like `SET IMPLICIT_TRANSACTIONS`
//! persist and `@@ROWCOUNT` reflects the caller's statement.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tiberius::Row;

use super::client::MssqlClient;
use super::{Fetched, QuerySession, ShapedExecutor};
use crate::error::RunnerError;
use crate::types::{ResultRows, RowShape, RowValues};

pub(super) struct TiberiusSession {
    conn: MssqlClient,
}

impl TiberiusSession {
    pub(super) fn new(conn: MssqlClient) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ShapedExecutor for TiberiusSession {
    async fn fetch(&mut self, query: &str, shape: RowShape) -> Result<Fetched, RunnerError> {
        let mut stream = self
            .conn
            .simple_query(query)
            .await
            .map_err(|e| RunnerError::query_failure(&e))?;

        let names: Option<Vec<String>> = stream
            .columns()
            .await
            .map_err(|e| RunnerError::query_failure(&e))?
            .map(|columns| columns.iter().map(|c| c.name().to_string()).collect());

        let Some(names) = names else {
            // No result set. Drain the stream, then read the affected count
            // off the session before anything else executes on it.
            stream
                .into_results()
                .await
                .map_err(|e| RunnerError::query_failure(&e))?;
            let affected = probe_rowcount(&mut self.conn).await?;
            return Ok(Fetched::NoResultSet { affected });
        };

        if shape == RowShape::Mapped && names.iter().any(String::is_empty) {
            // Mapping-shaped rows need addressable column names. Drain so the
            // session is clean for the one positional re-run.
            stream
                .into_results()
                .await
                .map_err(|e| RunnerError::query_failure(&e))?;
            return Ok(Fetched::UnnamedColumns);
        }

        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| RunnerError::query_failure(&e))?;

        Ok(Fetched::Rows(shape_rows(&rows, &names, shape)))
    }
}

#[async_trait]
impl QuerySession for TiberiusSession {
    async fn batch(&mut self, batch: &str) -> Result<(), RunnerError> {
        run_batch(&mut self.conn, batch).await
    }

    async fn close(self) -> Result<(), RunnerError> {
        self.conn
            .close()
            .await
            .map_err(|e| RunnerError::ConnectionError(format!("failed to close connection: {e}")))
    }
}

/// Run a housekeeping batch (SET/COMMIT/ROLLBACK) and drain its stream.
async fn run_batch(conn: &mut MssqlClient, batch: &str) -> Result<(), RunnerError> {
    let stream = conn
        .simple_query(batch)
        .await
        .map_err(|e| RunnerError::query_failure(&e))?;
    stream
        .into_results()
        .await
        .map_err(|e| RunnerError::query_failure(&e))?;
    Ok(())
}

/// Affected-row count of the statement that just ran on this session.
async fn probe_rowcount(conn: &mut MssqlClient) -> Result<i64, RunnerError> {
    let stream = conn
        .simple_query("SELECT @@ROWCOUNT")
        .await
        .map_err(|e| RunnerError::query_failure(&e))?;
    let row = stream
        .into_row()
        .await
        .map_err(|e| RunnerError::query_failure(&e))?;
    let affected = row
        .and_then(|r| r.try_get::<i32, _>(0).ok().flatten())
        .unwrap_or(0);
    Ok(i64::from(affected))
}

fn shape_rows(rows: &[Row], names: &[String], shape: RowShape) -> ResultRows {
    match shape {
        RowShape::Mapped => ResultRows::Mapped(
            rows.iter()
                .map(|row| {
                    names
                        .iter()
                        .enumerate()
                        .map(|(idx, name)| (name.clone(), extract_value(row, idx)))
                        .collect()
                })
                .collect(),
        ),
        RowShape::Positional => ResultRows::Positional(
            rows.iter()
                .map(|row| (0..names.len()).map(|idx| extract_value(row, idx)).collect())
                .collect(),
        ),
    }
}

/// Extract a value from a row at a specific index.
///
/// The Tiberius row API is typed per column, so probe the common SQL Server
/// types in order and fall back to NULL for anything unrepresentable.
fn extract_value(row: &Row, idx: usize) -> RowValues {
    if let Ok(Some(val)) = row.try_get::<u8, _>(idx) {
        return RowValues::Int(i64::from(val));
    }

    if let Ok(Some(val)) = row.try_get::<i16, _>(idx) {
        return RowValues::Int(i64::from(val));
    }

    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return RowValues::Int(i64::from(val));
    }

    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return RowValues::Int(val);
    }

    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return RowValues::Float(f64::from(val));
    }

    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return RowValues::Float(val);
    }

    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return RowValues::Bool(val);
    }

    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return RowValues::Timestamp(val);
    }

    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return RowValues::Text(val.to_string());
    }

    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return RowValues::Blob(val.to_vec());
    }

    RowValues::Null
}
