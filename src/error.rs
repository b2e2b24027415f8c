use thiserror::Error;

/// Everything that can make an invocation fail.
///
/// The two benign driver conditions (no result set, unnamed columns) are not
/// represented here; they are handled inside the runner and never surface to
/// the caller as errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("the tiberius SQL Server driver is not compiled into this build")]
    MissingDependency,

    #[error("Invalid parameters: {0}")]
    ConfigError(String),

    #[error("Unable to connect to database: {0}")]
    ConnectionError(String),

    #[error("Unable to execute query: {message}")]
    QueryError {
        message: String,
        /// Numeric error code from the server error token, when the driver
        /// supplied one.
        errno: Option<u32>,
    },
}

impl RunnerError {
    #[must_use]
    pub fn errno(&self) -> Option<u32> {
        match self {
            RunnerError::QueryError { errno, .. } => *errno,
            _ => None,
        }
    }
}

#[cfg(feature = "mssql")]
impl RunnerError {
    /// Map a driver error raised during execute/fetch to a `QueryError`,
    /// pulling the numeric code out of server error tokens.
    pub(crate) fn query_failure(err: &tiberius::error::Error) -> Self {
        let errno = match err {
            tiberius::error::Error::Server(token) => Some(token.code()),
            _ => None,
        };
        RunnerError::QueryError {
            message: err.to_string(),
            errno,
        }
    }

    /// Map a driver error raised while establishing the connection.
    pub(crate) fn connect_failure(err: &tiberius::error::Error) -> Self {
        RunnerError::ConnectionError(err.to_string())
    }
}
