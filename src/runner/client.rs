//! Tiberius connection setup.

use std::net::ToSocketAddrs;

use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::RunnerError;
use crate::params::ModuleParams;

/// Type alias for the SQL Server client over a Tokio TCP stream.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open the single connection for this invocation.
///
/// # Errors
///
/// Returns `RunnerError::ConnectionError` if address resolution, the TCP
/// connect, or the TDS login fails. No retry is attempted.
pub async fn connect(params: &ModuleParams) -> Result<MssqlClient, RunnerError> {
    let mut config = Config::new();
    config.host(params.host());
    config.port(params.port);
    if !params.db.is_empty() {
        config.database(&params.db);
    }
    config.authentication(AuthMethod::sql_server(
        &params.login_user,
        &params.login_password,
    ));
    config.trust_cert();

    // Tiberius negotiates the TDS revision during login; the requested
    // version was validated earlier and is logged for the operator only.
    tracing::debug!(tds_version = %params.tds_version, "requested TDS version");

    let addr_iter = (params.host(), params.port).to_socket_addrs().map_err(|e| {
        RunnerError::ConnectionError(format!("failed to resolve server address: {e}"))
    })?;

    let server_addr = addr_iter.into_iter().next().ok_or_else(|| {
        RunnerError::ConnectionError(format!("no valid address found for {}", params.host()))
    })?;

    let tcp = TcpStream::connect(server_addr)
        .await
        .map_err(|e| RunnerError::ConnectionError(format!("TCP connection error: {e}")))?;

    let tcp = tcp.compat_write();

    Client::connect(config, tcp)
        .await
        .map_err(|e| RunnerError::connect_failure(&e))
}
