use std::fmt;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::error::RunnerError;
use crate::types::RowShape;

/// TDS protocol versions the parameter set accepts. Tiberius negotiates the
/// actual revision during login; the value is validated and logged only.
const SUPPORTED_TDS_VERSIONS: &[&str] = &["7.0", "7.1", "7.1.1", "7.2", "7.3", "7.4"];

const DEFAULT_PORT: u16 = 1433;
const DEFAULT_TDS_VERSION: &str = "7.1";

/// Command-line surface of the runner.
///
/// An orchestration host that already has the parameters as a JSON blob can
/// hand them over in one file via `--args-file`; otherwise each parameter is
/// an individual flag.
#[derive(Parser, Debug)]
#[command(version, about = "Run a single SQL query on a Microsoft SQL Server database")]
pub struct Cli {
    /// Path to a JSON file holding the full parameter set. Overrides all
    /// other flags.
    #[arg(long, value_name = "FILE")]
    pub args_file: Option<PathBuf>,

    /// The host running the database. Empty means the local default.
    #[arg(long, default_value = "")]
    pub login_host: String,

    /// The database port to connect to.
    #[arg(long, alias = "login-port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// The username used to authenticate with.
    #[arg(long, default_value = "")]
    pub login_user: String,

    /// The password used to authenticate with. Never logged.
    #[arg(long, default_value = "")]
    pub login_password: String,

    /// The name of the database.
    #[arg(long, default_value = "")]
    pub db: String,

    /// The SQL query to run. Required unless --args-file is given.
    #[arg(long)]
    pub query: Option<String>,

    /// Commit each statement as it executes instead of one final commit.
    #[arg(long, default_value_t = false)]
    pub autocommit: bool,

    /// The TDS protocol version to use.
    #[arg(long, default_value = DEFAULT_TDS_VERSION)]
    pub tds_version: String,

    /// Return result rows as column-name-to-value mappings.
    #[arg(long, default_value_t = false)]
    pub as_dict: bool,
}

/// One invocation's parameter set. Immutable once constructed.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModuleParams {
    #[serde(default)]
    pub login_host: String,
    #[serde(default = "default_port", alias = "login_port")]
    pub port: u16,
    #[serde(default)]
    pub login_user: String,
    #[serde(default)]
    pub login_password: String,
    #[serde(default)]
    pub db: String,
    pub query: String,
    #[serde(default)]
    pub autocommit: bool,
    #[serde(default = "default_tds_version")]
    pub tds_version: String,
    #[serde(default)]
    pub as_dict: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_tds_version() -> String {
    DEFAULT_TDS_VERSION.to_string()
}

// The password must never reach logs or error output, so Debug is manual.
impl fmt::Debug for ModuleParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleParams")
            .field("login_host", &self.login_host)
            .field("port", &self.port)
            .field("login_user", &self.login_user)
            .field("login_password", &"<redacted>")
            .field("db", &self.db)
            .field("query", &self.query)
            .field("autocommit", &self.autocommit)
            .field("tds_version", &self.tds_version)
            .field("as_dict", &self.as_dict)
            .finish()
    }
}

impl ModuleParams {
    /// Build the parameter set from parsed CLI flags, reading the args file
    /// instead when one was given.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::ConfigError` if the args file cannot be read or
    /// parsed, if `query` is missing, or if the TDS version is unknown.
    pub fn from_cli(cli: Cli) -> Result<Self, RunnerError> {
        let params = if let Some(path) = &cli.args_file {
            let raw = fs::read_to_string(path).map_err(|e| {
                RunnerError::ConfigError(format!(
                    "cannot read args file {}: {e}",
                    path.display()
                ))
            })?;
            serde_json::from_str::<ModuleParams>(&raw).map_err(|e| {
                RunnerError::ConfigError(format!(
                    "cannot parse args file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            let query = cli
                .query
                .ok_or_else(|| RunnerError::ConfigError("query is required".to_string()))?;
            ModuleParams {
                login_host: cli.login_host,
                port: cli.port,
                login_user: cli.login_user,
                login_password: cli.login_password,
                db: cli.db,
                query,
                autocommit: cli.autocommit,
                tds_version: cli.tds_version,
                as_dict: cli.as_dict,
            }
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the parameter set before any connection attempt.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::ConfigError` for an unknown TDS version.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if !SUPPORTED_TDS_VERSIONS.contains(&self.tds_version.as_str()) {
            return Err(RunnerError::ConfigError(format!(
                "unknown TDS version {:?}, expected one of {}",
                self.tds_version,
                SUPPORTED_TDS_VERSIONS.join(", ")
            )));
        }
        Ok(())
    }

    /// Target host, falling back to the local default when unset.
    #[must_use]
    pub fn host(&self) -> &str {
        if self.login_host.is_empty() {
            "localhost"
        } else {
            &self.login_host
        }
    }

    /// The result shape the caller asked for.
    #[must_use]
    pub fn shape(&self) -> RowShape {
        if self.as_dict {
            RowShape::Mapped
        } else {
            RowShape::Positional
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{"query": "SELECT 1"}"#
    }

    #[test]
    fn json_defaults_match_the_contract() {
        let params: ModuleParams = serde_json::from_str(minimal_json()).expect("parses");
        assert_eq!(params.login_host, "");
        assert_eq!(params.port, 1433);
        assert_eq!(params.login_user, "");
        assert_eq!(params.login_password, "");
        assert_eq!(params.db, "");
        assert_eq!(params.query, "SELECT 1");
        assert!(!params.autocommit);
        assert_eq!(params.tds_version, "7.1");
        assert!(!params.as_dict);
        assert_eq!(params.shape(), RowShape::Positional);
        assert_eq!(params.host(), "localhost");
    }

    #[test]
    fn login_port_alias_accepted() {
        let params: ModuleParams =
            serde_json::from_str(r#"{"query": "SELECT 1", "login_port": 1533}"#).expect("parses");
        assert_eq!(params.port, 1533);
    }

    #[test]
    fn unknown_field_rejected() {
        let result =
            serde_json::from_str::<ModuleParams>(r#"{"query": "SELECT 1", "retries": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_tds_version_rejected_before_connecting() {
        let mut params: ModuleParams = serde_json::from_str(minimal_json()).expect("parses");
        params.tds_version = "9.9".to_string();
        let err = params.validate().expect_err("must be rejected");
        assert!(matches!(err, RunnerError::ConfigError(_)));
        assert!(err.to_string().contains("9.9"));
    }

    #[test]
    fn every_supported_tds_version_validates() {
        for version in SUPPORTED_TDS_VERSIONS {
            let mut params: ModuleParams = serde_json::from_str(minimal_json()).expect("parses");
            params.tds_version = (*version).to_string();
            assert!(params.validate().is_ok(), "version {version} rejected");
        }
    }

    #[test]
    fn debug_never_contains_the_password() {
        let mut params: ModuleParams = serde_json::from_str(minimal_json()).expect("parses");
        params.login_password = "s3cret!".to_string();
        let rendered = format!("{params:?}");
        assert!(!rendered.contains("s3cret!"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn as_dict_selects_mapped_shape() {
        let params: ModuleParams =
            serde_json::from_str(r#"{"query": "SELECT 1", "as_dict": true}"#).expect("parses");
        assert_eq!(params.shape(), RowShape::Mapped);
    }

    #[test]
    fn cli_without_query_or_args_file_is_rejected() {
        let cli = Cli::parse_from(["mssql-query"]);
        let err = ModuleParams::from_cli(cli).expect_err("query is required");
        assert!(matches!(err, RunnerError::ConfigError(_)));
    }

    #[test]
    fn cli_flags_build_the_parameter_set() {
        let cli = Cli::parse_from([
            "mssql-query",
            "--login-host",
            "db.example.org",
            "--login-port",
            "1533",
            "--db",
            "master",
            "--query",
            "SELECT 1",
            "--as-dict",
        ]);
        let params = ModuleParams::from_cli(cli).expect("valid");
        assert_eq!(params.login_host, "db.example.org");
        assert_eq!(params.port, 1533);
        assert_eq!(params.db, "master");
        assert!(params.as_dict);
    }
}
