//! Huly MCP server binary.
//!
//! This binary runs the MCP server using stdio transport. Settings come from
//! flags or the matching `HULY_*` environment variables.

use clap::Parser;
use huly_mcp::HulyMcpServer;
use huly_tracker::backend::rest::RestConnector;
use huly_tracker::{ConnectionManager, HulyConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Raw settings. Validation and defaults live in [`HulyConfig::from_lookup`].
#[derive(Debug, Parser)]
#[command(name = "huly-mcp", version, about = "MCP server for the Huly issue tracker")]
struct Cli {
    /// Platform base URL [default: https://huly.app].
    #[arg(long, env = "HULY_URL")]
    url: Option<String>,

    /// Workspace identifier.
    #[arg(long, env = "HULY_WORKSPACE")]
    workspace: Option<String>,

    /// Pre-issued bearer token.
    #[arg(long, env = "HULY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Account email, used with --password when no token is given.
    #[arg(long, env = "HULY_EMAIL")]
    email: Option<String>,

    /// Account password.
    #[arg(long, env = "HULY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Seconds allowed for establishing the backend session [default: 30].
    #[arg(long, env = "HULY_CONNECT_TIMEOUT_SECS")]
    connect_timeout_secs: Option<String>,
}

impl Cli {
    fn setting(&self, key: &str) -> Option<String> {
        match key {
            "HULY_URL" => self.url.clone(),
            "HULY_WORKSPACE" => self.workspace.clone(),
            "HULY_TOKEN" => self.token.clone(),
            "HULY_EMAIL" => self.email.clone(),
            "HULY_PASSWORD" => self.password.clone(),
            "HULY_CONNECT_TIMEOUT_SECS" => self.connect_timeout_secs.clone(),
            _ => None,
        }
    }

    fn into_config(self) -> huly_tracker::Result<HulyConfig> {
        HulyConfig::from_lookup(|key| self.setting(key))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // A panicking tool task is logged; the server keeps serving.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("Panic: {info}");
    }));

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    tracing::info!(url = %config.url, workspace = %config.workspace, "Starting huly-mcp server");
    let connection = Arc::new(ConnectionManager::new(config, Arc::new(RestConnector::new())));
    let server = HulyMcpServer::new(Arc::clone(&connection));

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
    }

    connection.release().await?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use huly_tracker::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_URL};
    use huly_tracker::{Credentials, Error};
    use rstest::rstest;
    use std::time::Duration;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["huly-mcp"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_blank_url_flag_takes_default() {
        let config = cli(&["--url", "", "--workspace", "ws", "--token", "t"])
            .into_config()
            .unwrap();

        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.credentials, Some(Credentials::Token("t".to_string())));
    }

    #[test]
    fn test_flags_reach_config() {
        let config = cli(&[
            "--url",
            "https://example.test/",
            "--workspace",
            "ws",
            "--email",
            "a@b.c",
            "--password",
            "pw",
            "--connect-timeout-secs",
            "5",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.url, "https://example.test");
        assert_eq!(config.workspace, "ws");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(matches!(config.credentials, Some(Credentials::Password { .. })));
    }

    #[rstest]
    #[case::no_workspace(&["--token", "t"])]
    #[case::bad_timeout(&["--workspace", "ws", "--token", "t", "--connect-timeout-secs", "soon"])]
    fn test_invalid_flags_are_configuration_errors(#[case] args: &[&str]) {
        let err = cli(args).into_config().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
    }
}
