/*!
 * CLI command handlers
 *
 * Each handler renders its own result (human tables or one JSON line) and
 * returns the process exit code. Errors returned as `Err` are setup failures
 * the caller reports.
 */

pub mod check;
pub mod credentials;
pub mod e2e;
pub mod health;
pub mod show_config;

use crate::config::{DsxConfig, LogLevel};
use crate::error::Result;
use crate::http::{BlockingHttpClient, HttpClient};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings from global CLI flags that override the configuration
#[derive(Debug, Clone, Default)]
pub struct GlobalOverrides {
    pub log_level: Option<LogLevel>,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

/// Resolve the configuration: file (or defaults), then environment, then flags
pub fn load_config(path: Option<&Path>, overrides: &GlobalOverrides) -> anyhow::Result<DsxConfig> {
    let mut config = match path {
        Some(path) => DsxConfig::from_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => DsxConfig::default(),
    };

    config
        .apply_process_env()
        .context("invalid environment override")?;

    if let Some(level) = overrides.log_level {
        config.log_level = level;
    }
    if overrides.log_file.is_some() {
        config.log_file = overrides.log_file.clone();
    }
    config.verbose |= overrides.verbose;

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Production HTTP transport for `config`
pub fn http_client(config: &DsxConfig) -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(BlockingHttpClient::new(config.http.request_timeout())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsx.toml");
        std::fs::write(
            &path,
            "log_level = \"warn\"\n[transaction]\ntarget_asset_id = \"asset-7\"\n",
        )
        .unwrap();

        let overrides = GlobalOverrides {
            log_level: Some(LogLevel::Trace),
            log_file: None,
            verbose: true,
        };
        let config = load_config(Some(&path), &overrides).unwrap();
        assert_eq!(config.log_level, LogLevel::Trace);
        assert!(config.verbose);
        assert_eq!(config.transaction.target_asset_id, "asset-7");
    }

    #[test]
    fn test_load_config_reports_file() {
        let err = load_config(Some(Path::new("/nonexistent/dsx.toml")), &GlobalOverrides::default())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/dsx.toml"));
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsx.toml");
        std::fs::write(&path, "[polling.transfer]\nmax_attempts = 0\ninterval_secs = 2\n").unwrap();

        let err = load_config(Some(&path), &GlobalOverrides::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid configuration"));
    }
}
