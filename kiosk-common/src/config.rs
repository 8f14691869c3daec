//! Configuration file discovery and TOML loading

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a configuration file path came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    /// Path to the TOML file
    pub path: PathBuf,
    /// True when the operator named the file (CLI or environment).
    /// Explicit files must exist; discovered defaults may be absent.
    pub explicit: bool,
}

/// Resolve the configuration file in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Per-user config file (`<config_dir>/<app>/config.toml`)
/// 4. System-wide config file (`/etc/<app>/config.toml`, Linux only)
///
/// Returns None when nothing was named and no default file exists.
pub fn resolve_config_file(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Option<ConfigLocation> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(ConfigLocation {
            path: path.to_path_buf(),
            explicit: true,
        });
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(ConfigLocation {
                path: PathBuf::from(path),
                explicit: true,
            });
        }
    }

    // Priority 3 and 4: platform defaults, first one that exists
    default_config_candidates(app_name)
        .into_iter()
        .find(|candidate| candidate.exists())
        .map(|path| ConfigLocation {
            path,
            explicit: false,
        })
}

/// Platform default config file locations, most specific first
pub fn default_config_candidates(app_name: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(app_name).join("config.toml"));
    }

    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(app_name).join("config.toml"));
    }

    candidates
}

/// Read and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading TOML config from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(toml::from_str(&content)?)
}
