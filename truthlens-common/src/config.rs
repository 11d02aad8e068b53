//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "TRUTHLENS_ROOT";

/// Environment variable carrying the generation-API key.
///
/// Absence is a valid, handled configuration: the forensic analyzer falls
/// back to its deterministic estimate instead of erroring.
pub const GENERATION_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Runtime configuration for the Truthlens server.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Data root folder; the SQLite database lives here
    pub root_folder: PathBuf,
    /// HTTP listen port
    pub port: u16,
    /// Generation-API key; None triggers the deterministic fallback path
    pub generation_api_key: Option<String>,
    /// Hours before an AI-only analysis is considered stale
    pub staleness_hours: i64,
}

impl ServiceConfig {
    /// Resolve configuration from CLI arguments and the environment.
    pub fn resolve(cli_root: Option<&str>, cli_port: Option<u16>) -> Result<Self> {
        let root_folder = resolve_root_folder(cli_root, ROOT_FOLDER_ENV)?;

        let port = match cli_port {
            Some(p) => p,
            None => match std::env::var("TRUTHLENS_PORT") {
                Ok(v) => v.parse().map_err(|e| {
                    Error::Config(format!("Invalid TRUTHLENS_PORT value: {}", e))
                })?,
                Err(_) => 5750,
            },
        };

        let generation_api_key = match std::env::var(GENERATION_API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Some(key),
            _ => {
                info!(
                    "{} not set; forensic analyzer will use deterministic fallback",
                    GENERATION_API_KEY_ENV
                );
                None
            }
        };

        let staleness_hours = match std::env::var("TRUTHLENS_STALENESS_HOURS") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                warn!("Invalid TRUTHLENS_STALENESS_HOURS value ({}), using 24", e);
                24
            }),
            Err(_) => 24,
        };

        Ok(Self {
            root_folder,
            port,
            generation_api_key,
            staleness_hours,
        })
    }

    /// Path of the SQLite database inside the root folder.
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("truthlens.db")
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_root_folder())
}

/// Get configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("truthlens").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/truthlens/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("truthlens"))
        .unwrap_or_else(|| PathBuf::from("./truthlens_data"))
}

/// Ensure the root folder exists, creating it if needed.
pub fn ensure_root_folder(root: &PathBuf) -> Result<()> {
    if !root.exists() {
        info!("Creating root folder: {}", root.display());
        std::fs::create_dir_all(root)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cli_argument_wins_over_environment() {
        std::env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
        let resolved = resolve_root_folder(Some("/tmp/from-cli"), ROOT_FOLDER_ENV).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));
        std::env::remove_var(ROOT_FOLDER_ENV);
    }

    #[test]
    #[serial]
    fn environment_wins_over_default() {
        std::env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
        let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/from-env"));
        std::env::remove_var(ROOT_FOLDER_ENV);
    }

    #[test]
    #[serial]
    fn missing_generation_key_is_valid_config() {
        std::env::remove_var(GENERATION_API_KEY_ENV);
        std::env::remove_var(ROOT_FOLDER_ENV);
        let config = ServiceConfig::resolve(Some("/tmp/truthlens-test"), Some(0)).unwrap();
        assert!(config.generation_api_key.is_none());
        assert_eq!(config.staleness_hours, 24);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/truthlens-test/truthlens.db")
        );
    }
}
