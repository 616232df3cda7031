//! Configuration loading and database path resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Default TCP port for the rating service
pub const DEFAULT_PORT: u16 = 5730;

/// Database path resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`database` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(database) = config.get("database").and_then(|v| v.as_str()) {
                    return PathBuf::from(database);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_database_path()
}

/// Port resolution following the same priority order as the database path.
/// Invalid values fall through to the next tier.
pub fn resolve_port(cli_arg: Option<u16>, env_var_name: &str) -> u16 {
    if let Some(port) = cli_arg {
        return port;
    }

    if let Ok(value) = std::env::var(env_var_name) {
        if let Ok(port) = value.parse::<u16>() {
            return port;
        }
    }

    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(port) = config.get("port").and_then(|v| v.as_integer()) {
                    if let Ok(port) = u16::try_from(port) {
                        return port;
                    }
                }
            }
        }
    }

    DEFAULT_PORT
}

/// Get the configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("matchup").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/matchup/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default database path: the platform data directory,
/// falling back to the working directory when none is defined.
fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("matchup").join("matchup.db"))
        .unwrap_or_else(|| PathBuf::from("matchup.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let path = resolve_database_path(Some("/tmp/explicit.db"), "MATCHUP_TEST_UNSET_VAR");
        assert_eq!(path, PathBuf::from("/tmp/explicit.db"));
    }

    #[test]
    fn default_port_when_nothing_set() {
        assert_eq!(resolve_port(None, "MATCHUP_TEST_UNSET_PORT"), DEFAULT_PORT);
    }

    #[test]
    fn cli_port_wins() {
        assert_eq!(resolve_port(Some(9999), "MATCHUP_TEST_UNSET_PORT"), 9999);
    }
}
