//! Runtime configuration: built-in defaults, then `APPTRACK_*` environment
//! variables, then command-line flags.

use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DB: &str = "APPTRACK_DB";
pub const ENV_LOG: &str = "APPTRACK_LOG";
pub const ENV_LOG_FORMAT: &str = "APPTRACK_LOG_FORMAT";

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid log format '{0}' (expected 'pretty' or 'json')")]
    LogFormat(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::LogFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, which maps variable names to values.
    /// `APPTRACK_LOG` falls back to `RUST_LOG`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(db) = non_empty(ENV_DB) {
            config.database_path = PathBuf::from(db);
        }
        if let Some(filter) = non_empty(ENV_LOG).or_else(|| non_empty("RUST_LOG")) {
            config.log_filter = filter;
        }
        if let Some(format) = non_empty(ENV_LOG_FORMAT) {
            config.log_format = format.parse()?;
        }
        Ok(config)
    }

    /// Applies command-line flags on top.
    pub fn with_overrides(mut self, database_path: Option<PathBuf>, log_format: Option<LogFormat>) -> Self {
        if let Some(path) = database_path {
            self.database_path = path;
        }
        if let Some(format) = log_format {
            self.log_format = format;
        }
        self
    }

    pub fn data_dir(&self) -> PathBuf {
        match self.database_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir().join("apptrack.log")
    }
}

pub fn default_database_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "apptrack") {
        proj_dirs.data_dir().join("apptrack.db")
    } else {
        PathBuf::from("apptrack.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.database_path.ends_with("apptrack.db"));
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(lookup(&[
            (ENV_DB, "/tmp/track/apps.db"),
            (ENV_LOG, "apptrack=debug"),
            (ENV_LOG_FORMAT, "JSON"),
            ("RUST_LOG", "trace"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/track/apps.db"));
        assert_eq!(config.log_filter, "apptrack=debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_file(), PathBuf::from("/tmp/track/apptrack.log"));
    }

    #[test]
    fn rust_log_is_the_fallback_filter() {
        let config = Config::from_lookup(lookup(&[("RUST_LOG", "info"), (ENV_LOG, " ")])).unwrap();
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn bad_log_format_is_rejected() {
        let err = Config::from_lookup(lookup(&[(ENV_LOG_FORMAT, "xml")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid log format 'xml' (expected 'pretty' or 'json')");
    }

    #[test]
    fn flags_win_over_environment() {
        let config = Config::from_lookup(lookup(&[(ENV_DB, "/env.db")]))
            .unwrap()
            .with_overrides(Some(PathBuf::from("cli.db")), Some(LogFormat::Json));
        assert_eq!(config.database_path, PathBuf::from("cli.db"));
        assert_eq!(config.data_dir(), PathBuf::from("."));
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
