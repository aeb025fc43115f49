//! Configuration loader
//!
//! Loads [`SiiConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If `SII_ENVIRONMENT` is set, loads from environment variables and
//!    fails on any invalid value
//! 2. Otherwise falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. With no file found, uses the built-in defaults
//!
//! ## Environment Variables
//! - `SII_ENVIRONMENT`: `production` or `certification` (required)
//! - `SII_VERIFY_SSL`: Whether to verify TLS certificates (true/false)
//! - `SII_RETRY_BUDGET`: Attempts per remote call
//! - `SII_CACHE_BACKEND`: `memory` or `filesystem`
//! - `SII_CACHE_DIR`: Directory for the filesystem cache backend
//! - `SII_TOKEN_TTL_SECS`: Session token lifetime in seconds
//!
//! ## File Locations
//! The loader probes `siilink.toml`, `siilink.json`, `config.toml` and
//! `config.json` in the current directory, its two parents, and next to the
//! executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use siilink_domain::{CacheBackend, Environment, Result, SiiConfig, SiiError};

use crate::errors::InfraError;

const CONFIG_FILE_NAMES: [&str; 4] = ["siilink.toml", "siilink.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// Environment variables win whenever `SII_ENVIRONMENT` is set. Only its
/// absence falls through to the config file and then to the defaults.
///
/// # Errors
/// Returns `SiiError::Config` if an environment variable or the config file
/// holds an invalid value.
pub fn load() -> Result<SiiConfig> {
    if std::env::var_os("SII_ENVIRONMENT").is_some() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    tracing::debug!("SII_ENVIRONMENT not set, trying file");
    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No config file found, using defaults");
            Ok(SiiConfig::default())
        }
    }
}

/// Load configuration from environment variables
///
/// `SII_ENVIRONMENT` must be present; every other variable is optional and
/// falls back to the default.
///
/// # Errors
/// Returns `SiiError::Config` if `SII_ENVIRONMENT` is missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<SiiConfig> {
    let environment = env_var("SII_ENVIRONMENT").and_then(|s| {
        Environment::from_str(&s).map_err(SiiError::Config)
    })?;

    let mut config = SiiConfig { environment, ..SiiConfig::default() };
    config.verify_ssl = env_bool("SII_VERIFY_SSL", config.verify_ssl);

    if let Some(budget) = env_parse::<u32>("SII_RETRY_BUDGET")? {
        config.retry_budget = budget;
    }
    if let Some(ttl) = env_parse::<u64>("SII_TOKEN_TTL_SECS")? {
        config.token_ttl_secs = ttl;
    }
    if let Ok(backend) = std::env::var("SII_CACHE_BACKEND") {
        config.cache.backend = CacheBackend::from_str(&backend).map_err(SiiError::Config)?;
    }
    if let Ok(directory) = std::env::var("SII_CACHE_DIR") {
        config.cache.directory = Some(PathBuf::from(directory));
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected
/// by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `SiiError::Config` if the file is missing, unreadable or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<SiiConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SiiError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SiiError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SiiError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<SiiConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents).map_err(|e| InfraError::from(e).into()),
        _ => Err(SiiError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut directories = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        directories.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            directories.push(exe_dir.to_path_buf());
        }
    }

    directories
        .iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SiiError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional numeric variable; a present but invalid value is an
/// error.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SiiError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "SII_ENVIRONMENT",
        "SII_VERIFY_SSL",
        "SII_RETRY_BUDGET",
        "SII_CACHE_BACKEND",
        "SII_CACHE_DIR",
        "SII_TOKEN_TTL_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().unwrap();

        std::env::set_var("SII_TEST_BOOL_YES", "YES");
        std::env::set_var("SII_TEST_BOOL_OFF", "off");
        assert!(env_bool("SII_TEST_BOOL_YES", false));
        assert!(!env_bool("SII_TEST_BOOL_OFF", true));

        std::env::remove_var("SII_TEST_BOOL_MISSING");
        assert!(env_bool("SII_TEST_BOOL_MISSING", true));

        std::env::remove_var("SII_TEST_BOOL_YES");
        std::env::remove_var("SII_TEST_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("SII_ENVIRONMENT", "certification");
        std::env::set_var("SII_VERIFY_SSL", "false");
        std::env::set_var("SII_RETRY_BUDGET", "4");
        std::env::set_var("SII_CACHE_BACKEND", "filesystem");
        std::env::set_var("SII_CACHE_DIR", "/tmp/siilink-tokens");
        std::env::set_var("SII_TOKEN_TTL_SECS", "15");

        let result = load_from_env();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.environment, Environment::Certification);
        assert!(!config.verify_ssl);
        assert_eq!(config.retry_budget, 4);
        assert_eq!(config.cache.backend, CacheBackend::Filesystem);
        assert_eq!(config.cache.directory, Some(PathBuf::from("/tmp/siilink-tokens")));
        assert_eq!(config.token_ttl_secs, 15);
    }

    #[test]
    fn test_load_from_env_requires_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, SiiError::Config(ref m) if m.contains("SII_ENVIRONMENT")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("SII_ENVIRONMENT", "production");
        std::env::set_var("SII_RETRY_BUDGET", "many");
        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(SiiError::Config(ref m)) if m.contains("SII_RETRY_BUDGET")));
    }

    #[test]
    fn test_load_from_env_invalid_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        std::env::set_var("SII_ENVIRONMENT", "staging");
        let result = load_from_env();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file_toml() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
environment = "certification"
retry_budget = 3

[endpoints.certification_overrides]
CrSeed = "https://maullin.example/DTEWS/CrSeed.jws"
"#
        )
        .unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.environment, Environment::Certification);
        assert_eq!(config.retry_budget, 3);
        assert_eq!(
            config.endpoints.certification_overrides.get("CrSeed").map(String::as_str),
            Some("https://maullin.example/DTEWS/CrSeed.jws")
        );
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, "{{ not json").unwrap();

        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON format"));
    }

    #[test]
    fn test_load_from_file_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".yaml").unwrap();
        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn test_load_from_file_missing() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/siilink.toml"))).unwrap_err();
        assert!(matches!(err, SiiError::Config(_)));
    }
}
