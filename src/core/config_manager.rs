// src/core/config_manager.rs
//! config.yaml loading with per-environment sections

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::FsOps;

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub output_path: PathBuf,
    pub log_file: PathBuf,
    pub profile_path: Option<PathBuf>,
    pub webdriver_url: String,
    pub headless: bool,
    pub scraping_delay_ms: u64,
    pub application_delay_ms: u64,
    pub page_load_delay_ms: u64,
    pub max_applications_per_session: usize,
    pub max_jobs_per_source: usize,
    pub request_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("jobpilot.db"),
            output_path: PathBuf::from("out"),
            log_file: PathBuf::from("/tmp/jobpilot.log"),
            profile_path: None,
            webdriver_url: "http://localhost:4444".to_string(),
            headless: false,
            scraping_delay_ms: 2000,
            application_delay_ms: 3000,
            page_load_delay_ms: 3000,
            max_applications_per_session: 20,
            max_jobs_per_source: 15,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    local: AppConfig,
    production: Option<AppConfig>,
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: String,
    pub config: AppConfig,
}

impl ConfigManager {
    /// Load `config.yaml` (or `$JOBPILOT_CONFIG`) for the current environment
    ///
    /// Built-in defaults are used when the file does not exist.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::load_with(|key| std::env::var(key).ok(), &current_dir)
    }

    /// `load` with an explicit variable lookup, resolving relative paths against `base_dir`
    pub fn load_with(env: impl Fn(&str) -> Option<String>, base_dir: &Path) -> Result<Self> {
        let environment = Self::get_environment(&env);
        let config_path = env("JOBPILOT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let config_path = FsOps::normalize_path(base_dir, &config_path);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_yaml(&content, &environment)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            Self::defaults_for(&environment)
        };

        let config = Self::apply_env_overrides(config, &env);
        let config = Self::resolve_paths(config, base_dir);

        Ok(Self {
            environment,
            config,
        })
    }

    fn get_environment(env: &impl Fn(&str) -> Option<String>) -> String {
        env("JOBPILOT_ENV")
            .or_else(|| env("ENVIRONMENT"))
            .unwrap_or_else(|| "local".to_string())
    }

    /// Pick the section for `environment`; production falls back to local
    pub fn from_yaml(content: &str, environment: &str) -> Result<AppConfig> {
        let file: ConfigFile = serde_yaml::from_str(content).context("Invalid config YAML")?;

        Ok(match (environment, file.production) {
            ("production", Some(production)) => production,
            ("production", None) => AppConfig {
                headless: true,
                ..file.local
            },
            _ => file.local,
        })
    }

    fn defaults_for(environment: &str) -> AppConfig {
        let config = AppConfig::default();
        if environment == "production" {
            AppConfig {
                headless: true,
                max_applications_per_session: 50,
                ..config
            }
        } else {
            config
        }
    }

    fn apply_env_overrides(
        mut config: AppConfig,
        env: &impl Fn(&str) -> Option<String>,
    ) -> AppConfig {
        if let Some(database) = env("JOBPILOT_DATABASE") {
            config.database_path = PathBuf::from(database);
        }
        if let Some(url) = env("JOBPILOT_WEBDRIVER_URL") {
            config.webdriver_url = url;
        }
        config
    }

    fn resolve_paths(config: AppConfig, base_dir: &Path) -> AppConfig {
        AppConfig {
            database_path: FsOps::normalize_path(base_dir, &config.database_path),
            output_path: FsOps::normalize_path(base_dir, &config.output_path),
            log_file: FsOps::normalize_path(base_dir, &config.log_file),
            profile_path: config
                .profile_path
                .as_deref()
                .map(|p| FsOps::normalize_path(base_dir, p)),
            ..config
        }
    }

    /// Ensure output and database directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        FsOps::ensure_dir_exists(&self.config.output_path).await?;

        if let Some(db_parent) = self.config.database_path.parent() {
            FsOps::ensure_dir_exists(db_parent).await?;
        }

        Ok(())
    }

    pub fn profile_path(&self) -> Option<&Path> {
        self.config.profile_path.as_deref()
    }
}

impl AppConfig {
    pub fn scraping_delay(&self) -> Duration {
        Duration::from_millis(self.scraping_delay_ms)
    }

    pub fn application_delay(&self) -> Duration {
        Duration::from_millis(self.application_delay_ms)
    }

    pub fn page_load_delay(&self) -> Duration {
        Duration::from_millis(self.page_load_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
local:
  database_path: data/jobs.db
  webdriver_url: http://127.0.0.1:9515
  max_applications_per_session: 5
production:
  database_path: /app/jobs.db
  headless: true
"#;

    #[test]
    fn test_local_section_with_defaults() {
        let config = ConfigManager::from_yaml(SAMPLE, "local").unwrap();
        assert_eq!(config.database_path, PathBuf::from("data/jobs.db"));
        assert_eq!(config.webdriver_url, "http://127.0.0.1:9515");
        assert_eq!(config.max_applications_per_session, 5);
        assert_eq!(config.scraping_delay_ms, 2000);
        assert!(!config.headless);
    }

    #[test]
    fn test_production_section() {
        let config = ConfigManager::from_yaml(SAMPLE, "production").unwrap();
        assert_eq!(config.database_path, PathBuf::from("/app/jobs.db"));
        assert!(config.headless);
        assert_eq!(config.webdriver_url, "http://localhost:4444");
    }

    #[test]
    fn test_production_falls_back_to_local() {
        let config = ConfigManager::from_yaml("local:\n  headless: false\n", "production").unwrap();
        assert!(config.headless);
    }

    #[test]
    fn test_unknown_environment_uses_local() {
        let config = ConfigManager::from_yaml(SAMPLE, "staging").unwrap();
        assert_eq!(config.max_applications_per_session, 5);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(ConfigManager::from_yaml("production: [", "local").is_err());
    }

    #[test]
    fn test_delays() {
        let config = AppConfig {
            application_delay_ms: 1500,
            ..AppConfig::default()
        };
        assert_eq!(config.application_delay(), Duration::from_millis(1500));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), SAMPLE).unwrap();

        let manager = ConfigManager::load_with(lookup(&[]), dir.path()).unwrap();
        assert_eq!(manager.environment, "local");
        assert_eq!(manager.config.database_path, dir.path().join("data/jobs.db"));
        assert_eq!(manager.config.output_path, dir.path().join("out"));
        assert_eq!(manager.config.log_file, PathBuf::from("/tmp/jobpilot.log"));
        assert!(manager.profile_path().is_none());
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("custom.yaml"), SAMPLE).unwrap();

        let env = lookup(&[
            ("JOBPILOT_CONFIG", "custom.yaml"),
            ("ENVIRONMENT", "production"),
            ("JOBPILOT_DATABASE", "override.db"),
            ("JOBPILOT_WEBDRIVER_URL", "http://selenium:4444"),
        ]);
        let manager = ConfigManager::load_with(env, dir.path()).unwrap();

        assert_eq!(manager.environment, "production");
        assert!(manager.config.headless);
        assert_eq!(manager.config.database_path, dir.path().join("override.db"));
        assert_eq!(manager.config.webdriver_url, "http://selenium:4444");
    }

    #[test]
    fn test_missing_file_uses_environment_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let env = lookup(&[("JOBPILOT_ENV", "production"), ("ENVIRONMENT", "local")]);

        let manager = ConfigManager::load_with(env, dir.path()).unwrap();
        assert_eq!(manager.environment, "production");
        assert_eq!(manager.config.max_applications_per_session, 50);
        assert_eq!(manager.config.database_path, dir.path().join("jobpilot.db"));
    }
}
