//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! modfleet has two configuration scopes:
//! - **Global**: User-level settings
//! - **Workspace**: Settings for one fleet root (pins, workflow source)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Workspace config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$MODFLEET_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/modfleet/config.toml`
//! 3. `~/.modfleet/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use modfleet::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/fleet"))).unwrap();
//! let config = result.config;
//!
//! println!("Base branch: {}", config.base_branch());
//! println!("Remote: {}", config.remote());
//! ```

pub mod schema;

pub use schema::{ForgeConfig, GlobalConfig, PullRequestDefaults, WorkspaceConfig};

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::types::ModulePath;

/// Default commit message for dependency updates.
pub const DEFAULT_COMMIT_MESSAGE: &str = "modfleet: update fleet dependencies";

/// Default GitHub REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence automatically: workspace config overrides
/// global config, which overrides built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub workspace: Option<WorkspaceConfig>,
    global_path: Option<PathBuf>,
    workspace_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `workspace_root` is provided, also loads its workspace config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or
    /// fail validation. Missing files are not an error.
    pub fn load(workspace_root: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();
        let global_path = Self::locate_global(&mut warnings);
        let mut result = Self::load_from(global_path.as_deref(), workspace_root)?;
        warnings.append(&mut result.warnings);
        result.warnings = warnings;
        Ok(result)
    }

    /// Load from an explicit global file and workspace root.
    pub fn load_from(
        global_file: Option<&Path>,
        workspace_root: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let global = match global_file {
            Some(path) => read_toml::<GlobalConfig>(path)?,
            None => GlobalConfig::default(),
        };

        let (workspace, workspace_path) = match workspace_root {
            Some(root) => {
                let path = Self::workspace_config_path(root);
                if path.exists() {
                    (Some(read_toml::<WorkspaceConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref w) = workspace {
            w.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                workspace,
                global_path: global_file.map(Path::to_path_buf),
                workspace_path,
            },
            warnings: Vec::new(),
        })
    }

    fn locate_global(warnings: &mut Vec<ConfigWarning>) -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MODFLEET_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            warnings.push(ConfigWarning {
                message: "MODFLEET_CONFIG points to a missing file; ignoring it".to_string(),
                path,
            });
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("modfleet/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".modfleet/config.toml");
        path.exists().then_some(path)
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.modfleet/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".modfleet/config.toml"))
    }

    /// Returns `.modfleet/config.toml` under the given fleet root.
    pub fn workspace_config_path(root: &Path) -> PathBuf {
        root.join(".modfleet/config.toml")
    }

    /// Write workspace config atomically.
    ///
    /// Creates parent directories if needed.
    pub fn write_workspace(root: &Path, config: &WorkspaceConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::workspace_config_path(root);
        write_config_atomic(&path, config)?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Base branch for pull requests and resets. Defaults to "main".
    pub fn base_branch(&self) -> &str {
        self.workspace
            .as_ref()
            .and_then(|w| w.base_branch.as_deref())
            .or(self.global.base_branch.as_deref())
            .unwrap_or("main")
    }

    /// Remote name. Defaults to "origin".
    pub fn remote(&self) -> &str {
        self.workspace
            .as_ref()
            .and_then(|w| w.remote.as_deref())
            .or(self.global.remote.as_deref())
            .unwrap_or("origin")
    }

    /// Configured worker pool size, if any.
    pub fn jobs(&self) -> Option<usize> {
        self.workspace
            .as_ref()
            .and_then(|w| w.jobs)
            .or(self.global.jobs)
    }

    pub fn commit_message(&self) -> &str {
        self.workspace
            .as_ref()
            .and_then(|w| w.commit_message.as_deref())
            .or(self.global.commit_message.as_deref())
            .unwrap_or(DEFAULT_COMMIT_MESSAGE)
    }

    fn pull_request<T>(&self, field: impl Fn(&PullRequestDefaults) -> Option<T>) -> Option<T> {
        self.workspace
            .as_ref()
            .and_then(|w| w.pull_request.as_ref())
            .and_then(&field)
            .or_else(|| self.global.pull_request.as_ref().and_then(&field))
    }

    /// Pull request title; `None` means derive one from the branch.
    pub fn pr_title(&self) -> Option<String> {
        self.pull_request(|p| p.title.clone())
    }

    pub fn pr_body(&self) -> Option<String> {
        self.pull_request(|p| p.body.clone())
    }

    /// Defaults to `false`.
    pub fn pr_draft(&self) -> bool {
        self.pull_request(|p| p.draft).unwrap_or(false)
    }

    pub fn forge_api_base(&self) -> &str {
        self.global
            .forge
            .as_ref()
            .and_then(|f| f.api_base.as_deref())
            .unwrap_or(DEFAULT_API_BASE)
    }

    /// Name of the environment variable holding the forge token.
    pub fn token_env(&self) -> &str {
        self.global
            .forge
            .as_ref()
            .and_then(|f| f.token_env.as_deref())
            .unwrap_or("GITHUB_TOKEN")
    }

    /// Read the forge token from the configured environment variable.
    pub fn forge_token(&self) -> Option<String> {
        std::env::var(self.token_env())
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn workflow_source(&self) -> Option<&Path> {
        self.workspace
            .as_ref()
            .and_then(|w| w.workflow_source.as_deref())
    }

    /// Pins keyed by module. Values were validated at load time.
    pub fn pins(&self) -> HashMap<ModulePath, String> {
        self.workspace
            .iter()
            .flat_map(|w| w.pins.iter())
            .filter_map(|(m, v)| Some((ModulePath::new(m.as_str()).ok()?, v.clone())))
            .collect()
    }

    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn workspace_config_loaded_from(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a config file atomically (temp file in the same directory, then rename).
fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    let temp_path = path.with_extension("toml.tmp");
    let write_err = |e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_files() {
        let config = Config::load_from(None, None).unwrap().config;

        assert_eq!(config.base_branch(), "main");
        assert_eq!(config.remote(), "origin");
        assert_eq!(config.jobs(), None);
        assert_eq!(config.commit_message(), DEFAULT_COMMIT_MESSAGE);
        assert_eq!(config.forge_api_base(), DEFAULT_API_BASE);
        assert_eq!(config.token_env(), "GITHUB_TOKEN");
        assert!(!config.pr_draft());
        assert!(config.pins().is_empty());
    }

    #[test]
    fn global_file_is_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            jobs = 3
            [pull_request]
            draft = true
            "#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path), None).unwrap().config;
        assert_eq!(config.jobs(), Some(3));
        assert!(config.pr_draft());
        assert_eq!(config.global_config_loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn workspace_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(
            &global,
            r#"
            jobs = 3
            remote = "upstream"
            [pull_request]
            title = "global title"
            draft = true
            "#,
        )
        .unwrap();

        let root = temp.path().join("fleet");
        fs::create_dir_all(root.join(".modfleet")).unwrap();
        fs::write(
            root.join(".modfleet/config.toml"),
            r#"
            jobs = 1
            [pull_request]
            title = "workspace title"
            [pins]
            "example.com/a" = "v1.2.3"
            "#,
        )
        .unwrap();

        let config = Config::load_from(Some(&global), Some(&root)).unwrap().config;
        assert_eq!(config.jobs(), Some(1));
        assert_eq!(config.remote(), "upstream");
        assert_eq!(config.pr_title().as_deref(), Some("workspace title"));
        // unset in workspace, falls through to global
        assert!(config.pr_draft());

        let pins = config.pins();
        let module = ModulePath::new("example.com/a").unwrap();
        assert_eq!(pins.get(&module).map(String::as_str), Some("v1.2.3"));
    }

    #[test]
    fn invalid_workspace_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".modfleet")).unwrap();
        fs::write(
            temp.path().join(".modfleet/config.toml"),
            "base_branch = \"invalid..name\"",
        )
        .unwrap();

        assert!(Config::load_from(None, Some(temp.path())).is_err());
    }

    #[test]
    fn parse_error_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.toml");
        fs::write(&path, "jobs = [").unwrap();

        let err = Config::load_from(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn write_workspace_round_trips() {
        let temp = TempDir::new().unwrap();
        let config = WorkspaceConfig {
            base_branch: Some("develop".to_string()),
            ..Default::default()
        };

        let path = Config::write_workspace(temp.path(), &config).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());

        let loaded = Config::load_from(None, Some(temp.path())).unwrap().config;
        assert_eq!(loaded.base_branch(), "develop");
        assert_eq!(loaded.workspace_config_loaded_from(), Some(path.as_path()));
    }
}
