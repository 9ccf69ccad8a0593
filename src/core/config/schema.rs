//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$MODFLEET_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/modfleet/config.toml`
//! 3. `~/.modfleet/config.toml` (canonical write location)
//!
//! # Workspace Config
//!
//! Located at `.modfleet/config.toml` under the fleet root.
//!
//! # Validation
//!
//! Config values are validated after parsing (e.g. `base_branch` must be a
//! valid branch name, pin keys must be valid module paths).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{BranchName, ModulePath};

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// jobs = 8
/// remote = "origin"
///
/// [pull_request]
/// draft = true
///
/// [forge]
/// api_base = "https://api.github.com"
/// token_env = "GITHUB_TOKEN"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Worker pool size for independent actions
    pub jobs: Option<usize>,

    /// Remote name (default: "origin")
    pub remote: Option<String>,

    /// Base branch for pull requests and resets
    pub base_branch: Option<String>,

    /// Commit message for dependency bumps
    pub commit_message: Option<String>,

    /// Pull request defaults
    pub pull_request: Option<PullRequestDefaults>,

    /// Forge API settings
    pub forge: Option<ForgeConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_common(
            self.jobs,
            self.remote.as_deref(),
            self.base_branch.as_deref(),
        )?;
        if let Some(forge) = &self.forge {
            forge.validate()?;
        }
        Ok(())
    }
}

/// Workspace configuration, shared by every repository under one fleet root.
///
/// # Example
///
/// ```toml
/// base_branch = "main"
/// commit_message = "chore: bump fleet dependencies"
/// workflow_source = "ci/go.yml"
///
/// [pins]
/// "example.com/legacy" = "v0.9.3"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub jobs: Option<usize>,

    pub remote: Option<String>,

    pub base_branch: Option<String>,

    pub commit_message: Option<String>,

    /// Workflow file installed by the `workflow` action
    pub workflow_source: Option<PathBuf>,

    pub pull_request: Option<PullRequestDefaults>,

    /// Explicit versions by module path; pinned repositories are never bumped
    pub pins: BTreeMap<String, String>,
}

impl WorkspaceConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_common(
            self.jobs,
            self.remote.as_deref(),
            self.base_branch.as_deref(),
        )?;

        for (module, version) in &self.pins {
            ModulePath::new(module.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid pinned module: {}", e))
            })?;
            if version.trim().is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "pin for '{}' has an empty version",
                    module
                )));
            }
        }

        Ok(())
    }
}

fn validate_common(
    jobs: Option<usize>,
    remote: Option<&str>,
    base_branch: Option<&str>,
) -> Result<(), ConfigError> {
    if jobs == Some(0) {
        return Err(ConfigError::InvalidValue(
            "jobs must be at least 1".to_string(),
        ));
    }

    if let Some(remote) = remote {
        if remote.is_empty() {
            return Err(ConfigError::InvalidValue(
                "remote cannot be empty".to_string(),
            ));
        }
    }

    if let Some(base) = base_branch {
        BranchName::new(base).map_err(|e| {
            ConfigError::InvalidValue(format!("invalid base branch name: {}", e))
        })?;
    }

    Ok(())
}

/// Pull request defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PullRequestDefaults {
    pub title: Option<String>,

    pub body: Option<String>,

    /// Open pull requests as drafts
    pub draft: Option<bool>,
}

/// Forge API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    /// REST API base URL (GitHub Enterprise installs differ)
    pub api_base: Option<String>,

    /// Environment variable holding the API token
    pub token_env: Option<String>,
}

impl ForgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.api_base {
            if !base.starts_with("https://") && !base.starts_with("http://") {
                return Err(ConfigError::InvalidValue(format!(
                    "forge api_base '{}' must be an http(s) URL",
                    base
                )));
            }
        }
        if let Some(var) = &self.token_env {
            if var.is_empty() || var.contains('=') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid token_env '{}'",
                    var
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global {
        use super::*;

        #[test]
        fn parses_full_example() {
            let toml = r#"
                jobs = 4
                remote = "upstream"
                base_branch = "develop"

                [pull_request]
                title = "Bump deps"
                draft = true

                [forge]
                api_base = "https://ghe.example.com/api/v3"
                token_env = "GHE_TOKEN"
            "#;
            let config: GlobalConfig = toml::from_str(toml).unwrap();
            config.validate().unwrap();
            assert_eq!(config.jobs, Some(4));
            assert_eq!(
                config.pull_request.as_ref().and_then(|p| p.draft),
                Some(true)
            );
        }

        #[test]
        fn zero_jobs_rejected() {
            let config = GlobalConfig {
                jobs: Some(0),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn non_http_api_base_rejected() {
            let config = GlobalConfig {
                forge: Some(ForgeConfig {
                    api_base: Some("ftp://nope".into()),
                    token_env: None,
                }),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }
    }

    mod workspace {
        use super::*;

        #[test]
        fn pins_table_parses() {
            let toml = r#"
                [pins]
                "example.com/legacy" = "v0.9.3"
            "#;
            let config: WorkspaceConfig = toml::from_str(toml).unwrap();
            config.validate().unwrap();
            assert_eq!(
                config.pins.get("example.com/legacy").map(String::as_str),
                Some("v0.9.3")
            );
        }

        #[test]
        fn empty_pin_version_rejected() {
            let mut config = WorkspaceConfig::default();
            config
                .pins
                .insert("example.com/a".to_string(), " ".to_string());
            assert!(config.validate().is_err());
        }

        #[test]
        fn invalid_base_branch_rejected() {
            let config = WorkspaceConfig {
                base_branch: Some("bad..name".into()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn unknown_fields_rejected() {
            let result: Result<WorkspaceConfig, _> = toml::from_str("trunk = \"main\"");
            assert!(result.is_err());
        }
    }
}
