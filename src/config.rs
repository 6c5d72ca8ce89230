//! Tool settings loaded via `ortho-config`.
//!
//! These describe how `branchsync` talks to the outside world (git binary,
//! host, clone URL convention, hosting API) rather than what it syncs; the
//! sync rules themselves live in the JSON files handed to `--files`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Commit message used when neither settings nor CLI override it.
pub const DEFAULT_COMMIT_MESSAGE: &str = "chore: Sync by .github";

/// Clone URL convention for SSH remotes on GitHub-like hosts.
pub const DEFAULT_CLONE_URL_TEMPLATE: &str = "git@{host}:{owner}/{repo}.git";

/// Public GitHub REST API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Settings merged from defaults, `branchsync.toml`, and `BRANCHSYNC_*`
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "BRANCHSYNC",
    discovery(
        app_name = "branchsync",
        env_var = "BRANCHSYNC_CONFIG_PATH",
        config_file_name = "branchsync.toml",
        dotfile_name = ".branchsync.toml",
        project_file_name = "branchsync.toml"
    )
)]
pub struct SyncSettings {
    /// Path to the `git` executable.
    #[ortho_config(default = "git".to_owned())]
    pub git_bin: String,
    /// Host substituted for `{host}` in the clone URL template.
    #[ortho_config(default = "github.com".to_owned())]
    pub git_host: String,
    /// Clone URL with `{host}`, `{owner}` and `{repo}` placeholders.
    #[ortho_config(default = DEFAULT_CLONE_URL_TEMPLATE.to_owned())]
    pub clone_url_template: String,
    /// Base URL of the hosting REST API used to list branches.
    #[ortho_config(default = DEFAULT_API_BASE_URL.to_owned())]
    pub api_base_url: String,
    /// Message for every pushed commit.
    #[ortho_config(default = DEFAULT_COMMIT_MESSAGE.to_owned())]
    pub commit_message: String,
    /// Directory under which per-rule workspaces are created.
    #[ortho_config(default = ".".to_owned())]
    pub workspace_root: String,
    /// Directory that rule `src` paths are resolved against.
    #[ortho_config(default = ".".to_owned())]
    pub source_root: String,
    /// Leave workspaces on disk after each rule instead of removing them.
    #[ortho_config(default = false)]
    pub keep_workspaces: bool,
}

/// Errors raised while loading or validating settings.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SettingsError {
    /// Raised when a required value is blank. The message points at both
    /// configuration sources.
    #[error("missing {field}: set BRANCHSYNC_{env_suffix} or add {field} to branchsync.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Settings field that failed validation.
        field: String,
    },
    /// Raised when the clone URL template lacks a required placeholder.
    #[error("clone_url_template must contain {placeholder}: {template}")]
    InvalidTemplate {
        /// Placeholder that is missing.
        placeholder: String,
        /// Template as configured.
        template: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("settings parsing failed: {0}")]
    Parse(String),
}

impl From<Arc<ortho_config::OrthoError>> for SettingsError {
    fn from(value: Arc<ortho_config::OrthoError>) -> Self {
        Self::Parse(value.to_string())
    }
}

impl SyncSettings {
    /// Loads settings from defaults, configuration files, and environment
    /// variables without parsing CLI arguments, which belong to the binary.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SettingsError> {
        Ok(Self::load_from_iter([std::ffi::OsString::from("branchsync")])?)
    }

    /// Ensures values are present and the clone template is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidConfig`] for blank fields and
    /// [`SettingsError::InvalidTemplate`] for a template missing `{owner}` or
    /// `{repo}`.
    pub fn validate(&self) -> Result<(), SettingsError> {
        Self::require_value(&self.git_bin, "git_bin")?;
        Self::require_value(&self.git_host, "git_host")?;
        Self::require_value(&self.clone_url_template, "clone_url_template")?;
        Self::require_value(&self.api_base_url, "api_base_url")?;
        Self::require_value(&self.commit_message, "commit_message")?;
        Self::require_value(&self.workspace_root, "workspace_root")?;
        Self::require_value(&self.source_root, "source_root")?;

        for placeholder in ["{owner}", "{repo}"] {
            if !self.clone_url_template.contains(placeholder) {
                return Err(SettingsError::InvalidTemplate {
                    placeholder: placeholder.to_owned(),
                    template: self.clone_url_template.clone(),
                });
            }
        }
        Ok(())
    }

    /// Expands the clone URL template for one repository.
    #[must_use]
    pub fn clone_url(&self, owner: &str, repo: &str) -> String {
        self.clone_url_template
            .replace("{host}", &self.git_host)
            .replace("{owner}", owner)
            .replace("{repo}", repo)
    }

    /// Workspace root as a path.
    #[must_use]
    pub fn workspace_root_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.workspace_root)
    }

    /// Source root as a path.
    #[must_use]
    pub fn source_root_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.source_root)
    }

    fn require_value(value: &str, field: &str) -> Result<(), SettingsError> {
        if value.trim().is_empty() {
            return Err(SettingsError::InvalidConfig {
                field: field.to_owned(),
            });
        }
        Ok(())
    }
}
