//! Sync rule files: loading, destination parsing, and planning.
//!
//! A rule file is a JSON array of objects:
//!
//! ```json
//! [{"src": "VERSION", "dest": "acme/widgets/VERSION", "branches": ["^rel-.*"]}]
//! ```
//!
//! Rules are validated into a [`SyncPlan`] before anything touches the
//! network, so a dry run catches malformed destinations and patterns.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use thiserror::Error;

use crate::branches::BranchFilter;

/// One configured mapping from a local file to a repository path.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SyncRule {
    /// Source file, relative to the source root.
    pub src: String,
    /// Destination locator in `owner/repo/path` form.
    pub dest: String,
    /// Branch patterns; empty selects every branch.
    #[serde(default, deserialize_with = "nullable_patterns")]
    pub branches: Vec<String>,
}

/// Parsed form of [`SyncRule::dest`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Destination {
    /// Repository owner or organisation.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Path of the file inside the repository.
    pub path: Utf8PathBuf,
}

/// A rule whose destination and patterns have been validated.
#[derive(Clone, Debug)]
pub struct SyncPlan {
    /// Source file, relative to the source root.
    pub source: Utf8PathBuf,
    /// Where the file lands.
    pub destination: Destination,
    /// Compiled branch selection.
    pub filter: BranchFilter,
}

/// Errors raised while reading rule files or validating rules.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RuleError {
    /// The rule file could not be read.
    #[error("failed to read config {path}: {message}")]
    ConfigRead {
        /// Offending file.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// The rule file is not a JSON array of rules.
    #[error("failed to parse config {path}: {message}")]
    ConfigParse {
        /// Offending file.
        path: Utf8PathBuf,
        /// Parser error message.
        message: String,
    },
    /// The destination is not in `owner/repo/path` form.
    #[error("wrong destination format {destination:?}, expected owner/repo/path")]
    DestinationFormat {
        /// Destination as configured.
        destination: String,
    },
    /// A branch pattern is not a valid regular expression.
    #[error("invalid branch pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Pattern as configured.
        pattern: String,
        /// Compiler error message.
        message: String,
    },
}

impl Destination {
    /// Splits `owner/repo/path` on the first two `/` separators.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::DestinationFormat`] when fewer than three parts
    /// result.
    pub fn parse(destination: &str) -> Result<Self, RuleError> {
        let mut parts = destination.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), Some(path)) => Ok(Self {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
                path: Utf8PathBuf::from(path),
            }),
            _ => Err(RuleError::DestinationFormat {
                destination: destination.to_owned(),
            }),
        }
    }

    /// `owner/repo` slug used in logs and API calls.
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl SyncRule {
    /// Validates the rule into a [`SyncPlan`].
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::DestinationFormat`] or
    /// [`RuleError::InvalidPattern`].
    pub fn plan(&self) -> Result<SyncPlan, RuleError> {
        let destination = Destination::parse(&self.dest)?;
        let filter = BranchFilter::new(&self.branches)?;
        Ok(SyncPlan {
            source: Utf8PathBuf::from(&self.src),
            destination,
            filter,
        })
    }
}

/// Reads and decodes one rule file.
///
/// # Errors
///
/// Returns [`RuleError::ConfigRead`] when the file cannot be read and
/// [`RuleError::ConfigParse`] when it is not a JSON array of rules.
pub fn load_rules(path: &Utf8Path) -> Result<Vec<SyncRule>, RuleError> {
    let contents = read_file(path)?;
    parse_rules(path, &contents)
}

/// Decodes rule file contents; `path` is only used for error context.
///
/// # Errors
///
/// Returns [`RuleError::ConfigParse`] on malformed JSON.
pub fn parse_rules(path: &Utf8Path, contents: &str) -> Result<Vec<SyncRule>, RuleError> {
    serde_json::from_str(contents).map_err(|err| RuleError::ConfigParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Splits the `--files` value into individual paths.
#[must_use]
pub fn split_file_list(files: &str) -> Vec<Utf8PathBuf> {
    files.split_whitespace().map(Utf8PathBuf::from).collect()
}

fn read_file(path: &Utf8Path) -> Result<String, RuleError> {
    let to_error = |message: String| RuleError::ConfigRead {
        path: path.to_path_buf(),
        message,
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| to_error(String::from("path does not name a file")))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| to_error(err.to_string()))?;
    dir.read_to_string(file_name)
        .map_err(|err| to_error(err.to_string()))
}

fn nullable_patterns<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
