//! Thin wrapper around the `git` CLI.
//!
//! Every operation runs through a [`CommandRunner`] so tests can script
//! git's answers. Commands that act on a checkout use `git -C <dir>` rather
//! than changing the process working directory.

use std::ffi::OsString;

use camino::Utf8Path;
use thiserror::Error;
use tracing::debug;

use crate::command::{CommandError, CommandOutput, CommandRunner, render_command};

/// Errors raised by git invocations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GitError {
    /// `git` could not be started.
    #[error(transparent)]
    Spawn(#[from] CommandError),
    /// `git` exited unsuccessfully.
    #[error("`{command}` exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Rendered command line.
        command: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from git.
        stderr: String,
    },
}

/// Runs git subcommands for clone, checkout, status, and publishing.
#[derive(Clone, Debug)]
pub struct GitClient<R: CommandRunner> {
    git_bin: String,
    runner: R,
}

impl<R: CommandRunner> GitClient<R> {
    /// Creates a client invoking `git_bin` through `runner`.
    #[must_use]
    pub fn new(git_bin: impl Into<String>, runner: R) -> Self {
        Self {
            git_bin: git_bin.into(),
            runner,
        }
    }

    /// Returns the underlying runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Clones `url` into `target`, which must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] when git cannot start or the clone fails.
    pub fn clone_repository(&self, url: &str, target: &Utf8Path) -> Result<(), GitError> {
        self.run(
            None,
            &[
                OsString::from("clone"),
                OsString::from(url),
                OsString::from(target.as_str()),
            ],
        )
        .map(drop)
    }

    /// Switches the checkout to `branch`, creating a tracking branch from
    /// `origin` when needed. The trailing `--` keeps branch names that also
    /// name a path from being read as a pathspec.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] when the branch cannot be checked out.
    pub fn checkout(&self, checkout: &Utf8Path, branch: &str) -> Result<(), GitError> {
        self.run(
            Some(checkout),
            &[
                OsString::from("checkout"),
                OsString::from(branch),
                OsString::from("--"),
            ],
        )
        .map(drop)
    }

    /// Returns the short status of the working tree; empty means clean.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] when the status query fails.
    pub fn status_short(&self, checkout: &Utf8Path) -> Result<String, GitError> {
        self.run(
            Some(checkout),
            &[OsString::from("status"), OsString::from("--short")],
        )
        .map(|output| output.stdout)
    }

    /// Stages every change, tracked or not.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] when staging fails.
    pub fn stage_all(&self, checkout: &Utf8Path) -> Result<(), GitError> {
        self.run(
            Some(checkout),
            &[OsString::from("add"), OsString::from("--all")],
        )
        .map(drop)
    }

    /// Commits the index with `message`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] when the commit fails.
    pub fn commit(&self, checkout: &Utf8Path, message: &str) -> Result<(), GitError> {
        self.run(
            Some(checkout),
            &[
                OsString::from("commit"),
                OsString::from("-m"),
                OsString::from(message),
            ],
        )
        .map(drop)
    }

    /// Pushes the current branch to its upstream.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] when the push is rejected or fails.
    pub fn push(&self, checkout: &Utf8Path) -> Result<(), GitError> {
        self.run(Some(checkout), &[OsString::from("push")])
            .map(drop)
    }

    fn run(&self, checkout: Option<&Utf8Path>, args: &[OsString]) -> Result<CommandOutput, GitError> {
        let mut full_args = Vec::with_capacity(args.len() + 2);
        if let Some(dir) = checkout {
            full_args.push(OsString::from("-C"));
            full_args.push(OsString::from(dir.as_str()));
        }
        full_args.extend_from_slice(args);

        let command = render_command(&self.git_bin, &full_args);
        debug!(%command, "exec");

        let output = self.runner.run(&self.git_bin, &full_args)?;
        if output.is_success() {
            return Ok(output);
        }

        Err(GitError::CommandFailure {
            command,
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }
}
