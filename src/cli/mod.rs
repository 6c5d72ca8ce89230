//! Command-line interface definitions for the `branchsync` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgAction, Parser};

/// Top-level CLI for the `branchsync` binary.
#[derive(Debug, Parser)]
#[command(
    name = "branchsync",
    about = "Copy shared files into the matching branches of destination repositories"
)]
pub(crate) struct Cli {
    /// Whitespace-separated list of JSON sync rule files, processed in order.
    #[arg(long, value_name = "FILES")]
    pub(crate) files: Option<String>,
    /// Commit message for every pushed change.
    ///
    /// Defaults to the `commit_message` setting (`chore: Sync by .github`).
    #[arg(long, value_name = "MESSAGE", allow_hyphen_values = true)]
    pub(crate) message: Option<String>,
    /// Validate rules and log the intended copies without touching the
    /// network or any repository.
    #[arg(
        long = "dry-run",
        visible_alias = "dryRun",
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub(crate) dry_run: bool,
    /// Log failing rules and continue with the next one instead of stopping.
    #[arg(long)]
    pub(crate) keep_going: bool,
}
