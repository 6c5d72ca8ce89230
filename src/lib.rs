//! Core library for the branchsync file propagation tool.
//!
//! The crate reads JSON sync rules, resolves each destination repository's
//! branches through a hosting API, and copies a shared source file into every
//! matching branch using the `git` CLI. Only branches whose tree actually
//! changes receive a commit.

pub mod branches;
pub mod command;
pub mod config;
pub mod git;
pub mod host;
pub mod rules;
pub mod sync;
pub mod test_support;
pub mod workspace;

pub use branches::BranchFilter;
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{SettingsError, SyncSettings};
pub use git::{GitClient, GitError};
pub use host::{GitHubHost, HostError, RepositoryHost};
pub use rules::{Destination, RuleError, SyncPlan, SyncRule, load_rules, split_file_list};
pub use sync::{BranchOutcome, BranchSync, RunOptions, SyncError, SyncReport, Syncer};
pub use workspace::{Checkout, Workspace, WorkspaceError};
