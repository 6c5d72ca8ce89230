//! Batch synchronisation of shared files into matching branches.
//!
//! The [`Syncer`] walks config files, then rules, then branches, strictly in
//! order. For each selected branch it checks the branch out, overwrites the
//! destination file, and only commits and pushes when `git status` reports a
//! change, so re-running an unchanged configuration is a no-op.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{error, info};

use crate::command::{CommandRunner, ProcessCommandRunner};
use crate::config::{SettingsError, SyncSettings};
use crate::git::{GitClient, GitError};
use crate::host::{GitHubHost, HostError, RepositoryHost};
use crate::rules::{Destination, RuleError, SyncPlan, SyncRule, load_rules};
use crate::workspace::{Checkout, Workspace, WorkspaceError, read_source};

mod report;

pub use report::{BranchOutcome, BranchSync, RuleFailure, SyncReport};

/// Per-run switches supplied by the CLI.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunOptions {
    /// Only validate rules and log the intended mapping.
    pub dry_run: bool,
    /// Record rule failures and continue with the next rule.
    pub keep_going: bool,
}

/// Errors surfaced while running a sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Tool settings failed validation.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// A rule file or rule is invalid.
    #[error(transparent)]
    Rule(#[from] RuleError),
    /// The hosting API client could not be constructed.
    #[error(transparent)]
    Host(#[from] HostError),
    /// Listing the destination's branches failed.
    #[error("failed to list branches of {repository}: {source}")]
    BranchList {
        /// `owner/repo` slug.
        repository: String,
        /// Underlying API error.
        #[source]
        source: HostError,
    },
    /// Workspace creation, source read, or file copy failed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    /// Cloning the destination failed.
    #[error("failed to clone {repository}: {source}")]
    Clone {
        /// `owner/repo` slug.
        repository: String,
        /// Underlying git error.
        #[source]
        source: GitError,
    },
    /// Checking out a branch failed.
    #[error("failed to check out {branch} in {repository}: {source}")]
    Checkout {
        /// `owner/repo` slug.
        repository: String,
        /// Branch being synced.
        branch: String,
        /// Underlying git error.
        #[source]
        source: GitError,
    },
    /// Querying the working tree status failed.
    #[error("failed to query status of {branch} in {repository}: {source}")]
    StatusQuery {
        /// `owner/repo` slug.
        repository: String,
        /// Branch being synced.
        branch: String,
        /// Underlying git error.
        #[source]
        source: GitError,
    },
    /// Staging the change failed.
    #[error("failed to stage changes on {branch} in {repository}: {source}")]
    Stage {
        /// `owner/repo` slug.
        repository: String,
        /// Branch being synced.
        branch: String,
        /// Underlying git error.
        #[source]
        source: GitError,
    },
    /// Creating the commit failed.
    #[error("failed to commit on {branch} in {repository}: {source}")]
    Commit {
        /// `owner/repo` slug.
        repository: String,
        /// Branch being synced.
        branch: String,
        /// Underlying git error.
        #[source]
        source: GitError,
    },
    /// Pushing the commit failed.
    #[error("failed to push {branch} of {repository}: {source}")]
    Push {
        /// `owner/repo` slug.
        repository: String,
        /// Branch being synced.
        branch: String,
        /// Underlying git error.
        #[source]
        source: GitError,
    },
    /// Some rules failed in keep-going mode.
    #[error("{failed} of {total} sync rules failed")]
    Incomplete {
        /// Number of failed rules.
        failed: usize,
        /// Number of rules attempted.
        total: usize,
    },
}

/// Applies sync rules using a hosting API and git.
#[derive(Clone, Debug)]
pub struct Syncer<H: RepositoryHost, R: CommandRunner> {
    settings: SyncSettings,
    host: H,
    git: GitClient<R>,
}

impl Syncer<GitHubHost, ProcessCommandRunner> {
    /// Wires the GitHub API client and the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Settings`] when validation fails or
    /// [`SyncError::Host`] when the HTTP client cannot be built.
    pub fn with_github(settings: SyncSettings) -> Result<Self, SyncError> {
        let host = GitHubHost::new(&settings.api_base_url)?;
        Self::new(settings, host, ProcessCommandRunner)
    }
}

impl<H: RepositoryHost, R: CommandRunner> Syncer<H, R> {
    /// Creates a syncer from validated settings and collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Settings`] when settings validation fails.
    pub fn new(settings: SyncSettings, host: H, runner: R) -> Result<Self, SyncError> {
        settings.validate()?;
        let git = GitClient::new(settings.git_bin.clone(), runner);
        Ok(Self {
            settings,
            host,
            git,
        })
    }

    /// Returns the active settings.
    #[must_use]
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Processes `files` in order, each fully before the next is read.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered. With
    /// [`RunOptions::keep_going`], rule failures are logged and the run ends
    /// with [`SyncError::Incomplete`] instead; config file read and parse
    /// errors stay fatal either way.
    pub async fn run(
        &self,
        files: &[Utf8PathBuf],
        options: RunOptions,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        for file in files {
            let rules = load_rules(file)?;
            info!(config = %file, rules = rules.len(), "loaded config");
            report.config_files += 1;

            for rule in &rules {
                report.rules += 1;
                match self.run_rule(rule, options.dry_run).await {
                    Ok(branches) => report.branches.extend(branches),
                    Err(err) if options.keep_going => {
                        error!(config = %file, src = %rule.src, dest = %rule.dest, error = %err, "sync rule failed");
                        report.failures.push(RuleFailure {
                            config: file.clone(),
                            src: rule.src.clone(),
                            dest: rule.dest.clone(),
                            message: err.to_string(),
                        });
                    }
                    Err(err) => {
                        error!(config = %file, src = %rule.src, dest = %rule.dest, "sync rule failed");
                        return Err(err);
                    }
                }
            }
        }

        info!(
            configs = report.config_files,
            rules = report.rules,
            pushed = report.pushed(),
            unchanged = report.unchanged(),
            failed = report.failures.len(),
            dry_run = options.dry_run,
            "sync finished"
        );

        if report.failures.is_empty() {
            Ok(report)
        } else {
            Err(SyncError::Incomplete {
                failed: report.failures.len(),
                total: report.rules,
            })
        }
    }

    async fn run_rule(&self, rule: &SyncRule, dry_run: bool) -> Result<Vec<BranchSync>, SyncError> {
        let plan = rule.plan()?;
        let dest = &plan.destination;
        info!(
            "sync {} to {}/{}/{}",
            plan.source, dest.owner, dest.repo, dest.path
        );
        if dry_run {
            return Ok(Vec::new());
        }
        self.apply(&plan).await
    }

    /// Applies one validated rule to every selected branch.
    ///
    /// # Errors
    ///
    /// Returns the first failing step; the workspace is removed regardless
    /// unless `keep_workspaces` is set.
    pub async fn apply(&self, plan: &SyncPlan) -> Result<Vec<BranchSync>, SyncError> {
        let content = read_source(&self.settings.source_root_path(), &plan.source)?;
        let dest = &plan.destination;
        let repository = dest.slug();

        let remote = self
            .host
            .list_branches(&dest.owner, &dest.repo)
            .await
            .map_err(|source| SyncError::BranchList {
                repository: repository.clone(),
                source,
            })?;
        let selected = plan.filter.select(&remote);
        if selected.is_empty() {
            info!(%repository, remote = remote.len(), "no branch matched, skipping");
            return Ok(Vec::new());
        }
        info!(%repository, branches = ?selected, "resolved branches");

        let workspace = Workspace::create(
            &self.settings.workspace_root_path(),
            self.settings.keep_workspaces,
        )?;
        let url = self.settings.clone_url(&dest.owner, &dest.repo);
        self.git
            .clone_repository(&url, &workspace.checkout_path(&dest.repo))
            .map_err(|source| SyncError::Clone {
                repository: repository.clone(),
                source,
            })?;
        let checkout = workspace.open_checkout(&dest.repo)?;

        let mut results = Vec::with_capacity(selected.len());
        for branch in selected {
            let outcome = self.sync_branch(&checkout, dest, &branch, &content)?;
            results.push(BranchSync {
                repository: repository.clone(),
                branch,
                outcome,
            });
        }
        Ok(results)
    }

    fn sync_branch(
        &self,
        checkout: &Checkout,
        dest: &Destination,
        branch: &str,
        content: &[u8],
    ) -> Result<BranchOutcome, SyncError> {
        let dir: &Utf8Path = checkout.path();
        let repository = dest.slug();
        let slug = repository.as_str();
        let fail = |step: GitStep| move |source: GitError| step.error(slug, branch, source);

        self.git.checkout(dir, branch).map_err(fail(GitStep::Checkout))?;
        checkout.write_file(&dest.path, content)?;

        let status = self
            .git
            .status_short(dir)
            .map_err(fail(GitStep::StatusQuery))?;
        if status.trim().is_empty() {
            info!(%repository, %branch, "unchanged");
            return Ok(BranchOutcome::Unchanged);
        }

        self.git.stage_all(dir).map_err(fail(GitStep::Stage))?;
        self.git
            .commit(dir, &self.settings.commit_message)
            .map_err(fail(GitStep::Commit))?;
        self.git.push(dir).map_err(fail(GitStep::Push))?;

        info!(%repository, %branch, path = %dest.path, "pushed");
        Ok(BranchOutcome::Pushed)
    }
}

/// Per-branch git step, used to attach repository and branch context to a
/// failure.
#[derive(Clone, Copy, Debug)]
enum GitStep {
    Checkout,
    StatusQuery,
    Stage,
    Commit,
    Push,
}

impl GitStep {
    fn error(self, repository: &str, branch: &str, source: GitError) -> SyncError {
        let repository = repository.to_owned();
        let branch = branch.to_owned();
        match self {
            Self::Checkout => SyncError::Checkout {
                repository,
                branch,
                source,
            },
            Self::StatusQuery => SyncError::StatusQuery {
                repository,
                branch,
                source,
            },
            Self::Stage => SyncError::Stage {
                repository,
                branch,
                source,
            },
            Self::Commit => SyncError::Commit {
                repository,
                branch,
                source,
            },
            Self::Push => SyncError::Push {
                repository,
                branch,
                source,
            },
        }
    }
}
