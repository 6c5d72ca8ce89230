//! Outcome types collected during a run.

use camino::Utf8PathBuf;

/// Terminal state of one branch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BranchOutcome {
    /// The copy left the working tree clean; nothing was committed.
    Unchanged,
    /// A commit was created and pushed.
    Pushed,
}

/// Outcome for one branch of one destination repository.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BranchSync {
    /// `owner/repo` slug.
    pub repository: String,
    /// Branch name.
    pub branch: String,
    /// What happened on the branch.
    pub outcome: BranchOutcome,
}

/// A rule that failed while running in keep-going mode.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuleFailure {
    /// Config file the rule came from.
    pub config: Utf8PathBuf,
    /// Rule source path.
    pub src: String,
    /// Rule destination locator.
    pub dest: String,
    /// Rendered error.
    pub message: String,
}

/// Summary of a run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SyncReport {
    /// Config files processed.
    pub config_files: usize,
    /// Rules attempted.
    pub rules: usize,
    /// Per-branch outcomes in processing order.
    pub branches: Vec<BranchSync>,
    /// Rules that failed in keep-going mode.
    pub failures: Vec<RuleFailure>,
}

impl SyncReport {
    /// Number of branches that received a commit.
    #[must_use]
    pub fn pushed(&self) -> usize {
        self.count(BranchOutcome::Pushed)
    }

    /// Number of branches left untouched.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.count(BranchOutcome::Unchanged)
    }

    fn count(&self, outcome: BranchOutcome) -> usize {
        self.branches
            .iter()
            .filter(|branch| branch.outcome == outcome)
            .count()
    }
}
