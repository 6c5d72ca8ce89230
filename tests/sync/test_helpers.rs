//! Shared fixtures for sync BDD scenarios.

use std::cell::RefCell;
use std::fs;

use branchsync::test_support::{ScriptedRunner, StaticHost, settings_for};
use branchsync::{RunOptions, SyncReport, Syncer};
use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Result of the `When` step: the report, or the rendered error.
pub type SyncOutcome = Result<SyncReport, String>;

/// Mutable scenario state shared by reference between steps.
#[derive(Debug)]
pub struct SyncContext {
    pub root: Utf8PathBuf,
    pub runner: ScriptedRunner,
    pub host: RefCell<StaticHost>,
    pub rules: RefCell<Vec<Value>>,
    pub outcome: RefCell<Option<SyncOutcome>>,
    pub scripted_branches: RefCell<Vec<String>>,
    _tmp: TempDir,
}

impl SyncContext {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("create scenario root: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("scenario root not UTF-8: {}", path.display()));
        Self {
            root,
            runner: ScriptedRunner::materialising_clones(),
            host: RefCell::new(StaticHost::new()),
            rules: RefCell::new(Vec::new()),
            outcome: RefCell::new(None),
            scripted_branches: RefCell::new(Vec::new()),
            _tmp: tmp,
        }
    }

    pub fn write_file(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        fs::write(&path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
    }

    pub fn register_branches(&self, slug: &str, branches: &[&str]) {
        let host = self.host.take();
        self.host.replace(host.with_branches(slug, branches));
    }

    /// Queues the git responses for `branch` and remembers the order the
    /// executor is expected to check branches out in.
    pub fn script_branch(&self, branch: &str, dirty: bool) {
        if dirty {
            self.runner.push_dirty_branch();
        } else {
            self.runner.push_clean_branch();
        }
        self.scripted_branches.borrow_mut().push(branch.to_owned());
    }

    /// Branch arguments of every `git checkout` run so far.
    pub fn checked_out_branches(&self) -> Vec<String> {
        self.runner
            .invocations()
            .iter()
            .filter(|call| call.git_subcommand().as_deref() == Some("checkout"))
            .filter_map(|call| {
                call.args
                    .iter()
                    .skip_while(|arg| *arg != "checkout")
                    .nth(1)
                    .map(|arg| arg.to_string_lossy().into_owned())
            })
            .collect()
    }

    pub fn add_rule(&self, src: &str, dest: &str, patterns: &[&str]) {
        self.rules
            .borrow_mut()
            .push(json!({ "src": src, "dest": dest, "branches": patterns }));
    }

    /// Writes the accumulated rules to one config file and runs the syncer.
    pub fn run(&self, options: RunOptions) {
        let config = self.root.join("sync.json");
        let rules = Value::Array(self.rules.borrow().clone());
        fs::write(&config, rules.to_string())
            .unwrap_or_else(|err| panic!("write {config}: {err}"));

        let syncer = Syncer::new(
            settings_for(&self.root),
            self.host.borrow().clone(),
            self.runner.clone(),
        )
        .unwrap_or_else(|err| panic!("build syncer: {err}"));
        let runtime = Runtime::new().unwrap_or_else(|err| panic!("start runtime: {err}"));
        let outcome = runtime
            .block_on(syncer.run(&[config], options))
            .map_err(|err| err.to_string());
        self.outcome.replace(Some(outcome));

        let scripted = self.scripted_branches.borrow();
        let checked_out = self.checked_out_branches();
        assert_eq!(
            checked_out.get(..scripted.len()),
            Some(scripted.as_slice()),
            "branches were checked out in a different order than scripted"
        );
    }

    pub fn report(&self) -> SyncReport {
        match self.outcome.borrow().as_ref() {
            Some(Ok(report)) => report.clone(),
            Some(Err(err)) => panic!("expected success, got failure: {err}"),
            None => panic!("the sync has not run"),
        }
    }

    pub fn failure(&self) -> String {
        match self.outcome.borrow().as_ref() {
            Some(Err(err)) => err.clone(),
            Some(Ok(report)) => panic!("expected failure, got success: {report:?}"),
            None => panic!("the sync has not run"),
        }
    }

    pub fn leftover_workspaces(&self) -> Vec<String> {
        workspace_names(&self.root)
    }
}

fn workspace_names(root: &Utf8Path) -> Vec<String> {
    fs::read_dir(root)
        .unwrap_or_else(|err| panic!("read {root}: {err}"))
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("branchsync-"))
        .collect()
}

#[fixture]
pub fn sync_context() -> SyncContext {
    SyncContext::new()
}
