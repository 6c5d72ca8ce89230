//! Test support utilities shared across unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use tokio::sync::{Mutex, MutexGuard};

use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::config::{DEFAULT_API_BASE_URL, DEFAULT_CLONE_URL_TEMPLATE, SyncSettings};
use crate::host::{HostError, HostFuture, RepositoryHost};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic git outcomes without spawning processes.
/// When clone materialisation is enabled, a successful `clone` creates its
/// target directory so later file writes have somewhere to land.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
    materialise_clones: Rc<Cell<bool>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the git subcommand, skipping a leading `-C <dir>`.
    #[must_use]
    pub fn git_subcommand(&self) -> Option<String> {
        let mut args = self.args.iter();
        let first = args.next()?;
        let subcommand = if first == "-C" {
            args.nth(1)?
        } else {
            first
        };
        Some(subcommand.to_string_lossy().into_owned())
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner whose successful clones create the target directory.
    #[must_use]
    pub fn materialising_clones() -> Self {
        let runner = Self::default();
        runner.materialise_clones.set(true);
        runner
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Returns the git subcommands invoked so far, in order.
    #[must_use]
    pub fn git_subcommands(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .filter_map(CommandInvocation::git_subcommand)
            .collect()
    }

    /// Returns the number of responses not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.responses.borrow().len()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    /// Queues the responses for one branch whose copy changes the tree:
    /// checkout, dirty status, add, commit, and push.
    pub fn push_dirty_branch(&self) {
        self.push_success();
        self.push_output(Some(0), " M VERSION\n", "");
        self.push_success();
        self.push_success();
        self.push_success();
    }

    /// Queues the responses for one branch left clean: checkout and an
    /// empty status.
    pub fn push_clean_branch(&self) {
        self.push_success();
        self.push_output(Some(0), "", "");
    }

    fn materialise_clone(args: &[OsString]) {
        if !args.first().is_some_and(|arg| arg == "clone") {
            return;
        }
        let Some(target) = args.last().and_then(|arg| arg.to_str()) else {
            return;
        };
        let path = Utf8Path::new(target);
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            let parent = if parent.as_str().is_empty() {
                Utf8Path::new(".")
            } else {
                parent
            };
            Dir::open_ambient_dir(parent, ambient_authority())
                .and_then(|dir| dir.create_dir_all(name))
                .ok();
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        let output = self
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })?;
        if output.is_success() && self.materialise_clones.get() {
            Self::materialise_clone(args);
        }
        Ok(output)
    }
}

/// In-memory hosting API keyed by `owner/repo`.
#[derive(Clone, Debug, Default)]
pub struct StaticHost {
    branches: HashMap<String, Vec<String>>,
    calls: Arc<StdMutex<Vec<String>>>,
}

impl StaticHost {
    /// Creates a host that knows no repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the branch list for `slug` (`owner/repo`).
    #[must_use]
    pub fn with_branches(mut self, slug: &str, branches: &[&str]) -> Self {
        self.branches.insert(
            slug.to_owned(),
            branches.iter().map(|name| (*name).to_owned()).collect(),
        );
        self
    }

    /// Returns the `owner/repo` slugs listed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RepositoryHost for StaticHost {
    fn list_branches<'a>(&'a self, owner: &'a str, repo: &'a str) -> HostFuture<'a, Vec<String>> {
        let slug = format!("{owner}/{repo}");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(slug.clone());
        let result = self
            .branches
            .get(&slug)
            .cloned()
            .ok_or_else(|| HostError::Status {
                url: format!("static://{slug}/branches"),
                status: 404,
                body: String::from("Not Found"),
            });
        Box::pin(std::future::ready(result))
    }
}

/// Settings rooted at `root` for both sources and workspaces.
#[must_use]
pub fn settings_for(root: &Utf8Path) -> SyncSettings {
    SyncSettings {
        git_bin: String::from("git"),
        git_host: String::from("github.com"),
        clone_url_template: String::from(DEFAULT_CLONE_URL_TEMPLATE),
        api_base_url: String::from(DEFAULT_API_BASE_URL),
        commit_message: String::from("chore: Sync by .github"),
        workspace_root: root.to_string(),
        source_root: root.to_string(),
        keep_workspaces: false,
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
