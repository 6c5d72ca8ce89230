//! BDD step definitions for syncing files into destination branches.

use branchsync::{BranchOutcome, RunOptions};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::SyncContext;

#[given("a source file \"{name}\" containing \"{contents}\"")]
fn source_file(sync_context: &SyncContext, name: String, contents: String) {
    sync_context.write_file(&name, &format!("{contents}\n"));
}

#[given("the repository \"{slug}\" has branches \"{branches}\"")]
fn repository_branches(sync_context: &SyncContext, slug: String, branches: String) {
    let names = branches.split_whitespace().collect::<Vec<_>>();
    sync_context.register_branches(&slug, &names);
}

#[given("a rule copying \"{src}\" to \"{dest}\" on branches matching \"{patterns}\"")]
fn rule_with_patterns(sync_context: &SyncContext, src: String, dest: String, patterns: String) {
    let patterns = patterns.split_whitespace().collect::<Vec<_>>();
    sync_context.add_rule(&src, &dest, &patterns);
}

#[given("a rule copying \"{src}\" to \"{dest}\" on every branch")]
fn rule_for_every_branch(sync_context: &SyncContext, src: String, dest: String) {
    sync_context.add_rule(&src, &dest, &[]);
}

#[given("the destination clone succeeds")]
fn clone_succeeds(sync_context: &SyncContext) {
    sync_context.runner.push_success();
}

#[given("branch \"{branch}\" differs from the source")]
fn branch_differs(sync_context: &SyncContext, branch: String) {
    sync_context.script_branch(&branch, true);
}

#[given("branch \"{branch}\" already matches the source")]
fn branch_matches(sync_context: &SyncContext, branch: String) {
    sync_context.script_branch(&branch, false);
}

#[given("checking out a branch fails")]
fn checkout_fails(sync_context: &SyncContext) {
    sync_context.runner.push_failure(1);
}

#[when("I run the sync")]
fn run_sync(sync_context: &SyncContext) {
    sync_context.run(RunOptions::default());
}

#[when("I run the sync in dry-run mode")]
fn run_dry(sync_context: &SyncContext) {
    sync_context.run(RunOptions {
        dry_run: true,
        keep_going: false,
    });
}

#[when("I run the sync with keep-going enabled")]
fn run_keep_going(sync_context: &SyncContext) {
    sync_context.run(RunOptions {
        dry_run: false,
        keep_going: true,
    });
}

#[then("the sync succeeds")]
fn sync_succeeds(sync_context: &SyncContext) {
    let report = sync_context.report();
    assert!(report.failures.is_empty(), "unexpected failures: {report:?}");
}

#[then("the sync fails mentioning \"{text}\"")]
fn sync_fails(sync_context: &SyncContext, text: String) {
    let failure = sync_context.failure();
    assert!(
        failure.contains(&text),
        "expected {text:?} in failure: {failure}"
    );
}

#[then("branch \"{branch}\" of \"{repository}\" is pushed")]
fn branch_pushed(sync_context: &SyncContext, branch: String, repository: String) {
    assert_outcome(sync_context, &repository, &branch, BranchOutcome::Pushed);
}

#[then("branch \"{branch}\" of \"{repository}\" is unchanged")]
fn branch_unchanged(sync_context: &SyncContext, branch: String, repository: String) {
    assert_outcome(sync_context, &repository, &branch, BranchOutcome::Unchanged);
}

#[then("the synced branches were \"{branches}\"")]
fn synced_branches(sync_context: &SyncContext, branches: String) {
    let report = sync_context.report();
    let actual = report
        .branches
        .iter()
        .map(|sync| sync.branch.as_str())
        .collect::<Vec<_>>();
    assert_eq!(actual, branches.split_whitespace().collect::<Vec<_>>());
}

#[then("the git commands were \"{commands}\"")]
fn git_commands(sync_context: &SyncContext, commands: String) {
    assert_eq!(
        sync_context.runner.git_subcommands(),
        commands
            .split_whitespace()
            .map(str::to_owned)
            .collect::<Vec<_>>()
    );
}

#[then("no git command was run")]
fn no_git(sync_context: &SyncContext) {
    let invocations = sync_context.runner.invocations();
    assert!(invocations.is_empty(), "unexpected commands: {invocations:?}");
}

#[then("the hosting API was not called")]
fn no_host_calls(sync_context: &SyncContext) {
    let calls = sync_context.host.borrow().calls();
    assert!(calls.is_empty(), "unexpected API calls: {calls:?}");
}

#[then("no workspace is left behind")]
fn no_workspace(sync_context: &SyncContext) {
    let leftovers = sync_context.leftover_workspaces();
    assert!(leftovers.is_empty(), "workspaces left behind: {leftovers:?}");
}

fn assert_outcome(
    sync_context: &SyncContext,
    repository: &str,
    branch: &str,
    expected: BranchOutcome,
) {
    let report = sync_context.report();
    let found = report
        .branches
        .iter()
        .find(|sync| sync.repository == repository && sync.branch == branch)
        .unwrap_or_else(|| panic!("no outcome for {repository}@{branch}: {report:?}"));
    assert_eq!(found.outcome, expected);
}
