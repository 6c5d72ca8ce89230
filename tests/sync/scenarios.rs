//! BDD scenarios for the sync workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{SyncContext, sync_context};

#[scenario(
    path = "tests/features/sync.feature",
    name = "Only branches whose copy changes the tree are pushed"
)]
fn scenario_push_changed_branches(sync_context: SyncContext) {
    drop(sync_context);
}

#[scenario(
    path = "tests/features/sync.feature",
    name = "Patterns select branches in pattern order"
)]
fn scenario_pattern_order(sync_context: SyncContext) {
    drop(sync_context);
}

#[scenario(
    path = "tests/features/sync.feature",
    name = "Dry runs neither call the hosting API nor run git"
)]
fn scenario_dry_run(sync_context: SyncContext) {
    drop(sync_context);
}

#[scenario(
    path = "tests/features/sync.feature",
    name = "Malformed destinations are rejected"
)]
fn scenario_malformed_destination(sync_context: SyncContext) {
    drop(sync_context);
}

#[scenario(
    path = "tests/features/sync.feature",
    name = "Branch checkout failures abort the rule and clean up"
)]
fn scenario_checkout_failure(sync_context: SyncContext) {
    drop(sync_context);
}

#[scenario(
    path = "tests/features/sync.feature",
    name = "Keep-going mode continues past a failing rule"
)]
fn scenario_keep_going(sync_context: SyncContext) {
    drop(sync_context);
}
