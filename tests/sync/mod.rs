//! Step definitions, fixtures, and scenario bindings for sync behaviour.

mod bdd_steps;
mod scenarios;
mod test_helpers;
