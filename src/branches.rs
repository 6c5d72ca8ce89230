//! Branch selection against configured regular expressions.

use regex::Regex;

use crate::rules::RuleError;

/// Compiled branch patterns for one rule.
#[derive(Clone, Debug)]
pub struct BranchFilter {
    patterns: Vec<Regex>,
}

impl BranchFilter {
    /// Compiles `patterns` in order. Patterns use search semantics, so
    /// `main` also matches `maintenance`; anchor with `^…$` for exact names.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] for the first pattern that does
    /// not compile.
    pub fn new(patterns: &[String]) -> Result<Self, RuleError> {
        let compiled = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| RuleError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns: compiled,
        })
    }

    /// Returns `true` when no patterns were configured.
    #[must_use]
    pub const fn selects_all(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Selects branches to sync from the remote list.
    ///
    /// Without patterns every branch is returned in remote order. Otherwise
    /// patterns are visited in configuration order and each appends the
    /// branches it matches, in remote order, that an earlier pattern has not
    /// already selected.
    #[must_use]
    pub fn select(&self, branches: &[String]) -> Vec<String> {
        if self.selects_all() {
            return branches.to_vec();
        }

        let mut selected: Vec<String> = Vec::new();
        for pattern in &self.patterns {
            for branch in branches {
                if pattern.is_match(branch) && !selected.contains(branch) {
                    selected.push(branch.clone());
                }
            }
        }
        selected
    }
}
