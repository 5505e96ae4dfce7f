//! A fixed [`GitOracle`] for scenarios that need exact SHAs and epochs.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;

use reviewbundle_harness::GitOracle;
use reviewbundle_kernel::error::BundleResult;

/// HEAD SHA used by the scenarios: forty `a`s.
#[must_use]
pub fn scenario_head() -> String {
    "a".repeat(40)
}

/// Scenario epoch: 2020-09-13 12:26:40 UTC.
pub const SCENARIO_EPOCH: i64 = 1_600_000_000;

/// Oracle answering from fixed values. `commit` is recorded and moves
/// `HEAD` to `head_after_commit`.
pub struct FixedGit {
    pub head: RefCell<String>,
    pub dirty: Cell<bool>,
    pub unstaged: Cell<bool>,
    pub commit_time: i64,
    pub patch: Vec<u8>,
    pub toplevel: PathBuf,
    pub head_after_commit: String,
    pub commits: RefCell<Vec<String>>,
}

impl FixedGit {
    /// A clean repository at `toplevel` with the scenario HEAD and epoch.
    #[must_use]
    pub fn clean(toplevel: PathBuf) -> Self {
        Self {
            head: RefCell::new(scenario_head()),
            dirty: Cell::new(false),
            unstaged: Cell::new(false),
            commit_time: SCENARIO_EPOCH,
            patch: b"From aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa Mon Sep 17 00:00:00 2001\n\
Subject: [PATCH] fixture\n\n---\n README.md | 1 +\n"
                .to_vec(),
            toplevel,
            head_after_commit: "b".repeat(40),
            commits: RefCell::new(Vec::new()),
        }
    }
}

impl GitOracle for FixedGit {
    fn head_sha(&self) -> BundleResult<String> {
        Ok(self.head.borrow().clone())
    }

    fn dirty(&self) -> BundleResult<bool> {
        Ok(self.dirty.get())
    }

    fn has_unstaged(&self) -> BundleResult<bool> {
        Ok(self.unstaged.get())
    }

    fn commit_time(&self) -> BundleResult<i64> {
        Ok(self.commit_time)
    }

    fn format_patch(&self, _base: &str, _head: &str) -> BundleResult<Vec<u8>> {
        Ok(self.patch.clone())
    }

    fn commit(&self, message: &str) -> BundleResult<()> {
        self.commits.borrow_mut().push(message.to_string());
        self.head.replace(self.head_after_commit.clone());
        self.dirty.set(false);
        Ok(())
    }

    fn toplevel(&self) -> BundleResult<PathBuf> {
        Ok(self.toplevel.clone())
    }
}
