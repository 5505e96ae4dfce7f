//! Hermetic git repositories for end-to-end tests.
//!
//! Every invocation runs with an isolated configuration, fixed author and
//! committer dates, UTC, and the C locale, so commit SHAs depend only on
//! the files committed.

use std::fs;
use std::path::Path;
use std::process::Command;

/// Fixed date for every commit made by the helpers.
pub const FIXED_DATE: &str = "1700000000 +0000";

/// Environment that isolates git from the host configuration.
pub const ISOLATION_ENV: [(&str, &str); 7] = [
    ("GIT_CONFIG_GLOBAL", "/dev/null"),
    ("GIT_CONFIG_NOSYSTEM", "1"),
    ("GIT_AUTHOR_DATE", FIXED_DATE),
    ("GIT_COMMITTER_DATE", FIXED_DATE),
    ("TZ", "UTC"),
    ("LC_ALL", "C"),
    ("GIT_TERMINAL_PROMPT", "0"),
];

/// Identity for commits made directly by the helpers.
pub const IDENTITY_ENV: [(&str, &str); 4] = [
    ("GIT_AUTHOR_NAME", "Lock Test"),
    ("GIT_AUTHOR_EMAIL", "lock@example.invalid"),
    ("GIT_COMMITTER_NAME", "Lock Test"),
    ("GIT_COMMITTER_EMAIL", "lock@example.invalid"),
];

/// Whether a `git` executable can be run.
#[must_use]
pub fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

/// Run hermetic git in `repo` and return trimmed stdout.
///
/// # Panics
///
/// Panics if git cannot run or exits non-zero.
pub fn must_git(repo: &Path, args: &[&str]) -> String {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo).args(args);
    for (k, v) in ISOLATION_ENV.iter().chain(IDENTITY_ENV.iter()) {
        cmd.env(k, v);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("git {args:?} failed to start: {e}"));
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Write `content` to `rel` under `repo`, creating parent directories.
///
/// # Panics
///
/// Panics on I/O failure.
pub fn write_file(repo: &Path, rel: &str, content: &str) {
    let path = repo.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Initialise a repository with `main` (one commit) and a checked-out
/// `feature` branch one commit ahead. `.local/` is ignored.
///
/// Returns the `HEAD` SHA.
///
/// # Panics
///
/// Panics if any git step fails.
pub fn init_feature_repo(repo: &Path) -> String {
    fs::create_dir_all(repo).unwrap();
    must_git(repo, &["init", "-q"]);
    must_git(repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    write_file(repo, ".gitignore", ".local/\n");
    write_file(repo, "README.md", "# fixture\n");
    must_git(repo, &["add", "."]);
    must_git(repo, &["commit", "-q", "-m", "initial"]);
    must_git(repo, &["checkout", "-q", "-b", "feature"]);
    write_file(repo, "src/lib.rs", "pub fn answer() -> u32 { 42 }\n");
    must_git(repo, &["add", "."]);
    must_git(repo, &["commit", "-q", "-m", "add answer"]);
    must_git(repo, &["rev-parse", "HEAD"])
}
