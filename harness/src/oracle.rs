//! Git oracle: the creator's only window onto the repository.
//!
//! The orchestrator talks to git exclusively through [`GitOracle`]. The
//! production implementation [`GitCli`] shells out to the `git` executable;
//! tests substitute an in-memory oracle.
//!
//! Git output is untrusted: SHAs are trimmed and shape-checked, timestamps
//! parsed strictly. Every failure is a `contract` error whose path names the
//! git operation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use reviewbundle_kernel::digest::is_commit_sha;
use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};

/// Identity used for autocommits when the repository has none configured.
pub const FALLBACK_USER_NAME: &str = "veil-ci";
pub const FALLBACK_USER_EMAIL: &str = "veil-ci@example.invalid";

/// Repository queries and the single mutation (autocommit) the creator needs.
pub trait GitOracle {
    /// Full lowercase SHA of `HEAD`.
    ///
    /// # Errors
    ///
    /// Fails if git fails or prints anything but 40 lowercase hex chars.
    fn head_sha(&self) -> BundleResult<String>;

    /// Whether `status --porcelain` reports anything (tracked or untracked).
    ///
    /// # Errors
    ///
    /// Fails if git fails.
    fn dirty(&self) -> BundleResult<bool>;

    /// Whether tracked files have unstaged modifications.
    ///
    /// # Errors
    ///
    /// Fails if git fails.
    fn has_unstaged(&self) -> BundleResult<bool>;

    /// Committer time of `HEAD` in UNIX seconds.
    ///
    /// # Errors
    ///
    /// Fails if git fails or the output is not an integer.
    fn commit_time(&self) -> BundleResult<i64>;

    /// `format-patch --stdout <base>..<head>` bytes.
    ///
    /// # Errors
    ///
    /// Fails if git fails.
    fn format_patch(&self, base: &str, head: &str) -> BundleResult<Vec<u8>>;

    /// Commit the staged index with `message`, gpg signing disabled, using the
    /// fallback identity for any of `user.name`/`user.email` not configured.
    ///
    /// # Errors
    ///
    /// Fails if git fails.
    fn commit(&self, message: &str) -> BundleResult<()>;

    /// Absolute path of the work tree root.
    ///
    /// # Errors
    ///
    /// Fails if git fails.
    fn toplevel(&self) -> BundleResult<PathBuf>;
}

/// [`GitOracle`] backed by the `git` executable, run as `git -C <repo_dir>`.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
    envs: Vec<(String, String)>,
}

impl GitCli {
    #[must_use]
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            envs: Vec::new(),
        }
    }

    /// Add an environment variable to every git invocation.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo_dir).args(args);
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd
    }

    /// Run git and return stdout; non-zero exit is an error.
    fn run(&self, op: &str, args: &[&str]) -> BundleResult<Vec<u8>> {
        let output = self
            .command(args)
            .output()
            .map_err(|e| git_error(op, format!("execution failed: {e}")))?;
        if !output.status.success() {
            return Err(git_error(
                op,
                format!(
                    "exit {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(output.stdout)
    }

    fn run_trimmed(&self, op: &str, args: &[&str]) -> BundleResult<String> {
        let stdout = self.run(op, args)?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// `git config --get <key>`; unset keys yield `None`.
    fn config_value(&self, key: &str) -> Option<String> {
        let output = self.command(["config", "--get", key]).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    }
}

fn git_error(op: &str, detail: String) -> BundleError {
    BundleError::new(ErrorKind::Contract, format!("git {op}"), detail)
}

impl GitOracle for GitCli {
    fn head_sha(&self) -> BundleResult<String> {
        let sha = self.run_trimmed("rev-parse", &["rev-parse", "HEAD"])?;
        if !is_commit_sha(&sha) {
            return Err(git_error(
                "rev-parse",
                format!("unexpected HEAD output: {sha:?}"),
            ));
        }
        Ok(sha)
    }

    fn dirty(&self) -> BundleResult<bool> {
        let out = self.run_trimmed("status", &["status", "--porcelain"])?;
        Ok(!out.is_empty())
    }

    fn has_unstaged(&self) -> BundleResult<bool> {
        let out = self.run_trimmed("diff", &["diff", "--name-only"])?;
        Ok(!out.is_empty())
    }

    fn commit_time(&self) -> BundleResult<i64> {
        let out = self.run_trimmed("show", &["show", "-s", "--format=%ct", "HEAD"])?;
        out.parse()
            .map_err(|_| git_error("show", format!("unexpected commit time: {out:?}")))
    }

    fn format_patch(&self, base: &str, head: &str) -> BundleResult<Vec<u8>> {
        // git would parse a leading '-' as an option.
        if base.is_empty() || base.starts_with('-') {
            return Err(git_error(
                "format-patch",
                format!("invalid base ref: {base:?}"),
            ));
        }
        let range = format!("{base}..{head}");
        self.run("format-patch", &["format-patch", "--stdout", &range])
    }

    fn commit(&self, message: &str) -> BundleResult<()> {
        let name_cfg = format!("user.name={FALLBACK_USER_NAME}");
        let email_cfg = format!("user.email={FALLBACK_USER_EMAIL}");
        let mut args: Vec<&str> = vec!["-c", "commit.gpgsign=false"];
        if self.config_value("user.name").is_none() {
            args.extend(["-c", &name_cfg]);
        }
        if self.config_value("user.email").is_none() {
            args.extend(["-c", &email_cfg]);
        }
        args.extend(["commit", "-m", message]);
        self.run("commit", &args)?;
        Ok(())
    }

    fn toplevel(&self) -> BundleResult<PathBuf> {
        let out = self.run_trimmed("rev-parse", &["rev-parse", "--show-toplevel"])?;
        if out.is_empty() {
            return Err(git_error("rev-parse", "empty toplevel".to_string()));
        }
        Ok(PathBuf::from(out))
    }
}
