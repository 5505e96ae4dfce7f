//! Bundle creation: git state, evidence, and policy in; a verified archive out.
//!
//! # Strict ritual
//!
//! 1. Emit `HEAD_START`.
//! 2. Dirty worktree: refuse, unless autocommit is on, in which case a commit
//!    message is required, unstaged changes refuse, and the staged index is
//!    committed. `HEAD` is re-read and `HEAD_NOW` emitted.
//! 3. Collect evidence; refuse if none is bound to `HEAD`.
//!
//! WIP mode tolerates a dirty tree and unbound evidence, recording each as a
//! line in `review/meta/warnings.txt`.
//!
//! Ritual events go to the caller's sink as they happen, so a refusal still
//! leaves the caller with everything emitted up to that point.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use reviewbundle_archive::{persist_bundle, seal_bundle, VerifyOptions, VerifyReport};
use reviewbundle_kernel::contract::{Contract, Mode};
use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};
use reviewbundle_kernel::layout::{
    archive_filename, DIR_EVIDENCE, PATH_CONTRACT, PATH_INDEX, PATH_SERIES_PATCH, PATH_WARNINGS,
};

use crate::epoch::{resolve_epoch, EpochSource};
use crate::evidence::{collect_evidence, EvidenceSet};
use crate::oracle::GitOracle;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUT_DIR: &str = ".local/review-bundles";

/// Default base ref for `format-patch`.
pub const DEFAULT_BASE_REF: &str = "main";

pub const WARNING_DIRTY: &str = "dirty worktree";
pub const WARNING_UNBOUND_EVIDENCE: &str = "evidence present but not bound to HEAD";

/// Heavy verification policy. Recorded in `INDEX.md` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeavyMode {
    #[default]
    Auto,
    Never,
    Force,
}

impl HeavyMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Never => "never",
            Self::Force => "force",
        }
    }

    /// # Errors
    ///
    /// Returns a [`ErrorKind::Contract`] failure for anything but
    /// `auto`, `never`, or `force`.
    pub fn parse(s: &str) -> BundleResult<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "never" => Ok(Self::Never),
            "force" => Ok(Self::Force),
            other => Err(BundleError::new(
                ErrorKind::Contract,
                "heavy",
                format!("invalid heavy mode: {other} (want auto|never|force)"),
            )),
        }
    }
}

/// Inputs to [`create_bundle`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub mode: Mode,
    pub out_dir: PathBuf,
    pub base_ref: String,
    /// Overrides the basename of the repository top level.
    pub repo_name: Option<String>,
    pub heavy: HeavyMode,
    pub autocommit: bool,
    pub commit_message: Option<String>,
    /// Explicit evidence file; replaces discovery.
    pub evidence_report: Option<PathBuf>,
    /// Raw `SOURCE_DATE_EPOCH` value, read by the caller.
    pub epoch_override: Option<String>,
    /// Options for the self-verify pass.
    pub verify: VerifyOptions,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Wip,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            base_ref: DEFAULT_BASE_REF.to_string(),
            repo_name: None,
            heavy: HeavyMode::Auto,
            autocommit: false,
            commit_message: None,
            evidence_report: None,
            epoch_override: None,
            verify: VerifyOptions::default(),
        }
    }
}

/// Progress milestones emitted during creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RitualEvent {
    HeadStart { head_sha: String },
    RepoDirty,
    HeadNow { head_sha: String },
    EvidenceAttached { member_path: String, bound: bool },
}

impl RitualEvent {
    /// Single machine-readable output line.
    #[must_use]
    pub fn line(&self) -> String {
        match self {
            Self::HeadStart { head_sha } => format!("OK: HEAD_START={head_sha}"),
            Self::RepoDirty => "INFO: repo dirty".to_string(),
            Self::HeadNow { head_sha } => format!("OK: committed; HEAD_NOW={head_sha}"),
            Self::EvidenceAttached { member_path, bound } => {
                format!("OK: evidence_report={member_path} bound_to_head={bound}")
            }
        }
    }
}

/// Result of a successful [`create_bundle`].
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub path: PathBuf,
    pub contract: Contract,
    pub epoch_source: EpochSource,
    pub warnings: Vec<String>,
    /// Self-verify report for the written archive.
    pub report: VerifyReport,
}

/// Create, self-verify, and persist a review bundle.
///
/// # Errors
///
/// - [`ErrorKind::Contract`] for a dirty strict tree, autocommit
///   preconditions, git failures, or invalid options
/// - [`ErrorKind::Evidence`] when strict mode finds no evidence bound to HEAD
///   or explicit evidence is unusable
/// - any writer, persistence, or self-verify failure
pub fn create_bundle(
    opts: &CreateOptions,
    git: &dyn GitOracle,
    sink: &mut dyn FnMut(RitualEvent),
) -> BundleResult<CreateOutcome> {
    let mut emit = |event: RitualEvent| {
        tracing::info!(event = %event.line(), "ritual");
        sink(event);
    };
    let mut warnings = Vec::new();

    let mut head_sha = git.head_sha()?;
    emit(RitualEvent::HeadStart {
        head_sha: head_sha.clone(),
    });

    if git.dirty()? {
        emit(RitualEvent::RepoDirty);
        match opts.mode {
            Mode::Wip => warnings.push(WARNING_DIRTY.to_string()),
            Mode::Strict if !opts.autocommit => {
                return Err(BundleError::new(
                    ErrorKind::Contract,
                    "git",
                    "repo dirty: prohibited in strict mode",
                ));
            }
            Mode::Strict => {
                head_sha = autocommit(opts, git)?;
                emit(RitualEvent::HeadNow {
                    head_sha: head_sha.clone(),
                });
            }
        }
    }

    let (epoch_sec, epoch_source) = resolve_epoch(opts.epoch_override.as_deref(), git)?;
    let toplevel = git.toplevel()?;
    let repo = match &opts.repo_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => repo_basename(&toplevel),
    };

    let evidence = collect_evidence(
        &toplevel,
        &head_sha,
        opts.evidence_report.as_deref(),
        opts.mode,
    )?;
    for file in &evidence.files {
        emit(RitualEvent::EvidenceAttached {
            member_path: file.member_path.clone(),
            bound: file.bound,
        });
    }
    if !evidence.bound_to_head() {
        match opts.mode {
            Mode::Strict => {
                return Err(BundleError::new(
                    ErrorKind::Evidence,
                    DIR_EVIDENCE,
                    format!(
                        "evidence_required mode=strict: no evidence bound to HEAD {}",
                        head_sha.get(..12).unwrap_or(&head_sha)
                    ),
                ));
            }
            Mode::Wip if !evidence.is_empty() => {
                warnings.push(WARNING_UNBOUND_EVIDENCE.to_string());
            }
            Mode::Wip => {}
        }
    }

    let patch = git.format_patch(&opts.base_ref, &head_sha)?;

    let mut contract = Contract::new(opts.mode, repo, epoch_sec, &opts.base_ref, &head_sha);
    contract.warnings_count = warnings.len() as u64;
    contract.evidence.present = !evidence.is_empty();
    contract.evidence.bound_to_head = evidence.bound_to_head();
    contract.validate()?;

    let mut members = BTreeMap::new();
    members.insert(
        PATH_INDEX.to_string(),
        render_index(&contract, opts.heavy, &evidence).into_bytes(),
    );
    members.insert(PATH_CONTRACT.to_string(), contract.encode()?);
    members.insert(PATH_SERIES_PATCH.to_string(), patch);
    if !warnings.is_empty() {
        members.insert(PATH_WARNINGS.to_string(), render_warnings(&warnings));
    }
    for file in evidence.files {
        members.insert(file.member_path, file.content);
    }
    let bundle = seal_bundle(members)?;

    let filename = archive_filename(&contract.repo, contract.mode, epoch_sec, &head_sha)?;
    let path = opts.out_dir.join(filename);
    let report = persist_bundle(&bundle, epoch_sec, &path, opts.verify)?;

    Ok(CreateOutcome {
        path,
        contract,
        epoch_source,
        warnings,
        report,
    })
}

/// Commit the staged index and return the new `HEAD`.
fn autocommit(opts: &CreateOptions, git: &dyn GitOracle) -> BundleResult<String> {
    let message = opts
        .commit_message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            BundleError::new(
                ErrorKind::Contract,
                "commit_message",
                "autocommit requires a commit message",
            )
        })?;
    if git.has_unstaged()? {
        return Err(BundleError::new(
            ErrorKind::Contract,
            "git",
            "unstaged changes exist; stage them before autocommit",
        ));
    }
    git.commit(message)?;
    let head_sha = git.head_sha()?;
    if git.dirty()? {
        return Err(BundleError::new(
            ErrorKind::Contract,
            "git",
            "repo still dirty after autocommit",
        ));
    }
    Ok(head_sha)
}

fn repo_basename(toplevel: &Path) -> String {
    toplevel
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn render_index(contract: &Contract, heavy: HeavyMode, evidence: &EvidenceSet) -> String {
    let mut out = String::from("# Review Bundle\n\n");
    // Writing to a String cannot fail.
    let _ = writeln!(out, "- Mode: {}", contract.mode.as_str());
    let _ = writeln!(out, "- Repo: {}", contract.repo);
    let _ = writeln!(out, "- Epoch: {}", contract.epoch_sec);
    let _ = writeln!(out, "- Base: {}", contract.base_ref);
    let _ = writeln!(out, "- Head: {}", contract.head_sha);
    let _ = writeln!(out, "- Heavy: {}", heavy.as_str());
    let _ = writeln!(out, "- Warnings: {}", contract.warnings_count);
    out.push_str("\n## Evidence\n\n");
    if evidence.is_empty() {
        out.push_str("- none\n");
    }
    for file in &evidence.files {
        let _ = writeln!(
            out,
            "- {} (bound_to_head={})",
            file.member_path, file.bound
        );
    }
    out
}

fn render_warnings(warnings: &[String]) -> Vec<u8> {
    let mut out = String::new();
    for w in warnings {
        out.push_str(w);
        out.push('\n');
    }
    out.into_bytes()
}
