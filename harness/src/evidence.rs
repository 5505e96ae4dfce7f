//! Evidence collection: which prverify reports travel with a bundle.
//!
//! # Sources
//!
//! | Source   | Location                     | Included                         |
//! |----------|------------------------------|----------------------------------|
//! | explicit | caller-supplied path         | that one file, replaces discovery|
//! | tracked  | `docs/evidence/prverify/`    | every `prverify_*.md`, ascending |
//! | local    | `.local/prverify/`           | at most one file bound to HEAD   |
//!
//! Local candidates are tried with names carrying the 12-char HEAD prefix
//! first, then by filename descending (filenames carry a timestamp, so this
//! is newest first). A local file whose basename collides with a tracked one
//! is skipped.
//!
//! A file is bound to HEAD iff its content contains the full 40-char SHA and
//! it is at most 4 MiB. In strict mode explicit evidence must also mention
//! the 12-char prefix, or collection fails. In WIP mode such a file is
//! attached unbound.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use reviewbundle_kernel::contract::Mode;
use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};
use reviewbundle_kernel::layout::{
    binds_to_head, prverify_member_path, validate_member_path, EVIDENCE_BIND_LIMIT,
};

/// Repository-tracked evidence directory, relative to the repo root.
pub const TRACKED_EVIDENCE_DIR: &str = "docs/evidence/prverify";

/// Local untracked evidence directory, relative to the repo root.
pub const LOCAL_EVIDENCE_DIR: &str = ".local/prverify";

const EVIDENCE_PREFIX: &str = "prverify_";
const EVIDENCE_SUFFIX: &str = ".md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceOrigin {
    Explicit,
    Tracked,
    Local,
}

impl EvidenceOrigin {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Tracked => "tracked",
            Self::Local => "local",
        }
    }
}

/// One evidence file selected for the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceFile {
    /// Path inside the bundle (`review/evidence/prverify/<basename>`).
    pub member_path: String,
    /// Where the file was read from.
    pub source: PathBuf,
    pub origin: EvidenceOrigin,
    pub content: Vec<u8>,
    /// Content contains the full HEAD SHA within the size limit.
    pub bound: bool,
}

/// Evidence chosen for one bundle, in member-path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceSet {
    pub files: Vec<EvidenceFile>,
}

impl EvidenceSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// OR of the per-file binding flags.
    #[must_use]
    pub fn bound_to_head(&self) -> bool {
        self.files.iter().any(|f| f.bound)
    }
}

/// Collect evidence for `head_sha` under `repo_root`.
///
/// # Errors
///
/// - [`ErrorKind::Evidence`] if explicit evidence cannot be read, has an
///   unusable name, or in strict mode does not mention the 12-char HEAD
///   prefix
/// - [`ErrorKind::Path`] if a discovery directory exists but cannot be listed
pub fn collect_evidence(
    repo_root: &Path,
    head_sha: &str,
    explicit: Option<&Path>,
    mode: Mode,
) -> BundleResult<EvidenceSet> {
    if let Some(path) = explicit {
        let file = read_explicit(path, head_sha, mode)?;
        tracing::info!(
            source = %file.source.display(),
            bound = file.bound,
            "explicit evidence attached"
        );
        return Ok(EvidenceSet { files: vec![file] });
    }

    let mut files = Vec::new();
    for (name, source) in list_reports(&repo_root.join(TRACKED_EVIDENCE_DIR))? {
        let content = fs::read(&source).map_err(|e| io_error(&source, &e))?;
        let bound = binds_to_head(&content, head_sha);
        tracing::debug!(file = %name, bound, "tracked evidence found");
        files.push(EvidenceFile {
            member_path: prverify_member_path(&name),
            source,
            origin: EvidenceOrigin::Tracked,
            content,
            bound,
        });
    }

    if let Some(local) = select_local(repo_root, head_sha, &files)? {
        tracing::info!(source = %local.source.display(), "local evidence selected");
        files.push(local);
    }

    files.sort_by(|a, b| a.member_path.cmp(&b.member_path));
    Ok(EvidenceSet { files })
}

fn read_explicit(path: &Path, head_sha: &str, mode: Mode) -> BundleResult<EvidenceFile> {
    let display = path.display().to_string();
    let evidence_error = |detail: String| BundleError::new(ErrorKind::Evidence, display.clone(), detail);

    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| evidence_error("evidence path has no usable file name".to_string()))?;
    let member_path = prverify_member_path(basename);
    validate_member_path(&member_path, false)
        .map_err(|e| evidence_error(format!("unusable evidence name: {}", e.detail)))?;

    let content = fs::read(path).map_err(|e| evidence_error(format!("read failed: {e}")))?;
    let head12 = head_sha.get(..12).unwrap_or(head_sha);
    let references_head =
        !head12.is_empty() && content.windows(head12.len()).any(|w| w == head12.as_bytes());
    if !references_head {
        if mode == Mode::Strict {
            return Err(evidence_error(format!(
                "explicit evidence does not reference HEAD {head12}"
            )));
        }
        tracing::warn!(source = %path.display(), head12, "explicit evidence does not reference HEAD");
    }

    Ok(EvidenceFile {
        member_path,
        source: path.to_path_buf(),
        origin: EvidenceOrigin::Explicit,
        bound: binds_to_head(&content, head_sha),
        content,
    })
}

/// First bound candidate from the local directory, skipping basenames
/// already taken by `tracked`.
fn select_local(
    repo_root: &Path,
    head_sha: &str,
    tracked: &[EvidenceFile],
) -> BundleResult<Option<EvidenceFile>> {
    let head12 = head_sha.get(..12).unwrap_or(head_sha);
    let mut candidates = list_reports(&repo_root.join(LOCAL_EVIDENCE_DIR))?;
    candidates.sort_by(|(a, _), (b, _)| {
        let a_named = !head12.is_empty() && a.contains(head12);
        let b_named = !head12.is_empty() && b.contains(head12);
        b_named.cmp(&a_named).then_with(|| b.cmp(a))
    });

    for (name, source) in candidates {
        let member_path = prverify_member_path(&name);
        if tracked.iter().any(|t| t.member_path == member_path) {
            tracing::debug!(file = %name, "local evidence shadowed by tracked file");
            continue;
        }
        let too_big = fs::metadata(&source)
            .map(|m| m.len() > EVIDENCE_BIND_LIMIT as u64)
            .unwrap_or(true);
        if too_big {
            tracing::debug!(file = %name, "local evidence skipped: unreadable or oversized");
            continue;
        }
        let content = fs::read(&source).map_err(|e| io_error(&source, &e))?;
        if binds_to_head(&content, head_sha) {
            return Ok(Some(EvidenceFile {
                member_path,
                source,
                origin: EvidenceOrigin::Local,
                content,
                bound: true,
            }));
        }
        tracing::debug!(file = %name, "local evidence skipped: not bound to HEAD");
    }
    Ok(None)
}

/// `prverify_*.md` regular files in `dir`, ascending by name. A missing
/// directory yields nothing.
fn list_reports(dir: &Path) -> BundleResult<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir, &e)),
    };

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, &e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.starts_with(EVIDENCE_PREFIX) || !name.ends_with(EVIDENCE_SUFFIX) {
            continue;
        }
        // Symlinks and directories are never followed.
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if validate_member_path(&prverify_member_path(&name), false).is_err() {
            continue;
        }
        out.push((name, entry.path()));
    }
    out.sort();
    Ok(out)
}

fn io_error(path: &Path, e: &std::io::Error) -> BundleError {
    BundleError::wrap(ErrorKind::Path, path.display().to_string(), e)
}
