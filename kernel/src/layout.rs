//! Fixed member layout of a review bundle and member-path safety rules.
//!
//! # Layout (contract v1.1)
//!
//! ```text
//! review/INDEX.md
//! review/meta/contract.json
//! review/meta/SHA256SUMS
//! review/meta/SHA256SUMS.sha256
//! review/meta/warnings.txt              (iff warnings_count > 0)
//! review/patch/series.patch
//! review/evidence/prverify/<file>.md    (zero or more)
//! ```
//!
//! Path rules are lexical only. No filesystem is consulted.

use crate::contract::Mode;
use crate::error::{BundleError, BundleResult, ErrorKind};

pub const PATH_INDEX: &str = "review/INDEX.md";
pub const PATH_CONTRACT: &str = "review/meta/contract.json";
pub const PATH_SHA256SUMS: &str = "review/meta/SHA256SUMS";
pub const PATH_SHA256SUMS_SEAL: &str = "review/meta/SHA256SUMS.sha256";
pub const PATH_WARNINGS: &str = "review/meta/warnings.txt";
pub const PATH_SERIES_PATCH: &str = "review/patch/series.patch";

/// Prefix under which every evidence attachment lives.
pub const DIR_EVIDENCE: &str = "review/evidence/";

/// Prefix for prverify evidence attachments.
pub const DIR_EVIDENCE_PRVERIFY: &str = "review/evidence/prverify/";

/// Members every bundle must contain.
pub const REQUIRED_MEMBERS: [&str; 5] = [
    PATH_INDEX,
    PATH_CONTRACT,
    PATH_SHA256SUMS,
    PATH_SHA256SUMS_SEAL,
    PATH_SERIES_PATCH,
];

/// Maximum evidence size considered for HEAD binding (4 MiB).
pub const EVIDENCE_BIND_LIMIT: usize = 4 * 1024 * 1024;

/// Whether a member path is excluded from the manifest (the manifest itself and its seal).
#[must_use]
pub fn is_manifest_excluded(path: &str) -> bool {
    path == PATH_SHA256SUMS || path == PATH_SHA256SUMS_SEAL
}

/// Whether a member path is an evidence attachment.
#[must_use]
pub fn is_evidence_path(path: &str) -> bool {
    path.starts_with(DIR_EVIDENCE) && path.len() > DIR_EVIDENCE.len()
}

/// Whether evidence content is bound to `head_sha`.
///
/// Content larger than [`EVIDENCE_BIND_LIMIT`] never binds. An empty
/// `head_sha` never binds.
#[must_use]
pub fn binds_to_head(content: &[u8], head_sha: &str) -> bool {
    let needle = head_sha.as_bytes();
    if needle.is_empty() || content.len() > EVIDENCE_BIND_LIMIT {
        return false;
    }
    content.windows(needle.len()).any(|w| w == needle)
}

/// Bundle path for a prverify evidence file with the given basename.
#[must_use]
pub fn prverify_member_path(basename: &str) -> String {
    format!("{DIR_EVIDENCE_PRVERIFY}{basename}")
}

/// Lexically clean a slash-separated path.
///
/// Collapses repeated slashes, drops `.` segments, resolves `..` against a
/// preceding non-`..` segment, and strips any trailing slash. An empty
/// result becomes `"."` (or `"/"` for rooted input). This mirrors the
/// classic Plan 9 `cleanname` rules.
#[must_use]
pub fn clean_path(p: &str) -> String {
    if p.is_empty() {
        return ".".to_string();
    }
    let rooted = p.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in p.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            s => out.push(s),
        }
    }
    let joined = out.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Validate a tar member name.
///
/// Rejects absolute paths, NUL, backslashes, and `..` segments. The name
/// must equal its cleaned form; directories may additionally carry exactly
/// one trailing slash.
///
/// # Errors
///
/// Returns a [`ErrorKind::Path`] failure scoped to `name`.
pub fn validate_member_path(name: &str, is_dir: bool) -> BundleResult<()> {
    if name.is_empty() {
        return Err(BundleError::new(ErrorKind::Path, name, "empty path"));
    }
    if name.starts_with('/') {
        return Err(BundleError::new(
            ErrorKind::Path,
            name,
            "absolute path forbidden",
        ));
    }
    if name.contains('\0') {
        return Err(BundleError::new(ErrorKind::Path, name, "contains NUL char"));
    }
    if name.contains('\\') {
        return Err(BundleError::new(ErrorKind::Path, name, "contains backslash"));
    }
    if name.split('/').any(|seg| seg == "..") {
        return Err(BundleError::new(
            ErrorKind::Path,
            name,
            "parent traversal prohibited",
        ));
    }
    let clean = clean_path(name);
    let normalized = name == clean || (is_dir && name.strip_suffix('/') == Some(clean.as_str()));
    if !normalized {
        return Err(BundleError::new(
            ErrorKind::Path,
            name,
            "path not normalized",
        ));
    }
    Ok(())
}

/// Validate a path listed in `SHA256SUMS`.
///
/// # Errors
///
/// Returns a [`ErrorKind::Path`] failure tagged `manifest_path_invalid`.
pub fn validate_manifest_path(path: &str) -> BundleResult<()> {
    let fail = |detail: &str| {
        Err(BundleError::new(ErrorKind::Path, path, detail).with_reason("manifest_path_invalid"))
    };
    if path.starts_with('/') || path.starts_with('\\') {
        return fail("absolute path forbidden in SHA256SUMS");
    }
    if path.split('/').any(|seg| seg == "..") {
        return fail("parent traversal forbidden in SHA256SUMS");
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return fail("OS drive expression forbidden in SHA256SUMS");
    }
    if !path.starts_with("review/") {
        return fail("path must be within review/ directory");
    }
    Ok(())
}

/// Validate a symlink target: relative and free of `..`.
///
/// # Errors
///
/// Returns a [`ErrorKind::Path`] failure scoped to the link's member name.
pub fn validate_symlink_target(name: &str, target: &str) -> BundleResult<()> {
    if target.starts_with('/') || target.contains("..") {
        return Err(BundleError::new(
            ErrorKind::Path,
            name,
            format!("unsafe symlink target: {target}"),
        ));
    }
    Ok(())
}

/// Replace every byte outside `[A-Za-z0-9._-]` with `_`.
#[must_use]
pub fn sanitize_component(s: &str) -> String {
    let out: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        "repo".to_string()
    } else {
        out
    }
}

/// `YYYYMMDD_HHMMSS` in UTC for a UNIX timestamp.
///
/// # Errors
///
/// Returns a [`ErrorKind::Contract`] failure if the timestamp is out of range.
pub fn utc_stamp(epoch_sec: i64) -> BundleResult<String> {
    let ts = chrono::DateTime::from_timestamp(epoch_sec, 0).ok_or_else(|| {
        BundleError::new(
            ErrorKind::Contract,
            "epoch_sec",
            format!("timestamp out of range: {epoch_sec}"),
        )
    })?;
    Ok(ts.format("%Y%m%d_%H%M%S").to_string())
}

/// Archive filename: `<repo>_review_<mode>_<YYYYMMDD_HHMMSS>_<head12>.tar.gz`.
///
/// # Errors
///
/// Returns a [`ErrorKind::Contract`] failure if `head_sha` is shorter than
/// 12 characters or the epoch is out of range.
pub fn archive_filename(
    repo: &str,
    mode: Mode,
    epoch_sec: i64,
    head_sha: &str,
) -> BundleResult<String> {
    let head12 = head_sha.get(..12).ok_or_else(|| {
        BundleError::new(ErrorKind::Contract, "head_sha", "head_sha shorter than 12 chars")
    })?;
    Ok(format!(
        "{}_review_{}_{}_{head12}.tar.gz",
        sanitize_component(repo),
        mode.as_str(),
        utc_stamp(epoch_sec)?
    ))
}
