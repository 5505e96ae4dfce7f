//! `SHA256SUMS` manifest and its one-line seal.
//!
//! # Wire forms
//!
//! ```text
//! SHA256SUMS          <hex64>  <path>\n      one line per member, ascending by path
//! SHA256SUMS.sha256   <hex64>  review/meta/SHA256SUMS\n
//! ```
//!
//! The manifest lists every file member except itself and its seal. The
//! seal hex is SHA-256 over the manifest bytes verbatim.

use std::collections::BTreeMap;

use crate::digest::{sha256, Sha256Sum};
use crate::error::{BundleError, BundleResult, ErrorKind};
use crate::layout::{
    is_manifest_excluded, validate_manifest_path, PATH_SHA256SUMS, PATH_SHA256SUMS_SEAL,
};

/// Bare filename accepted as the seal target alongside [`PATH_SHA256SUMS`].
const SEAL_BARE_TARGET: &str = "SHA256SUMS";

/// One parsed manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLine {
    pub path: String,
    pub sum: Sha256Sum,
}

/// Build manifest bytes from the member map.
///
/// Iteration order of the `BTreeMap` is the byte-lexicographic path order,
/// which is also the tar entry order.
#[must_use]
pub fn build_manifest(members: &BTreeMap<String, Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::new();
    for (path, content) in members {
        if is_manifest_excluded(path) {
            continue;
        }
        push_line(&mut out, &sha256(content), path);
    }
    out
}

/// Build the seal line over finalized manifest bytes.
#[must_use]
pub fn build_seal(manifest: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    push_line(&mut out, &sha256(manifest), PATH_SHA256SUMS);
    out
}

fn push_line(out: &mut Vec<u8>, sum: &Sha256Sum, path: &str) {
    out.extend_from_slice(sum.to_hex().as_bytes());
    out.extend_from_slice(b"  ");
    out.extend_from_slice(path.as_bytes());
    out.push(b'\n');
}

/// Parse manifest bytes.
///
/// Lines must be LF-terminated, well-formed, strictly ascending by path,
/// and must not list the manifest or the seal.
///
/// # Errors
///
/// [`ErrorKind::Sha256`] for malformed or misordered lines;
/// [`ErrorKind::Path`] for unsafe listed paths.
pub fn parse_manifest(bytes: &[u8]) -> BundleResult<Vec<ManifestLine>> {
    let malformed = |detail: String| {
        BundleError::new(ErrorKind::Sha256, PATH_SHA256SUMS, detail).with_reason("manifest_invalid")
    };
    let text = std::str::from_utf8(bytes).map_err(|e| malformed(format!("not UTF-8: {e}")))?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let body = text
        .strip_suffix('\n')
        .ok_or_else(|| malformed("missing trailing newline".to_string()))?;

    let mut lines: Vec<ManifestLine> = Vec::new();
    for (idx, raw) in body.split('\n').enumerate() {
        let line_no = idx + 1;
        let (hex, path) = raw
            .split_once("  ")
            .ok_or_else(|| malformed(format!("line {line_no}: invalid format")))?;
        let sum = Sha256Sum::parse_hex(hex)
            .ok_or_else(|| malformed(format!("line {line_no}: invalid hex: {hex}")))?;
        validate_manifest_path(path)?;
        if is_manifest_excluded(path) {
            return Err(BundleError::new(
                ErrorKind::Sha256,
                path,
                "manifest must not list itself or its seal file",
            )
            .with_reason("manifest_invalid"));
        }
        if let Some(prev) = lines.last() {
            if path.as_bytes() <= prev.path.as_bytes() {
                return Err(malformed(format!(
                    "line {line_no}: {path} not strictly after {}",
                    prev.path
                )));
            }
        }
        lines.push(ManifestLine {
            path: path.to_string(),
            sum,
        });
    }
    Ok(lines)
}

/// Check the seal file against the raw manifest bytes.
///
/// # Errors
///
/// Returns a [`ErrorKind::Seal`] failure if the seal is malformed, names a
/// different target, or its digest differs from SHA-256 of `manifest`.
pub fn verify_seal(manifest: &[u8], seal: &[u8]) -> BundleResult<()> {
    let broken = |detail: String| {
        BundleError::new(ErrorKind::Seal, PATH_SHA256SUMS_SEAL, detail).with_reason("seal_broken")
    };
    let text = std::str::from_utf8(seal).map_err(|e| broken(format!("not UTF-8: {e}")))?;
    let line = text
        .strip_suffix('\n')
        .filter(|l| !l.contains('\n') && !l.is_empty())
        .ok_or_else(|| broken("must contain exactly one LF-terminated line".to_string()))?;
    let (hex, target) = line
        .split_once("  ")
        .ok_or_else(|| broken("invalid format".to_string()))?;
    if target != PATH_SHA256SUMS && target != SEAL_BARE_TARGET {
        return Err(broken(format!("unexpected filename in seal: {target}")));
    }
    let declared =
        Sha256Sum::parse_hex(hex).ok_or_else(|| broken(format!("invalid hex: {hex}")))?;
    let actual = sha256(manifest);
    if declared != actual {
        return Err(broken(format!(
            "seal mismatch (declared {declared}, manifest {actual})"
        )));
    }
    Ok(())
}

/// Cross-check manifest lines against digests computed while streaming.
///
/// Every listed path must have been seen with the same digest, and every
/// computed path (other than the manifest and seal) must be listed.
///
/// # Errors
///
/// [`ErrorKind::Missing`] for listed-but-absent members,
/// [`ErrorKind::Sha256`] for digest mismatches,
/// [`ErrorKind::Extra`] for unlisted members.
pub fn verify_coverage(
    lines: &[ManifestLine],
    computed: &BTreeMap<String, Sha256Sum>,
) -> BundleResult<()> {
    for line in lines {
        let Some(actual) = computed.get(&line.path) else {
            return Err(BundleError::new(
                ErrorKind::Missing,
                &line.path,
                "missing in bundle but present in manifest",
            )
            .with_reason("missing_file"));
        };
        if *actual != line.sum {
            return Err(BundleError::new(
                ErrorKind::Sha256,
                &line.path,
                format!("checksum mismatch want={} got={actual}", line.sum),
            )
            .with_reason("sha_mismatch"));
        }
    }

    for path in computed.keys() {
        if is_manifest_excluded(path) {
            continue;
        }
        let listed = lines
            .binary_search_by(|l| l.path.as_bytes().cmp(path.as_bytes()))
            .is_ok();
        if !listed {
            return Err(BundleError::new(
                ErrorKind::Extra,
                path,
                "present in bundle but missing in manifest",
            )
            .with_reason("extra_file"));
        }
    }
    Ok(())
}
