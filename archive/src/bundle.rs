//! Sealed member set: the in-memory input of the archive writer.
//!
//! No file I/O in this module. Callers hand over every payload member
//! (`INDEX.md`, `contract.json`, the patch, evidence, warnings); sealing adds
//! `SHA256SUMS` over them and `SHA256SUMS.sha256` over the manifest.
//!
//! Member order is the `BTreeMap` order, which is byte-lexicographic. The
//! manifest and the tar stream both derive from that single order.

use std::collections::BTreeMap;

use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};
use reviewbundle_kernel::layout::{
    is_manifest_excluded, validate_member_path, PATH_SHA256SUMS, PATH_SHA256SUMS_SEAL,
    REQUIRED_MEMBERS,
};
use reviewbundle_kernel::manifest::{build_manifest, build_seal};

/// Every archive member lives under this root.
const MEMBER_ROOT: &str = "review/";

/// A member map with its manifest and seal in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBundle {
    members: BTreeMap<String, Vec<u8>>,
}

impl SealedBundle {
    /// All members, including manifest and seal, in archive order.
    #[must_use]
    pub fn members(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.members
    }

    /// Bytes of one member.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.members.get(path).map(Vec::as_slice)
    }

    /// `SHA256SUMS` bytes.
    #[must_use]
    pub fn manifest(&self) -> &[u8] {
        self.get(PATH_SHA256SUMS).unwrap_or_default()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Seal a payload member map.
///
/// # Errors
///
/// - [`ErrorKind::Path`] if a member path is unsafe or outside `review/`
/// - [`ErrorKind::Layout`] if the caller supplies the manifest or seal
/// - [`ErrorKind::Missing`] if a required payload member is absent
pub fn seal_bundle(mut members: BTreeMap<String, Vec<u8>>) -> BundleResult<SealedBundle> {
    for path in members.keys() {
        validate_member_path(path, false)?;
        if !path.starts_with(MEMBER_ROOT) {
            return Err(BundleError::new(
                ErrorKind::Path,
                path,
                "member must live under review/",
            ));
        }
        if is_manifest_excluded(path) {
            return Err(BundleError::new(
                ErrorKind::Layout,
                path,
                "manifest and seal are produced by sealing",
            ));
        }
    }
    for required in REQUIRED_MEMBERS {
        if !is_manifest_excluded(required) && !members.contains_key(required) {
            return Err(BundleError::new(
                ErrorKind::Missing,
                required,
                "required member absent",
            ));
        }
    }

    let manifest = build_manifest(&members);
    let seal = build_seal(&manifest);
    members.insert(PATH_SHA256SUMS.to_string(), manifest);
    members.insert(PATH_SHA256SUMS_SEAL.to_string(), seal);

    Ok(SealedBundle { members })
}
