//! Shared fixtures for the review bundle benchmark suites.

use std::collections::BTreeMap;

use reviewbundle_archive::{seal_bundle, SealedBundle};
use reviewbundle_kernel::contract::{Contract, Mode};
use reviewbundle_kernel::layout::{
    prverify_member_path, PATH_CONTRACT, PATH_INDEX, PATH_SERIES_PATCH,
};

/// Epoch used by every benchmark bundle.
pub const BENCH_EPOCH: i64 = 1_700_000_000;

/// HEAD used by every benchmark bundle.
pub const BENCH_HEAD: &str = "0123456789abcdef0123456789abcdef01234567";

/// Patch-like text of roughly `kib` KiB.
#[must_use]
pub fn patch_text(kib: usize) -> Vec<u8> {
    let line = b"+    let value = compute(input).map_err(Error::from)?;\n";
    let mut out = Vec::with_capacity(kib * 1024 + line.len());
    out.extend_from_slice(format!("From {BENCH_HEAD} Mon Sep 17 00:00:00 2001\n").as_bytes());
    while out.len() < kib * 1024 {
        out.extend_from_slice(line);
    }
    out
}

/// Member map for a strict bundle with a `patch_kib` patch and
/// `evidence_files` bound evidence reports.
///
/// # Panics
///
/// Panics if the contract cannot be encoded. Benchmark setup failures are fatal.
#[must_use]
pub fn strict_members(patch_kib: usize, evidence_files: usize) -> BTreeMap<String, Vec<u8>> {
    let mut contract = Contract::new(Mode::Strict, "bench", BENCH_EPOCH, "main", BENCH_HEAD);
    contract.evidence.present = evidence_files > 0;
    contract.evidence.bound_to_head = evidence_files > 0;

    let mut m = BTreeMap::new();
    m.insert(PATH_INDEX.to_string(), b"# Review Bundle\n".to_vec());
    m.insert(PATH_CONTRACT.to_string(), contract.encode().unwrap());
    m.insert(PATH_SERIES_PATCH.to_string(), patch_text(patch_kib));
    for i in 0..evidence_files {
        m.insert(
            prverify_member_path(&format!("prverify_{i:04}.md")),
            format!("# PR verify\n\nhead_sha: {BENCH_HEAD}\nrun: {i}\n").into_bytes(),
        );
    }
    m
}

/// Sealed strict bundle; see [`strict_members`].
///
/// # Panics
///
/// Panics if sealing fails.
#[must_use]
pub fn strict_bundle(patch_kib: usize, evidence_files: usize) -> SealedBundle {
    seal_bundle(strict_members(patch_kib, evidence_files)).unwrap()
}
