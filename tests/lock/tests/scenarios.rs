//! Literal create/verify scenarios against a fixed git oracle.
//!
//! HEAD is forty `a`s and the epoch is 1600000000 (2020-09-13 12:26:40 UTC)
//! throughout, so archive names and bytes are fully pinned.

use std::fs;
use std::path::{Path, PathBuf};

use lock_tests::archive_test_helpers::{entry_names, flip_byte, replace_content, swap_entries};
use lock_tests::oracle_test_helpers::{scenario_head, FixedGit, SCENARIO_EPOCH};
use reviewbundle_archive::{verify_reader, VerifyOptions};
use reviewbundle_harness::{create_bundle, verify_bundle, CreateOptions, CreateOutcome};
use reviewbundle_kernel::digest::sha256;
use reviewbundle_kernel::error::{BundleResult, ErrorKind};
use reviewbundle_kernel::layout::{PATH_SERIES_PATCH, PATH_SHA256SUMS_SEAL};
use reviewbundle_kernel::Mode;

struct Repo {
    _dir: tempfile::TempDir,
    root: PathBuf,
    out: PathBuf,
}

fn repo() -> Repo {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("veil-rs");
    fs::create_dir_all(&root).unwrap();
    let out = dir.path().join("bundles");
    Repo {
        _dir: dir,
        root,
        out,
    }
}

fn create(repo: &Repo, mode: Mode, evidence: Option<PathBuf>) -> BundleResult<CreateOutcome> {
    let git = FixedGit::clean(repo.root.clone());
    let opts = CreateOptions {
        mode,
        out_dir: repo.out.clone(),
        evidence_report: evidence,
        ..CreateOptions::default()
    };
    create_bundle(&opts, &git, &mut |_| {})
}

fn s1_bytes() -> Vec<u8> {
    let r = repo();
    let outcome = create(&r, Mode::Wip, None).unwrap();
    fs::read(outcome.path).unwrap()
}

fn verify_bytes(bytes: &[u8]) -> BundleResult<reviewbundle_archive::VerifyReport> {
    verify_reader(bytes, VerifyOptions::default())
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// S1: minimal WIP round-trip
// ---------------------------------------------------------------------------

#[test]
fn s1_minimal_wip_round_trip() {
    let r = repo();
    let outcome = create(&r, Mode::Wip, None).unwrap();

    assert_eq!(
        outcome.path.file_name().unwrap().to_str().unwrap(),
        "veil-rs_review_wip_20200913_122640_aaaaaaaaaaaa.tar.gz"
    );
    assert_eq!(outcome.contract.epoch_sec, SCENARIO_EPOCH);

    let summary = verify_bundle(&outcome.path, VerifyOptions::default()).unwrap();
    assert!(summary.pass_line().starts_with("PASS: "));
    assert!(summary.pass_line().ends_with("(mode=wip, epoch=1600000000)"));

    let names = entry_names(&fs::read(&outcome.path).unwrap());
    assert_eq!(
        names,
        [
            "review/INDEX.md",
            "review/meta/SHA256SUMS",
            "review/meta/SHA256SUMS.sha256",
            "review/meta/contract.json",
            "review/patch/series.patch",
        ]
    );
}

// ---------------------------------------------------------------------------
// S2: strict requires bound evidence
// ---------------------------------------------------------------------------

#[test]
fn s2_strict_without_evidence_fails_and_leaves_no_archive() {
    let r = repo();
    let err = create(&r, Mode::Strict, None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Evidence);
    assert_eq!(files_in(&r.out), 0);
}

// ---------------------------------------------------------------------------
// S3: strict accepts explicit evidence
// ---------------------------------------------------------------------------

#[test]
fn s3_strict_accepts_explicit_evidence() {
    let r = repo();
    let report = r.root.join("prverify_20200913T122640Z_aaaaaaaaaaaa.md");
    fs::write(
        &report,
        format!("# PR verify\n\n- head: aaaaaaaaaaaa\n- head_sha: {}\n", scenario_head()),
    )
    .unwrap();

    let outcome = create(&r, Mode::Strict, Some(report)).unwrap();
    assert!(outcome.contract.evidence.bound_to_head);
    assert!(outcome.contract.evidence.required);

    let summary = verify_bundle(&outcome.path, VerifyOptions::default()).unwrap();
    assert!(summary.report.contract.evidence.bound_to_head);
    assert!(summary.report.bound_to_head);
    assert_eq!(summary.report.evidence.len(), 1);
    assert!(summary.pass_line().contains("mode=strict"));
}

#[test]
fn s3_strict_rejects_report_naming_only_the_short_head() {
    let r = repo();
    let report = r.root.join("prverify_20200913T122640Z_aaaaaaaaaaaa.md");
    fs::write(&report, "# PR verify\n\n- head: aaaaaaaaaaaa\n").unwrap();

    let err = create(&r, Mode::Strict, Some(report)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Evidence);
    assert!(err.detail.contains("evidence_required mode=strict"));
    assert_eq!(files_in(&r.out), 0);
}

// ---------------------------------------------------------------------------
// S4: determinism
// ---------------------------------------------------------------------------

#[test]
fn s4_independent_creations_have_equal_digests() {
    let a = s1_bytes();
    let b = s1_bytes();
    assert_eq!(sha256(&a), sha256(&b));
}

// ---------------------------------------------------------------------------
// S5-S7: tampering
// ---------------------------------------------------------------------------

#[test]
fn s5_patch_byte_flip_is_sha256() {
    let tampered = flip_byte(&s1_bytes(), PATH_SERIES_PATCH, 0);
    let err = verify_bytes(&tampered).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Sha256);
    assert_eq!(err.path, PATH_SERIES_PATCH);
}

#[test]
fn s6_seal_over_other_bytes_is_seal() {
    let forged = format!("{}  review/meta/SHA256SUMS\n", sha256(b"something else"));
    let tampered = replace_content(&s1_bytes(), PATH_SHA256SUMS_SEAL, forged.as_bytes());
    let err = verify_bytes(&tampered).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Seal);
}

#[test]
fn s7_swapped_entries_are_order() {
    let tampered = swap_entries(&s1_bytes(), 0, 1);
    let err = verify_bytes(&tampered).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Order);
    assert_eq!(err.path, "review/INDEX.md");
}

#[test]
fn untouched_repack_still_verifies() {
    let bytes = s1_bytes();
    let repacked = lock_tests::archive_test_helpers::rewrite(&bytes, |_| {});
    assert!(verify_bytes(&repacked).is_ok());
}
