//! Builds a bundle from fixed inputs, persists it through the self-verifying
//! writer, and prints deterministic `key=value` lines for cross-process
//! comparison.
//!
//! Output:
//!   `filename`=veil-rs_review_strict_20231114_221320_0123456789ab.tar.gz
//!   `archive_sha256`=...
//!   `manifest_sha256`=...
//!   `entries`=6
//!   `bound_to_head`=true
//!   `verdict`=PASS

use std::collections::BTreeMap;

use reviewbundle_archive::{persist_bundle, seal_bundle, VerifyOptions};
use reviewbundle_kernel::contract::{Contract, Mode};
use reviewbundle_kernel::digest::sha256;
use reviewbundle_kernel::layout::{
    archive_filename, prverify_member_path, PATH_CONTRACT, PATH_INDEX, PATH_SERIES_PATCH,
};

const EPOCH: i64 = 1_700_000_000;
const HEAD: &str = "0123456789abcdef0123456789abcdef01234567";

fn main() {
    let mut contract = Contract::new(Mode::Strict, "veil-rs", EPOCH, "main", HEAD);
    contract.evidence.present = true;
    contract.evidence.bound_to_head = true;

    let mut members = BTreeMap::new();
    members.insert(PATH_INDEX.to_string(), b"# Review Bundle\n\n- Mode: strict\n".to_vec());
    members.insert(
        PATH_CONTRACT.to_string(),
        contract.encode().expect("contract encodes"),
    );
    members.insert(
        PATH_SERIES_PATCH.to_string(),
        format!("From {HEAD} Mon Sep 17 00:00:00 2001\nSubject: [PATCH] fixture\n").into_bytes(),
    );
    members.insert(
        prverify_member_path("prverify_20231114T221320Z.md"),
        format!("# PR verify\n\nhead_sha: {HEAD}\nresult: pass\n").into_bytes(),
    );
    let bundle = seal_bundle(members).expect("bundle seals");

    let filename = archive_filename(&contract.repo, contract.mode, EPOCH, HEAD)
        .expect("filename renders");
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(&filename);
    let report = persist_bundle(&bundle, EPOCH, &path, VerifyOptions::default())
        .unwrap_or_else(|e| panic!("{}", e.line()));
    let bytes = std::fs::read(&path).expect("archive readable");

    println!("filename={filename}");
    println!("archive_sha256={}", sha256(&bytes));
    println!("manifest_sha256={}", sha256(bundle.manifest()));
    println!("entries={}", report.entries);
    println!("bound_to_head={}", report.bound_to_head);
    println!("verdict=PASS");
}
