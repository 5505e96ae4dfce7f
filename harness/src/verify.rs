//! Bundle verification entry point for front-ends.

use std::path::{Path, PathBuf};

use reviewbundle_archive::{verify_path, VerifyOptions, VerifyReport};
use reviewbundle_kernel::error::BundleResult;

/// A verified bundle and what the verifier learned about it.
#[derive(Debug, Clone)]
pub struct VerifySummary {
    pub path: PathBuf,
    pub report: VerifyReport,
}

impl VerifySummary {
    /// `PASS: <path> (mode=<mode>, epoch=<epoch_sec>)`
    #[must_use]
    pub fn pass_line(&self) -> String {
        format!(
            "PASS: {} (mode={}, epoch={})",
            self.path.display(),
            self.report.contract.mode.as_str(),
            self.report.contract.epoch_sec
        )
    }
}

/// Verify the archive at `path`.
///
/// # Errors
///
/// Returns the first violation found by the streaming verifier.
pub fn verify_bundle(path: &Path, opts: VerifyOptions) -> BundleResult<VerifySummary> {
    let report = verify_path(path, opts)?;
    tracing::info!(
        path = %path.display(),
        entries = report.entries,
        bound_to_head = report.bound_to_head,
        "bundle verified"
    );
    Ok(VerifySummary {
        path: path.to_path_buf(),
        report,
    })
}
