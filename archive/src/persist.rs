//! Bundle persistence: temp file, self-verify, atomic rename.
//!
//! ```text
//! <final>.tmp   written, closed (tar → gzip → file), synced, verified
//! <final>       renamed into place only after verification passes
//! ```
//!
//! On any failure the temp file is removed and `<final>` is never created.
//! The rename is atomic when both paths share a volume, which holds because
//! the temp path is a sibling of the final path.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};

use crate::bundle::SealedBundle;
use crate::verify::{verify_path, VerifyOptions, VerifyReport};
use crate::writer::write_archive;

/// Reason tag attached when the freshly written archive fails verification.
pub const REASON_GENERATED_INVALID: &str = "create_generated_invalid_bundle";

/// Write `bundle` to `final_path` via a verified temp file.
///
/// Returns the verifier's report for the written archive.
///
/// # Errors
///
/// - [`ErrorKind::Path`] on filesystem failures
/// - any writer failure from [`write_archive`]
/// - any verifier failure, tagged [`REASON_GENERATED_INVALID`]
pub fn persist_bundle(
    bundle: &SealedBundle,
    epoch_sec: i64,
    final_path: &Path,
    opts: VerifyOptions,
) -> BundleResult<VerifyReport> {
    if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
    }

    let guard = TempFile::new(temp_path(final_path));
    let file = File::create(guard.path()).map_err(|e| io_error(guard.path(), &e))?;
    let writer = write_archive(bundle, epoch_sec, BufWriter::new(file))?;
    let file = writer
        .into_inner()
        .map_err(|e| io_error(guard.path(), e.error()))?;
    file.sync_all().map_err(|e| io_error(guard.path(), &e))?;
    drop(file);
    tracing::debug!(path = %guard.path().display(), "temp archive written");

    let report = verify_path(guard.path(), opts)
        .map_err(|e| e.with_reason(REASON_GENERATED_INVALID))?;

    fs::rename(guard.path(), final_path).map_err(|e| io_error(final_path, &e))?;
    guard.disarm();
    tracing::info!(path = %final_path.display(), "bundle written");
    Ok(report)
}

/// `<final>.tmp` next to the final path.
#[must_use]
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut name: OsString = final_path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn io_error(path: &Path, e: &std::io::Error) -> BundleError {
    BundleError::wrap(ErrorKind::Path, path.display().to_string(), e)
}

/// Removes its file on drop unless disarmed.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            // Best effort: the file may never have been created.
            let _ = fs::remove_file(&self.path);
        }
    }
}
