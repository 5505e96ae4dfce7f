//! Deterministic tar.gz emission.
//!
//! # Header policy
//!
//! Every entry is a regular file with a ustar header: uid/gid 0, empty
//! uname/gname, mode `0644`, mtime = `epoch_sec`, no PAX or GNU extension
//! records. The gzip header carries mtime = `epoch_sec`, OS = 255, and no
//! name, comment, or extra field.
//!
//! Entries are appended in the sealed bundle's order, so two calls with the
//! same bundle and epoch produce identical bytes.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};

use crate::bundle::SealedBundle;

/// Permission bits for every file member.
pub const FILE_MODE: u32 = 0o644;

/// Gzip OS byte for "unknown".
pub const GZIP_OS_UNKNOWN: u8 = 255;

/// Write `bundle` as tar.gz into `out` and return `out` after the gzip
/// trailer is flushed.
///
/// Writers close in order: tar (end-of-archive blocks), then gzip
/// (trailer). Flushing and syncing the returned writer is the caller's job.
///
/// # Errors
///
/// - [`ErrorKind::Gzip`] if `epoch_sec` does not fit the gzip mtime field
///   or the stream cannot be written
/// - [`ErrorKind::Path`] if a member name does not fit a ustar header
pub fn write_archive<W: Write>(bundle: &SealedBundle, epoch_sec: i64, out: W) -> BundleResult<W> {
    let gz_mtime = u32::try_from(epoch_sec).map_err(|_| {
        BundleError::new(
            ErrorKind::Gzip,
            "header",
            format!("epoch_sec {epoch_sec} outside gzip mtime range"),
        )
    })?;
    let tar_mtime = u64::from(gz_mtime);

    let gz: GzEncoder<W> = GzBuilder::new()
        .mtime(gz_mtime)
        .operating_system(GZIP_OS_UNKNOWN)
        .write(out, Compression::default());

    let mut builder = tar::Builder::new(gz);
    for (path, content) in bundle.members() {
        let header = member_header(path, content.len(), tar_mtime)?;
        builder
            .append(&header, content.as_slice())
            .map_err(|e| BundleError::wrap(ErrorKind::Gzip, path, &e))?;
    }

    let gz = builder
        .into_inner()
        .map_err(|e| BundleError::wrap(ErrorKind::Gzip, "tar", &e))?;
    gz.finish()
        .map_err(|e| BundleError::wrap(ErrorKind::Gzip, "stream", &e))
}

/// Write `bundle` into a fresh byte vector.
///
/// # Errors
///
/// Same as [`write_archive`].
pub fn archive_bytes(bundle: &SealedBundle, epoch_sec: i64) -> BundleResult<Vec<u8>> {
    write_archive(bundle, epoch_sec, Vec::new())
}

fn member_header(path: &str, len: usize, mtime: u64) -> BundleResult<tar::Header> {
    let mut header = tar::Header::new_ustar();
    header
        .set_path(path)
        .map_err(|e| BundleError::wrap(ErrorKind::Path, path, &e))?;
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(len as u64);
    header.set_mode(FILE_MODE);
    header.set_uid(0);
    header.set_gid(0);
    header
        .set_username("")
        .map_err(|e| BundleError::wrap(ErrorKind::Identity, path, &e))?;
    header
        .set_groupname("")
        .map_err(|e| BundleError::wrap(ErrorKind::Identity, path, &e))?;
    header.set_mtime(mtime);
    header.set_cksum();
    Ok(header)
}
