//! Epoch resolution.
//!
//! One UNIX-seconds value drives every time field of a bundle: tar mtimes,
//! the gzip header, and the archive filename stamp. It comes from
//! `SOURCE_DATE_EPOCH` when that holds a positive integer, else from the
//! committer time of `HEAD`.

use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};

use crate::oracle::GitOracle;

/// Environment variable consulted by [`epoch_override_from_env`].
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// Where the resolved epoch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochSource {
    SourceDateEpoch,
    CommitTime,
}

impl EpochSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceDateEpoch => "source_date_epoch",
            Self::CommitTime => "commit_time",
        }
    }
}

/// Read `SOURCE_DATE_EPOCH` from the process environment.
///
/// This is the only environment read the library performs; callers pass
/// the result into [`crate::CreateOptions::epoch_override`].
#[must_use]
pub fn epoch_override_from_env() -> Option<String> {
    std::env::var(SOURCE_DATE_EPOCH).ok()
}

/// Parse an override value. Returns `None` for anything but a positive integer.
#[must_use]
pub fn parse_epoch_override(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|v| *v > 0)
}

/// Resolve the bundle epoch.
///
/// An unusable override is logged and ignored.
///
/// # Errors
///
/// Propagates git failures, and returns a [`ErrorKind::Contract`] failure
/// if the commit time is not positive.
pub fn resolve_epoch(
    override_raw: Option<&str>,
    git: &dyn GitOracle,
) -> BundleResult<(i64, EpochSource)> {
    if let Some(raw) = override_raw.filter(|r| !r.trim().is_empty()) {
        if let Some(epoch) = parse_epoch_override(raw) {
            tracing::debug!(epoch, source = "source_date_epoch", "epoch resolved");
            return Ok((epoch, EpochSource::SourceDateEpoch));
        }
        tracing::warn!(value = raw, "ignoring invalid {SOURCE_DATE_EPOCH}");
    }
    let epoch = git.commit_time()?;
    if epoch <= 0 {
        return Err(BundleError::new(
            ErrorKind::Contract,
            "epoch_sec",
            format!("non-positive commit time: {epoch}"),
        ));
    }
    tracing::debug!(epoch, source = "commit_time", "epoch resolved");
    Ok((epoch, EpochSource::CommitTime))
}
