//! The closed failure taxonomy shared by the creator and the verifier.
//!
//! Every failure is a single value `{kind, path, detail}` plus an optional
//! machine-readable reason tag. There is no error hierarchy: callers match
//! on [`ErrorKind`] and render with [`BundleError::line`].

use std::fmt;

/// One of the sixteen failure kinds a bundle operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Tar entries are not in ascending byte order.
    Order,
    /// Non-zero uid/gid, non-empty uname/gname, or unexpected file mode.
    Identity,
    /// PAX extended records present.
    Pax,
    /// Extended attributes or archiver provenance records present.
    Xattr,
    /// Sub-second or inconsistent modification times.
    Time,
    /// Gzip framing or header violation.
    Gzip,
    /// Unsafe or non-normalized member path.
    Path,
    /// Entry type other than regular file, directory, or symlink.
    Type,
    /// Member layout violation (e.g. warnings parity).
    Layout,
    /// Manifest digest mismatch or malformed manifest.
    Sha256,
    /// Seal does not match the manifest.
    Seal,
    /// A required or declared member is absent.
    Missing,
    /// A member is present but undeclared.
    Extra,
    /// Verification budget exhausted.
    Budget,
    /// Evidence missing, unbound, or forbidden.
    Evidence,
    /// Contract invalid, or an external oracle failed.
    Contract,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Order,
        Self::Identity,
        Self::Pax,
        Self::Xattr,
        Self::Time,
        Self::Gzip,
        Self::Path,
        Self::Type,
        Self::Layout,
        Self::Sha256,
        Self::Seal,
        Self::Missing,
        Self::Extra,
        Self::Budget,
        Self::Evidence,
        Self::Contract,
    ];

    /// Lowercase kind name (`"order"`, `"sha256"`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Identity => "identity",
            Self::Pax => "pax",
            Self::Xattr => "xattr",
            Self::Time => "time",
            Self::Gzip => "gzip",
            Self::Path => "path",
            Self::Type => "type",
            Self::Layout => "layout",
            Self::Sha256 => "sha256",
            Self::Seal => "seal",
            Self::Missing => "missing",
            Self::Extra => "extra",
            Self::Budget => "budget",
            Self::Evidence => "evidence",
            Self::Contract => "contract",
        }
    }

    /// Stable uppercase code (`"E_ORDER"`, `"E_SHA256"`, ...).
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Order => "E_ORDER",
            Self::Identity => "E_IDENTITY",
            Self::Pax => "E_PAX",
            Self::Xattr => "E_XATTR",
            Self::Time => "E_TIME",
            Self::Gzip => "E_GZIP",
            Self::Path => "E_PATH",
            Self::Type => "E_TYPE",
            Self::Layout => "E_LAYOUT",
            Self::Sha256 => "E_SHA256",
            Self::Seal => "E_SEAL",
            Self::Missing => "E_MISSING",
            Self::Extra => "E_EXTRA",
            Self::Budget => "E_BUDGET",
            Self::Evidence => "E_EVIDENCE",
            Self::Contract => "E_CONTRACT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single bundle failure: kind, member path (may be empty), one-line detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} {}", display_tail(.path, .detail))]
pub struct BundleError {
    /// Failure kind.
    pub kind: ErrorKind,
    /// Member path or operation the failure is scoped to.
    pub path: String,
    /// Human-readable detail.
    pub detail: String,
    /// Optional machine tag used in place of the kind code when rendering.
    pub reason: Option<String>,
}

impl BundleError {
    /// Construct a failure without a reason tag.
    pub fn new(kind: ErrorKind, path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            detail: detail.into(),
            reason: None,
        }
    }

    /// Construct a failure from any displayable source error.
    pub fn wrap(kind: ErrorKind, path: impl Into<String>, source: &impl fmt::Display) -> Self {
        Self::new(kind, path, source.to_string())
    }

    /// Attach a machine-readable reason tag.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Render the stopless single-line form:
    /// `ERROR: <reason> path=<path> detail=<detail> stop=1`.
    ///
    /// Empty path or detail segments are omitted; embedded newlines are
    /// flattened so the result is always exactly one line.
    #[must_use]
    pub fn line(&self) -> String {
        let reason = self.reason.as_deref().unwrap_or_else(|| self.kind.code());
        let mut line = format!("ERROR: {}", one_line(reason));
        if !self.path.is_empty() {
            line.push_str(" path=");
            line.push_str(&one_line(&self.path));
        }
        if !self.detail.is_empty() {
            line.push_str(" detail=");
            line.push_str(&one_line(&self.detail));
        }
        line.push_str(" stop=1");
        line
    }
}

fn display_tail(path: &str, detail: &str) -> String {
    if path.is_empty() {
        detail.to_string()
    } else {
        format!("{path} {detail}")
    }
}

fn one_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Shorthand result alias for bundle operations.
pub type BundleResult<T> = Result<T, BundleError>;
