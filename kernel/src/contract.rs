//! Bundle contract (v1.1): the typed metadata stored in `review/meta/contract.json`.
//!
//! The contract is built in memory by the orchestrator, has its evidence
//! flags filled exactly once after collection, and is then encoded.
//! [`Contract::encode`] is the only producer of `contract.json` bytes: those
//! bytes participate in the manifest, so every producer must agree on one
//! encoding (UTF-8, two-space pretty JSON, struct field order, no trailing
//! newline).

use serde::{Deserialize, Serialize};

use crate::digest::is_commit_sha;
use crate::error::{BundleError, BundleResult, ErrorKind};
use crate::layout::{DIR_EVIDENCE, PATH_CONTRACT};

/// The only supported contract version.
pub const CONTRACT_VERSION: &str = "1.1";

/// Bundle creation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Clean worktree and evidence bound to HEAD are mandatory.
    Strict,
    /// Work in progress: dirty worktree tolerated, evidence optional.
    Wip,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Wip => "wip",
        }
    }

    /// Parse `"strict"` or `"wip"`.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::Contract`] failure for any other value.
    pub fn parse(s: &str) -> BundleResult<Self> {
        match s {
            "strict" => Ok(Self::Strict),
            "wip" => Ok(Self::Wip),
            other => Err(BundleError::new(
                ErrorKind::Contract,
                "mode",
                format!("invalid mode: {other} (want strict|wip)"),
            )),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence section of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub required: bool,
    pub present: bool,
    pub bound_to_head: bool,
    pub path_prefix: String,
}

/// Identity of the producing tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
}

impl ToolInfo {
    /// Name and version of this workspace's bundle tool.
    #[must_use]
    pub fn current() -> Self {
        Self {
            name: "reviewbundle".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            build: None,
        }
    }
}

/// `contract.json`, field order as serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub contract_version: String,
    pub mode: Mode,
    pub repo: String,
    pub epoch_sec: i64,
    pub base_ref: String,
    pub head_sha: String,
    pub warnings_count: u64,
    pub evidence: EvidenceSummary,
    pub tool: ToolInfo,
}

impl Contract {
    /// A fresh v1.1 contract with evidence flags unset.
    ///
    /// `evidence.required` follows the mode (strict ⇒ required).
    #[must_use]
    pub fn new(
        mode: Mode,
        repo: impl Into<String>,
        epoch_sec: i64,
        base_ref: impl Into<String>,
        head_sha: impl Into<String>,
    ) -> Self {
        Self {
            contract_version: CONTRACT_VERSION.to_string(),
            mode,
            repo: repo.into(),
            epoch_sec,
            base_ref: base_ref.into(),
            head_sha: head_sha.into(),
            warnings_count: 0,
            evidence: EvidenceSummary {
                required: mode == Mode::Strict,
                present: false,
                bound_to_head: false,
                path_prefix: DIR_EVIDENCE.to_string(),
            },
            tool: ToolInfo::current(),
        }
    }

    /// Encode as `contract.json` bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::Contract`] failure if serialization fails.
    pub fn encode(&self) -> BundleResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| BundleError::wrap(ErrorKind::Contract, PATH_CONTRACT, &e))
    }

    /// Parse `contract.json` bytes (no semantic validation).
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::Contract`] failure on malformed JSON or
    /// mistyped fields.
    pub fn parse(bytes: &[u8]) -> BundleResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            BundleError::wrap(ErrorKind::Contract, PATH_CONTRACT, &e).with_reason("contract_invalid")
        })
    }

    /// Check the v1.1 value constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as a [`ErrorKind::Contract`] failure.
    pub fn validate(&self) -> BundleResult<()> {
        let invalid = |detail: String| {
            Err(BundleError::new(ErrorKind::Contract, PATH_CONTRACT, detail)
                .with_reason("contract_invalid"))
        };
        if self.contract_version != CONTRACT_VERSION {
            return Err(BundleError::new(
                ErrorKind::Contract,
                PATH_CONTRACT,
                format!(
                    "unsupported version: {} (want {CONTRACT_VERSION})",
                    self.contract_version
                ),
            )
            .with_reason("contract_version_unsupported"));
        }
        if self.epoch_sec <= 0 {
            return invalid(format!("invalid epoch_sec: {}", self.epoch_sec));
        }
        if !is_commit_sha(&self.head_sha) {
            return invalid("invalid head_sha (want 40 lowercase hex chars)".to_string());
        }
        if self.evidence.required && !is_valid_prefix(&self.evidence.path_prefix) {
            return invalid(format!(
                "invalid evidence.path_prefix: {}",
                self.evidence.path_prefix
            ));
        }
        Ok(())
    }

    /// First 12 characters of `head_sha` (or the whole string if shorter).
    #[must_use]
    pub fn head12(&self) -> &str {
        self.head_sha.get(..12).unwrap_or(&self.head_sha)
    }
}

/// Evidence path prefixes must live under `review/evidence/` and end with `/`.
#[must_use]
pub fn is_valid_prefix(prefix: &str) -> bool {
    prefix.starts_with(DIR_EVIDENCE) && prefix.ends_with('/')
}
