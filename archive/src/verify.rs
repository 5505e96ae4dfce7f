//! Streaming bundle verifier.
//!
//! Fail-closed: the first violation is returned and nothing else is
//! reported. Verification is a pure function of the archive bytes and the
//! options.
//!
//! # Per-entry checks (while streaming, in order)
//!
//! 0. Budget: entry count
//! 1. Order: names strictly ascending, bytewise
//! 2. Path safety
//! 3. Type: regular, directory, or symlink
//! 4. Identity: uid/gid 0, empty uname/gname, normalized mode
//! 5. Time: integer seconds, one mtime shared by every entry, no atime/ctime
//! 6. PAX hygiene: no extended records, no extension-supplied names
//!
//! Content is hashed as it streams and counted against the byte budget.
//! Metadata and evidence members are retained (up to 4 MiB) for inspection.
//!
//! # Post-conditions (after EOF, in order)
//!
//! 1. Required members present
//! 2. Seal over the raw manifest bytes
//! 3. Manifest coverage and per-member digests
//! 4. Contract parse and validation
//! 5. Gzip header and tar mtime agree with `epoch_sec`
//! 6. Warnings parity
//! 7. Evidence flags agree with the archive
//! 8. Evidence content scan
//! 9. Strict mode: some evidence is bound to HEAD
//!
//! Integrity (2, 3) is established before any member content is
//! interpreted, so a flipped byte anywhere surfaces as `sha256` or `seal`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::bufread::GzDecoder;
use reviewbundle_kernel::contract::{is_valid_prefix, Contract, Mode};
use reviewbundle_kernel::digest::{sha256, Sha256Sum, StreamingSha256};
use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};
use reviewbundle_kernel::layout::{
    binds_to_head, is_evidence_path, validate_member_path, validate_symlink_target,
    DIR_EVIDENCE, EVIDENCE_BIND_LIMIT, PATH_CONTRACT, PATH_SHA256SUMS, PATH_SHA256SUMS_SEAL,
    PATH_WARNINGS, REQUIRED_MEMBERS,
};
use reviewbundle_kernel::manifest::{parse_manifest, verify_coverage, verify_seal};

use crate::scan::scan_evidence;
use crate::writer::GZIP_OS_UNKNOWN;

/// Default byte budget (100 MiB of member content).
pub const DEFAULT_BUDGET_BYTES: u64 = 100 * 1024 * 1024;

/// Default entry budget.
pub const DEFAULT_BUDGET_FILES: u64 = 10_000;

const READ_CHUNK: usize = 32 * 1024;

/// Verifier configuration. A zero budget disables that budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    pub budget_bytes: u64,
    pub budget_files: u64,
    pub evidence_scan: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            budget_bytes: DEFAULT_BUDGET_BYTES,
            budget_files: DEFAULT_BUDGET_FILES,
            evidence_scan: true,
        }
    }
}

/// One evidence member as seen by the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceReport {
    pub path: String,
    pub size: u64,
    pub bound: bool,
}

/// Successful verification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// The validated contract.
    pub contract: Contract,
    /// Tar entries streamed.
    pub entries: u64,
    /// Member content bytes streamed.
    pub content_bytes: u64,
    /// Regular evidence members, in archive order.
    pub evidence: Vec<EvidenceReport>,
    /// Whether any evidence member is bound to `contract.head_sha`.
    pub bound_to_head: bool,
}

/// Verify the archive at `path`.
///
/// # Errors
///
/// [`ErrorKind::Path`] if the file cannot be opened; otherwise the first
/// violation found by [`verify_reader`].
pub fn verify_path(path: &Path, opts: VerifyOptions) -> BundleResult<VerifyReport> {
    let file = File::open(path)
        .map_err(|e| BundleError::wrap(ErrorKind::Path, path.display().to_string(), &e))?;
    verify_reader(BufReader::new(file), opts)
}

/// Verify an archive byte stream.
///
/// # Errors
///
/// Returns the first violated rule as a [`BundleError`].
pub fn verify_reader<R: Read>(reader: R, opts: VerifyOptions) -> BundleResult<VerifyReport> {
    let (stream, gzip) = stream_entries(reader, opts)?;
    let report = check_post_conditions(stream, &gzip, opts)?;
    tracing::debug!(
        entries = report.entries,
        bytes = report.content_bytes,
        mode = %report.contract.mode,
        "bundle verified"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Streaming pass
// ---------------------------------------------------------------------------

struct Retained {
    content: Vec<u8>,
    size: u64,
}

#[derive(Default)]
struct StreamState {
    prev_name: Option<String>,
    common_mtime: Option<u64>,
    entries: u64,
    content_bytes: u64,
    computed: BTreeMap<String, Sha256Sum>,
    retained: BTreeMap<String, Retained>,
    evidence_present: bool,
}

struct GzipFacts {
    mtime: u32,
    os: u8,
    has_name: bool,
    has_comment: bool,
    has_extra: bool,
}

fn stream_error(context: &str, e: &io::Error) -> BundleError {
    BundleError::wrap(ErrorKind::Gzip, context, e)
}

fn stream_entries<R: Read>(
    reader: R,
    opts: VerifyOptions,
) -> BundleResult<(StreamState, GzipFacts)> {
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(reader)));
    let mut state = StreamState::default();

    let entries = archive
        .entries()
        .map_err(|e| stream_error("stream", &e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| stream_error("tar stream corrupted", &e))?;
        state.check_entry(&mut entry, opts)?;
    }

    // Drain past the tar end blocks so the gzip trailer (CRC, size) is checked.
    let mut gz = archive.into_inner();
    io::copy(&mut gz, &mut io::sink()).map_err(|e| stream_error("stream", &e))?;
    let header = gz
        .header()
        .ok_or_else(|| BundleError::new(ErrorKind::Gzip, "header", "missing gzip header"))?;
    let facts = GzipFacts {
        mtime: header.mtime(),
        os: header.operating_system(),
        has_name: header.filename().is_some_and(|n| !n.is_empty()),
        has_comment: header.comment().is_some_and(|c| !c.is_empty()),
        has_extra: header.extra().is_some_and(|x| !x.is_empty()),
    };

    // Exactly one gzip member; nothing may follow its trailer.
    let mut rest = gz.into_inner();
    let trailing = rest.fill_buf().map_err(|e| stream_error("stream", &e))?;
    if !trailing.is_empty() {
        return Err(BundleError::new(
            ErrorKind::Gzip,
            "stream",
            "trailing data after gzip member",
        ));
    }
    Ok((state, facts))
}

impl StreamState {
    fn check_entry<R: Read>(
        &mut self,
        entry: &mut tar::Entry<'_, R>,
        opts: VerifyOptions,
    ) -> BundleResult<()> {
        let pax = collect_pax(entry)?;
        let name = String::from_utf8(entry.path_bytes().into_owned()).map_err(|_| {
            BundleError::new(ErrorKind::Path, "", "entry name is not valid UTF-8")
        })?;
        let entry_type = entry.header().entry_type();

        self.entries += 1;
        if opts.budget_files > 0 && self.entries > opts.budget_files {
            return Err(BundleError::new(ErrorKind::Budget, &name, "file count exceeds budget")
                .with_reason("budget_exceeded"));
        }

        self.check_order(&name)?;
        validate_member_path(&name, entry_type.is_dir())?;
        check_type(&name, entry_type)?;
        check_identity(&name, entry.header(), entry_type)?;
        self.check_time(&name, entry.header(), &pax)?;
        check_pax(&name, entry, &pax)?;

        if entry_type.is_dir() {
            return Ok(());
        }
        if is_evidence_path(&name) {
            self.evidence_present = true;
        }
        if entry_type.is_symlink() {
            let target = entry
                .link_name_bytes()
                .map(|t| String::from_utf8_lossy(&t).into_owned())
                .unwrap_or_default();
            validate_symlink_target(&name, &target)?;
            let mut basis = b"symlink\0".to_vec();
            basis.extend_from_slice(target.as_bytes());
            self.computed.insert(name, sha256(&basis));
            return Ok(());
        }
        self.read_content(name, entry, opts)
    }

    fn check_order(&mut self, name: &str) -> BundleResult<()> {
        if let Some(prev) = &self.prev_name {
            if name.as_bytes() < prev.as_bytes() {
                return Err(BundleError::new(
                    ErrorKind::Order,
                    name,
                    format!("is not sorted (prev: {prev})"),
                ));
            }
            if name == prev {
                return Err(BundleError::new(ErrorKind::Order, name, "duplicate entry"));
            }
        }
        self.prev_name = Some(name.to_string());
        Ok(())
    }

    fn check_time(
        &mut self,
        name: &str,
        header: &tar::Header,
        pax: &[(String, Vec<u8>)],
    ) -> BundleResult<()> {
        let time_err = |detail: String| BundleError::new(ErrorKind::Time, name, detail);

        let mut mtime = header
            .mtime()
            .map_err(|e| time_err(format!("unreadable mtime: {e}")))?;
        if let Some((_, value)) = pax.iter().find(|(k, _)| k == "mtime") {
            mtime = parse_pax_seconds(value)
                .ok_or_else(|| time_err("non-zero nanoseconds forbidden".to_string()))?;
        }
        if let Some(gnu) = header.as_gnu() {
            if gnu.atime().unwrap_or(0) != 0 || gnu.ctime().unwrap_or(0) != 0 {
                return Err(time_err("access/change times forbidden".to_string()));
            }
        }

        match self.common_mtime {
            None => self.common_mtime = Some(mtime),
            Some(expected) if expected != mtime => {
                return Err(time_err(format!(
                    "mtime mismatch (expected {expected}, got {mtime})"
                )));
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn read_content<R: Read>(
        &mut self,
        name: String,
        entry: &mut tar::Entry<'_, R>,
        opts: VerifyOptions,
    ) -> BundleResult<()> {
        let retain = is_retained(&name);
        let mut kept = Vec::new();
        let mut hasher = StreamingSha256::new();
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            let n = match entry.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(stream_error(&name, &e)),
            };
            self.content_bytes += n as u64;
            if opts.budget_bytes > 0 && self.content_bytes > opts.budget_bytes {
                return Err(BundleError::new(ErrorKind::Budget, &name, "byte count exceeds budget")
                    .with_reason("budget_exceeded"));
            }
            hasher.update(&buf[..n]);
            if retain {
                let room = EVIDENCE_BIND_LIMIT.saturating_sub(kept.len());
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }

        let size = hasher.len();
        if retain {
            if !is_evidence_path(&name) && kept.len() as u64 != size {
                return Err(BundleError::new(
                    ErrorKind::Layout,
                    &name,
                    "metadata member exceeds 4 MiB",
                ));
            }
            self.retained.insert(
                name.clone(),
                Retained {
                    content: kept,
                    size,
                },
            );
        }
        self.computed.insert(name, hasher.finish());
        Ok(())
    }
}

fn is_retained(name: &str) -> bool {
    matches!(
        name,
        PATH_CONTRACT | PATH_SHA256SUMS | PATH_SHA256SUMS_SEAL | PATH_WARNINGS
    ) || is_evidence_path(name)
}

fn collect_pax<R: Read>(entry: &mut tar::Entry<'_, R>) -> BundleResult<Vec<(String, Vec<u8>)>> {
    let Some(exts) = entry
        .pax_extensions()
        .map_err(|e| BundleError::wrap(ErrorKind::Pax, "", &e))?
    else {
        return Ok(Vec::new());
    };
    let mut records = Vec::new();
    for ext in exts {
        let ext = ext.map_err(|e| BundleError::wrap(ErrorKind::Pax, "", &e))?;
        records.push((
            String::from_utf8_lossy(ext.key_bytes()).into_owned(),
            ext.value_bytes().to_vec(),
        ));
    }
    Ok(records)
}

/// Integer seconds of a PAX time value; `None` if it carries a non-zero
/// fraction or is not a decimal number.
fn parse_pax_seconds(value: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(value).ok()?;
    let (secs, frac) = text.split_once('.').unwrap_or((text, ""));
    if !frac.bytes().all(|b| b == b'0') {
        return None;
    }
    secs.parse().ok()
}

fn check_type(name: &str, entry_type: tar::EntryType) -> BundleResult<()> {
    if entry_type.is_pax_global_extensions() {
        return Err(BundleError::new(
            ErrorKind::Pax,
            name,
            "PAX global header forbidden",
        ));
    }
    if entry_type.is_file() || entry_type.is_dir() || entry_type.is_symlink() {
        return Ok(());
    }
    Err(BundleError::new(
        ErrorKind::Type,
        name,
        format!("forbidden type flag: {}", char::from(entry_type.as_byte())),
    ))
}

fn check_identity(name: &str, header: &tar::Header, entry_type: tar::EntryType) -> BundleResult<()> {
    let identity_err = |detail: String| BundleError::new(ErrorKind::Identity, name, detail);

    let uid = header
        .uid()
        .map_err(|e| identity_err(format!("unreadable uid: {e}")))?;
    let gid = header
        .gid()
        .map_err(|e| identity_err(format!("unreadable gid: {e}")))?;
    if uid != 0 || gid != 0 {
        return Err(identity_err(format!("non-zero uid/gid: {uid}/{gid}")));
    }
    let uname = header.username_bytes().unwrap_or_default();
    let gname = header.groupname_bytes().unwrap_or_default();
    if !uname.is_empty() || !gname.is_empty() {
        return Err(identity_err(format!(
            "non-empty uname/gname: {:?}/{:?}",
            String::from_utf8_lossy(uname),
            String::from_utf8_lossy(gname)
        )));
    }

    let mode = header
        .mode()
        .map_err(|e| identity_err(format!("unreadable mode: {e}")))?
        & 0o777;
    if entry_type.is_dir() && mode != 0o755 {
        return Err(identity_err(format!("dir mode must be 0755 (got {mode:o})")));
    }
    if entry_type.is_file() && mode != 0o644 && mode != 0o755 {
        return Err(identity_err(format!(
            "regular file mode must be 0644 or 0755 (got {mode:o})"
        )));
    }
    Ok(())
}

fn check_pax<R: Read>(
    name: &str,
    entry: &tar::Entry<'_, R>,
    pax: &[(String, Vec<u8>)],
) -> BundleResult<()> {
    if let Some((key, _)) = pax.first() {
        if let Some((attr, _)) = pax
            .iter()
            .find(|(k, _)| k.starts_with("SCHILY.xattr.") || k.starts_with("LIBARCHIVE."))
        {
            return Err(BundleError::new(
                ErrorKind::Xattr,
                name,
                format!("xattr/provenance leak: {attr}"),
            ));
        }
        return Err(BundleError::new(
            ErrorKind::Pax,
            name,
            format!("extended record forbidden: {key}"),
        ));
    }
    if entry.path_bytes() != entry.header().path_bytes()
        || entry.link_name_bytes() != entry.header().link_name_bytes()
    {
        return Err(BundleError::new(
            ErrorKind::Pax,
            name,
            "extension header overrides entry name",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Post-conditions
// ---------------------------------------------------------------------------

fn retained<'a>(state: &'a StreamState, path: &str) -> BundleResult<&'a [u8]> {
    state
        .retained
        .get(path)
        .map(|r| r.content.as_slice())
        .ok_or_else(|| BundleError::new(ErrorKind::Missing, path, "must be a regular file"))
}

fn check_post_conditions(
    state: StreamState,
    gzip: &GzipFacts,
    opts: VerifyOptions,
) -> BundleResult<VerifyReport> {
    // 1. Layout.
    for required in REQUIRED_MEMBERS {
        if !state.computed.contains_key(required) {
            return Err(BundleError::new(
                ErrorKind::Missing,
                required,
                "required member absent",
            ));
        }
    }

    // 2. Seal. 3. Manifest.
    let manifest = retained(&state, PATH_SHA256SUMS)?;
    verify_seal(manifest, retained(&state, PATH_SHA256SUMS_SEAL)?)?;
    let lines = parse_manifest(manifest)?;
    verify_coverage(&lines, &state.computed)?;

    // 4. Contract.
    let contract = Contract::parse(retained(&state, PATH_CONTRACT)?)?;
    contract.validate()?;

    // 5. Time fields.
    check_gzip_header(gzip, contract.epoch_sec)?;
    let tar_mtime = state.common_mtime.unwrap_or_default();
    if i64::try_from(tar_mtime).ok() != Some(contract.epoch_sec) {
        return Err(BundleError::new(
            ErrorKind::Time,
            "tar",
            format!(
                "mtime {tar_mtime} differs from epoch_sec {}",
                contract.epoch_sec
            ),
        ));
    }

    // 6. Warnings parity.
    check_warnings(&state, &contract)?;

    // 7. Evidence flags.
    let evidence: Vec<EvidenceReport> = state
        .retained
        .iter()
        .filter(|(path, _)| is_evidence_path(path))
        .map(|(path, r)| EvidenceReport {
            path: path.clone(),
            size: r.size,
            bound: r.size <= EVIDENCE_BIND_LIMIT as u64
                && binds_to_head(&r.content, &contract.head_sha),
        })
        .collect();
    let bound_to_head = evidence.iter().any(|e| e.bound);
    check_evidence_flags(&contract, state.evidence_present, bound_to_head)?;

    // 8. Content scan.
    if opts.evidence_scan {
        for (path, r) in state.retained.iter().filter(|(p, _)| is_evidence_path(p)) {
            scan_evidence(path, &r.content)?;
        }
    }

    // 9. Strict binding.
    if contract.mode == Mode::Strict {
        if !state.evidence_present {
            return Err(BundleError::new(
                ErrorKind::Evidence,
                "strict_mode",
                "evidence files required in strict mode",
            ));
        }
        if !bound_to_head {
            return Err(BundleError::new(
                ErrorKind::Evidence,
                "binding",
                format!("no evidence file contains HEAD SHA {}", contract.head_sha),
            ));
        }
    }

    Ok(VerifyReport {
        contract,
        entries: state.entries,
        content_bytes: state.content_bytes,
        evidence,
        bound_to_head,
    })
}

fn check_gzip_header(gzip: &GzipFacts, epoch_sec: i64) -> BundleResult<()> {
    let gzip_err = |detail: String| BundleError::new(ErrorKind::Gzip, "header", detail);
    if i64::from(gzip.mtime) != epoch_sec {
        return Err(gzip_err(format!(
            "mtime mismatch (header: {}, contract: {epoch_sec})",
            gzip.mtime
        )));
    }
    if gzip.os != GZIP_OS_UNKNOWN {
        return Err(gzip_err(format!("OS byte must be 255 (got {})", gzip.os)));
    }
    if gzip.has_name {
        return Err(gzip_err("Name must be empty".to_string()));
    }
    if gzip.has_comment {
        return Err(gzip_err("Comment must be empty".to_string()));
    }
    if gzip.has_extra {
        return Err(gzip_err("Extra data must be empty".to_string()));
    }
    Ok(())
}

fn check_warnings(state: &StreamState, contract: &Contract) -> BundleResult<()> {
    let present = state.computed.contains_key(PATH_WARNINGS);
    let expected = contract.warnings_count;
    if present != (expected > 0) {
        return Err(BundleError::new(
            ErrorKind::Layout,
            PATH_WARNINGS,
            format!("presence does not match warnings_count={expected}"),
        ));
    }
    if present {
        let text = retained(state, PATH_WARNINGS)?;
        let lines = text.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count() as u64;
        if lines != expected {
            return Err(BundleError::new(
                ErrorKind::Layout,
                PATH_WARNINGS,
                format!("{lines} lines but warnings_count={expected}"),
            ));
        }
    }
    Ok(())
}

fn check_evidence_flags(contract: &Contract, present: bool, bound: bool) -> BundleResult<()> {
    let ev = &contract.evidence;
    if ev.required && !present {
        return Err(
            BundleError::new(ErrorKind::Evidence, DIR_EVIDENCE, "required but missing")
                .with_reason("contract_evidence_mismatch"),
        );
    }
    if contract.mode == Mode::Strict && !ev.required {
        return Err(BundleError::new(
            ErrorKind::Contract,
            PATH_CONTRACT,
            "strict mode requires evidence.required=true",
        )
        .with_reason("contract_invalid"));
    }
    if ev.present != present {
        return Err(BundleError::new(
            ErrorKind::Contract,
            PATH_CONTRACT,
            format!("evidence.present={} but archive says {present}", ev.present),
        )
        .with_reason("contract_evidence_mismatch"));
    }
    if !ev.path_prefix.is_empty() && !is_valid_prefix(&ev.path_prefix) {
        return Err(BundleError::new(
            ErrorKind::Contract,
            PATH_CONTRACT,
            format!("invalid evidence.path_prefix: {}", ev.path_prefix),
        )
        .with_reason("contract_invalid"));
    }
    if ev.bound_to_head != bound {
        return Err(BundleError::new(
            ErrorKind::Evidence,
            PATH_CONTRACT,
            format!(
                "evidence.bound_to_head={} but archive says {bound}",
                ev.bound_to_head
            ),
        )
        .with_reason("contract_evidence_mismatch"));
    }
    Ok(())
}
