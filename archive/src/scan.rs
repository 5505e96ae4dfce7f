//! Evidence content scan: host-local paths must not leak into a bundle.
//!
//! Text evidence is rejected if it contains a `file:` URL scheme, or, at a
//! token boundary, a `../` traversal, a Windows drive path, or a host
//! absolute prefix such as `/home/`. Content with a NUL byte in its first
//! 512 bytes is treated as binary and skipped.

use reviewbundle_kernel::error::{BundleError, BundleResult, ErrorKind};

const BINARY_SNIFF_LEN: usize = 512;

const FORBIDDEN_ABS_PREFIXES: [&str; 7] = [
    "/Users/",
    "/home/",
    "/etc/",
    "/var/",
    "/private/",
    "/Volumes/",
    "/mnt/",
];

const FILE_SCHEMES: [&[u8]; 3] = [b"file://", b"file:/", b"file:\\"];

/// Scan one evidence member.
///
/// # Errors
///
/// Returns an [`ErrorKind::Evidence`] failure tagged `evidence_forbidden`
/// on the first forbidden pattern.
pub fn scan_evidence(name: &str, content: &[u8]) -> BundleResult<()> {
    let sniff = &content[..content.len().min(BINARY_SNIFF_LEN)];
    if sniff.contains(&0) {
        return Ok(());
    }

    let forbidden = |detail: String| {
        Err(BundleError::new(ErrorKind::Evidence, name, detail).with_reason("evidence_forbidden"))
    };

    let lower = content.to_ascii_lowercase();
    if FILE_SCHEMES
        .iter()
        .any(|scheme| lower.windows(scheme.len()).any(|w| w == *scheme))
    {
        return forbidden("forbidden file scheme detected".to_string());
    }

    let mut prev: Option<u8> = None;
    for (i, &b) in content.iter().enumerate() {
        let at_boundary = match prev {
            None => true,
            Some(p) => is_boundary(p),
        };
        prev = Some(b);
        if !at_boundary {
            continue;
        }
        let rest = &content[i..];
        if rest.starts_with(b"../") {
            return forbidden("forbidden parent traversal detected".to_string());
        }
        if is_drive_path(rest) {
            return forbidden("forbidden Windows drive path detected".to_string());
        }
        if let Some(prefix) = FORBIDDEN_ABS_PREFIXES
            .iter()
            .find(|p| rest.starts_with(p.as_bytes()))
        {
            return forbidden(format!("forbidden absolute path detected: {prefix}"));
        }
    }
    Ok(())
}

fn is_boundary(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'"' | b'\'' | b'`')
}

/// `X:\` or `X:/` with an ASCII drive letter.
fn is_drive_path(s: &[u8]) -> bool {
    s.len() >= 3 && s[0].is_ascii_alphabetic() && s[1] == b':' && matches!(s[2], b'\\' | b'/')
}
