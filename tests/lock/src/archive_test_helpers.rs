//! Re-packaging helpers for tampering tests.
//!
//! Archives are unpacked into header + content pairs and packed again with
//! every header preserved, so a test changes exactly the one thing it means
//! to change and every structural check still passes.

use std::io::Read;

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};

/// One tar entry with its original header.
#[derive(Clone)]
pub struct RawEntry {
    pub header: tar::Header,
    pub content: Vec<u8>,
}

impl RawEntry {
    /// Entry name from the header.
    ///
    /// # Panics
    ///
    /// Panics on a non-UTF-8 name.
    #[must_use]
    pub fn name(&self) -> String {
        String::from_utf8(self.header.path_bytes().into_owned()).unwrap()
    }
}

/// Gzip header mtime of an archive.
///
/// # Panics
///
/// Panics if `bytes` is shorter than a gzip header.
#[must_use]
pub fn gzip_mtime(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]])
}

/// Unpack a tar.gz into raw entries, in archive order.
///
/// # Panics
///
/// Panics if the archive cannot be read.
#[must_use]
pub fn unpack(bytes: &[u8]) -> Vec<RawEntry> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut out = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let header = entry.header().clone();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        out.push(RawEntry { header, content });
    }
    out
}

/// Pack raw entries into a tar.gz with the writer's gzip header policy.
///
/// # Panics
///
/// Panics on I/O failure.
#[must_use]
pub fn repack(entries: &[RawEntry], gz_mtime: u32) -> Vec<u8> {
    let gz = GzBuilder::new()
        .mtime(gz_mtime)
        .operating_system(255)
        .write(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(gz);
    for e in entries {
        builder.append(&e.header, e.content.as_slice()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Apply `edit` to the unpacked entries and repack with the original gzip
/// mtime.
#[must_use]
pub fn rewrite(bytes: &[u8], edit: impl FnOnce(&mut Vec<RawEntry>)) -> Vec<u8> {
    let mut entries = unpack(bytes);
    edit(&mut entries);
    repack(&entries, gzip_mtime(bytes))
}

/// XOR one content byte of `member` at `offset` with `0x01`.
///
/// # Panics
///
/// Panics if `member` is absent or `offset` is out of range.
#[must_use]
pub fn flip_byte(bytes: &[u8], member: &str, offset: usize) -> Vec<u8> {
    rewrite(bytes, |entries| {
        let entry = entries
            .iter_mut()
            .find(|e| e.name() == member)
            .unwrap_or_else(|| panic!("no member {member}"));
        entry.content[offset] ^= 0x01;
    })
}

/// Replace the content of `member`, fixing its size and checksum.
///
/// # Panics
///
/// Panics if `member` is absent.
#[must_use]
pub fn replace_content(bytes: &[u8], member: &str, content: &[u8]) -> Vec<u8> {
    rewrite(bytes, |entries| {
        let entry = entries
            .iter_mut()
            .find(|e| e.name() == member)
            .unwrap_or_else(|| panic!("no member {member}"));
        entry.content = content.to_vec();
        entry.header.set_size(content.len() as u64);
        entry.header.set_cksum();
    })
}

/// Swap the entries at positions `i` and `j`.
#[must_use]
pub fn swap_entries(bytes: &[u8], i: usize, j: usize) -> Vec<u8> {
    rewrite(bytes, |entries| entries.swap(i, j))
}

/// Entry names in archive order.
#[must_use]
pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    unpack(bytes).iter().map(RawEntry::name).collect()
}
