//! Review bundle archive: the on-disk gzip(tar) form of a sealed member set.
//!
//! # API Surface
//!
//! - [`bundle::seal_bundle`]: member map → manifest + seal added
//! - [`writer::write_archive`]: sealed bundle → deterministic tar.gz bytes
//! - [`verify::verify_reader`]: streaming, fail-closed verification
//! - [`persist::persist_bundle`]: temp file, self-verify, atomic rename
//!
//! Writer and verifier share every rule through `reviewbundle-kernel`; the
//! verifier never trusts anything the writer would have produced.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bundle;
pub mod persist;
pub mod scan;
pub mod verify;
pub mod writer;

pub use bundle::{seal_bundle, SealedBundle};
pub use persist::persist_bundle;
pub use verify::{verify_path, verify_reader, EvidenceReport, VerifyOptions, VerifyReport};
pub use writer::{archive_bytes, write_archive};
