//! Review bundle harness: git, evidence, and policy around the archive.
//!
//! The harness drives bundle creation from repository state and exposes the
//! verifier to front-ends. It owns the only side effects of the system: git
//! processes, evidence reads, and the one environment read of
//! `SOURCE_DATE_EPOCH` ([`epoch::epoch_override_from_env`]).
//!
//! The harness does NOT decide archive bytes. Layout, hashing, and header
//! policy live in the kernel and archive crates.
//!
//! # API Surface
//!
//! - [`create_bundle`] with [`CreateOptions`] and a [`GitOracle`]
//! - [`verify_bundle`] returning a [`VerifySummary`]
//! - [`GitCli`], the production oracle
//!
//! # Module Dependency Direction
//!
//! `oracle` → `epoch`, `evidence` → `create`; `verify` depends on the archive
//! crate only.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod create;
pub mod epoch;
pub mod evidence;
pub mod oracle;
pub mod verify;

pub use create::{create_bundle, CreateOptions, CreateOutcome, HeavyMode, RitualEvent};
pub use epoch::{epoch_override_from_env, EpochSource};
pub use evidence::{collect_evidence, EvidenceFile, EvidenceOrigin, EvidenceSet};
pub use oracle::{GitCli, GitOracle};
pub use verify::{verify_bundle, VerifySummary};
