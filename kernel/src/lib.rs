//! Review bundle kernel: the pure core shared by the creator and the verifier.
//!
//! # API Surface
//!
//! - [`error`]: the closed failure taxonomy and its stopless rendering
//! - [`layout`]: fixed member paths, path safety, archive naming
//! - [`digest`]: SHA-256 over member bytes
//! - [`manifest`]: `SHA256SUMS` and its seal
//! - [`contract`]: `contract.json` (v1.1)
//!
//! # Module Dependency Direction
//!
//! `error` ← `digest` ← `layout` ← `manifest`, `contract`
//!
//! No I/O, no logging, no process environment. Every function is a pure
//! function of its arguments.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod contract;
pub mod digest;
pub mod error;
pub mod layout;
pub mod manifest;

pub use contract::{Contract, EvidenceSummary, Mode, ToolInfo};
pub use error::{BundleError, BundleResult, ErrorKind};
