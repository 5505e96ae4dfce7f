//! Shared helpers for the cross-crate lock tests.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod archive_test_helpers;
pub mod git_test_helpers;
pub mod oracle_test_helpers;
