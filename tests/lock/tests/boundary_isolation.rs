//! Side effects stay at the boundary.
//!
//! The kernel is pure: no environment, processes, filesystem, or logging.
//! The archive crate touches the filesystem but never the environment or
//! processes. In the harness, only `epoch.rs` reads the environment and only
//! `oracle.rs` spawns processes.

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATTERNS: &[&str] = &["std::env", "env::var"];
const PROCESS_PATTERNS: &[&str] = &["std::process", "Command::new"];
const KERNEL_ONLY_PATTERNS: &[&str] = &["std::fs", "tracing::"];

fn workspace_root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("tests/ exists")
        .parent()
        .expect("workspace root exists")
}

fn rs_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            rs_files(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            out.push(path);
        }
    }
}

/// `(file, line, text)` for every non-comment line containing a pattern.
fn violations(
    crate_src: &str,
    patterns: &[&str],
    allowed_file: Option<&str>,
) -> Vec<(String, usize, String)> {
    let mut files = Vec::new();
    rs_files(&workspace_root().join(crate_src), &mut files);
    files.sort();

    let mut found = Vec::new();
    for path in files {
        if allowed_file.is_some_and(|f| path.file_name().is_some_and(|n| n == f)) {
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        for (line_no, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                continue;
            }
            if patterns.iter().any(|p| trimmed.contains(p)) {
                found.push((path.display().to_string(), line_no + 1, line.to_string()));
            }
        }
    }
    found
}

fn assert_clean(what: &str, found: &[(String, usize, String)]) {
    if found.is_empty() {
        return;
    }
    let mut msg = format!("{what}:\n");
    for (file, line, content) in found {
        let _ = writeln!(msg, "  {file}:{line}: {content}");
    }
    panic!("{msg}");
}

#[test]
fn kernel_is_pure() {
    let patterns: Vec<&str> = ENV_PATTERNS
        .iter()
        .chain(PROCESS_PATTERNS)
        .chain(KERNEL_ONLY_PATTERNS)
        .copied()
        .collect();
    assert_clean(
        "side effects in kernel source",
        &violations("kernel/src", &patterns, None),
    );
}

#[test]
fn archive_reads_no_environment_and_spawns_nothing() {
    let patterns: Vec<&str> = ENV_PATTERNS.iter().chain(PROCESS_PATTERNS).copied().collect();
    assert_clean(
        "environment or process use in archive source",
        &violations("archive/src", &patterns, None),
    );
}

#[test]
fn harness_environment_read_is_confined_to_epoch() {
    assert_clean(
        "environment read outside harness/src/epoch.rs",
        &violations("harness/src", ENV_PATTERNS, Some("epoch.rs")),
    );
}

#[test]
fn harness_processes_are_confined_to_oracle() {
    assert_clean(
        "process spawn outside harness/src/oracle.rs",
        &violations("harness/src", PROCESS_PATTERNS, Some("oracle.rs")),
    );
}
