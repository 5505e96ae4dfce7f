//! `reviewbundle`: create and verify review bundles.
//!
//! Output is stopless: stdout carries machine-readable lines ending with
//! exactly one `OK: phase=end stop=<0|1>`, and the exit status is always 0.
//! Logs go to stderr, filtered by `RUST_LOG`.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::error::ErrorKind as ClapErrorKind;
use clap::{Args, Parser, Subcommand};
use reviewbundle_archive::verify::{DEFAULT_BUDGET_BYTES, DEFAULT_BUDGET_FILES};
use reviewbundle_archive::VerifyOptions;
use reviewbundle_harness::create::{DEFAULT_BASE_REF, DEFAULT_OUT_DIR};
use reviewbundle_harness::{
    create_bundle, epoch_override_from_env, verify_bundle, CreateOptions, GitCli, HeavyMode,
};
use reviewbundle_kernel::error::BundleResult;
use reviewbundle_kernel::Mode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "reviewbundle=info,reviewbundle_harness=info";

#[derive(Parser, Debug)]
#[command(name = "reviewbundle")]
#[command(about = "Deterministic, self-sealed review bundles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Package the current HEAD into a review bundle
    Create(CreateArgs),

    /// Verify a review bundle
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Bundle mode: wip or strict
    #[arg(long, env = "MODE", default_value = "wip")]
    mode: String,

    /// Output directory
    #[arg(long, env = "OUT_DIR", default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,

    /// Repository directory
    #[arg(long, default_value = ".")]
    repo_dir: PathBuf,

    /// Base ref for the patch series
    #[arg(long, env = "BASE_REF", default_value = DEFAULT_BASE_REF)]
    base_ref: String,

    /// Repository name (default: basename of the git top level)
    #[arg(long)]
    repo_name: Option<String>,

    /// Heavy verification policy: auto, never, or force
    #[arg(long, default_value = "auto")]
    heavy: String,

    /// Commit staged changes before a strict create on a dirty tree
    #[arg(long)]
    autocommit: bool,

    /// Commit message for --autocommit
    #[arg(long)]
    message: Option<String>,

    /// Explicit evidence report (replaces discovery)
    #[arg(long)]
    evidence_report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Bundle to verify
    path: PathBuf,

    #[command(flatten)]
    budget: BudgetArgs,
}

#[derive(Args, Debug)]
struct BudgetArgs {
    /// Maximum content bytes (0 disables)
    #[arg(long, default_value_t = DEFAULT_BUDGET_BYTES)]
    budget_bytes: u64,

    /// Maximum tar entries (0 disables)
    #[arg(long, default_value_t = DEFAULT_BUDGET_FILES)]
    budget_files: u64,

    /// Skip the evidence content scan
    #[arg(long)]
    no_evidence_scan: bool,
}

impl BudgetArgs {
    fn options(&self) -> VerifyOptions {
        VerifyOptions {
            budget_bytes: self.budget_bytes,
            budget_files: self.budget_files,
            evidence_scan: !self.no_evidence_scan,
        }
    }
}

fn main() {
    if let Err(e) = init_logging() {
        eprintln!("logging disabled: {e}");
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = run_args(std::env::args_os(), &mut out) {
        eprintln!("output failed: {e:#}");
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()?;
    Ok(())
}

/// Parse `args`, run the command, and write the stopless stream to `out`.
fn run_args<I, T>(args: I, out: &mut dyn Write) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let stop = match Cli::try_parse_from(args) {
        Ok(cli) => match cli.command {
            Commands::Create(args) => run_create(&args, out)?,
            Commands::Verify(args) => run_verify(&args, out)?,
        },
        Err(e) if matches!(e.kind(), ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion) => {
            write!(out, "{e}")?;
            false
        }
        Err(e) => {
            let detail = e.to_string();
            let first = detail.lines().next().unwrap_or_default();
            writeln!(out, "ERROR: usage_invalid detail={first} stop=1")?;
            true
        }
    };
    writeln!(out, "OK: phase=end stop={}", u8::from(stop))?;
    Ok(())
}

/// Returns whether the run stopped on a failure.
fn run_create(args: &CreateArgs, out: &mut dyn Write) -> Result<bool> {
    let opts = match create_options(args) {
        Ok(opts) => opts,
        Err(e) => {
            writeln!(out, "{}", e.line())?;
            return Ok(true);
        }
    };
    let git = GitCli::new(&args.repo_dir);

    let mut lines = Vec::new();
    let result = create_bundle(&opts, &git, &mut |event| lines.push(event.line()));
    for line in &lines {
        writeln!(out, "{line}")?;
    }
    match result {
        Ok(outcome) => {
            for w in &outcome.warnings {
                writeln!(out, "WARN: {w}")?;
            }
            writeln!(out, "OK: bundle={}", outcome.path.display())?;
            Ok(false)
        }
        Err(e) => {
            if opts.mode == Mode::Strict {
                writeln!(out, "SKIP: strict create")?;
            }
            writeln!(out, "{}", e.line())?;
            Ok(true)
        }
    }
}

fn create_options(args: &CreateArgs) -> BundleResult<CreateOptions> {
    Ok(CreateOptions {
        mode: Mode::parse(&args.mode)?,
        out_dir: args.out_dir.clone(),
        base_ref: args.base_ref.clone(),
        repo_name: args.repo_name.clone(),
        heavy: HeavyMode::parse(&args.heavy)?,
        autocommit: args.autocommit,
        commit_message: args.message.clone(),
        evidence_report: args.evidence_report.clone(),
        epoch_override: epoch_override_from_env(),
        ..CreateOptions::default()
    })
}

fn run_verify(args: &VerifyArgs, out: &mut dyn Write) -> Result<bool> {
    match verify_bundle(&args.path, args.budget.options()) {
        Ok(summary) => {
            writeln!(out, "{}", summary.pass_line())?;
            Ok(false)
        }
        Err(e) => {
            writeln!(out, "{}", e.line())?;
            Ok(true)
        }
    }
}
