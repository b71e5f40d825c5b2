//! check-pint CLI
//!
//! Compares image files against previously recorded integrity hashes.

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use pint::{CheckConfig, Checker, RunSummary};

/// Compare file/dir(s) against previous integrity checks
#[derive(Parser)]
#[command(name = "check-pint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the file or folder
    path: PathBuf,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Update the manifest with all calculated/changed hashes
    #[arg(short = 'u', long)]
    update: bool,

    /// Process/add new files only; existing checksums are not verified
    #[arg(short = 'n', long = "new-only")]
    new_only: bool,

    /// Process every sub-directory as well
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Number of hashing workers (0 = auto-detect)
    #[arg(short = 't', long, default_value = "4")]
    threads: usize,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let config = CheckConfig::builder()
        .target(cli.path)
        .recursive(cli.recursive)
        .update(cli.update)
        .new_only(cli.new_only)
        .num_threads(cli.threads)
        .build();
    info!("Config: {:?}", config);

    let summary = match Checker::new(config).and_then(|checker| checker.run()) {
        Ok(summary) => summary,
        Err(e) => {
            error!("{}", e);
            eprintln!("check-pint: {}", e.message);
            return ExitCode::from(2);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("check-pint: cannot serialize summary: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_summary(&summary);
    }

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_summary(summary: &RunSummary) {
    let grouped = summary.passes.len() + summary.failures.len() > 1;

    for pass in &summary.passes {
        if grouped && (!pass.files.is_empty() || !pass.errors.is_empty()) {
            println!("{}:", pass.directory.display());
        }
        for file in &pass.files {
            println!("{} {}", file.filename, file.classification);
        }
        for err in &pass.errors {
            let name = err
                .path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            println!("{} ERROR ({})", name, err.message);
        }
    }

    for failure in &summary.failures {
        eprintln!(
            "check-pint: {}: {}",
            failure.directory.display(),
            failure.error.message
        );
    }
}
