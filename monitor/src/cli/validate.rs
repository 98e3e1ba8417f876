//! validate subcommand
//!
//! Runs the payload validator over a saved response body.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::types::ValidationVerdict;
use crate::validation;

/// Arguments for the validate subcommand
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// JSON payload file
    pub file: PathBuf,
}

/// Verdict for the payload stored in `args.file`.
pub fn verdict_for(args: &ValidateArgs) -> anyhow::Result<ValidationVerdict> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    Ok(validation::validate_bytes(&bytes))
}

/// Execute the validate command. Exit code 1 when the payload is invalid.
pub fn execute(args: &ValidateArgs) -> anyhow::Result<ExitCode> {
    let verdict = verdict_for(args)?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(if verdict.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
