//! Hash validation command

use crate::OutputFormat;
use crate::ui::Output;
use anyhow::Result;
use crossterm::style::Stylize;
use std::path::Path;
use wgm_core::verify::{FileStatus, ValidationReport};

/// Verify every downloaded file. Returns whether everything is valid.
pub fn validate(project: &Path, format: OutputFormat) -> Result<bool> {
    let mirror = super::open(project)?;
    let report = mirror.validate()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(report.all_valid)
}

fn print_text(report: &ValidationReport) {
    let output = Output::new();

    if report.packages.is_empty() {
        output.info("No packages in state.");
        return;
    }

    for (id, package) in &report.packages {
        println!();
        let mark = if package.valid { "OK".green() } else { "FAILED".red() };
        println!("{} {}", id.as_str().cyan().bold(), mark);
        if let Some(error) = &package.error {
            output.error(error);
        }

        for (version, v) in &package.versions {
            if v.is_empty() {
                output.info(&format!("{version}: no files recorded"));
            }
            if v.directory_missing {
                output.error(&format!("{version}: download directory missing"));
            }
            for (file, check) in &v.files {
                match check.status {
                    FileStatus::Match => output.success(&format!("{version}/{file}: MATCH")),
                    FileStatus::Mismatch => output.error(&format!(
                        "{version}/{file}: MISMATCH (expected {}, computed {})",
                        check.expected, check.computed
                    )),
                }
            }
            for file in &v.missing_files {
                output.error(&format!("{version}/{file}: missing"));
            }
            for file in &v.unexpected_files {
                output.warning(&format!("{version}/{file}: unexpected file"));
            }
        }
    }

    if report.all_valid {
        output.summary("All hashes valid.");
    } else {
        output.summary("Validation failed.");
    }
}
