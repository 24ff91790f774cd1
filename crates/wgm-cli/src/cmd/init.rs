//! Init command

use crate::ui::Output;
use anyhow::{Context, Result};
use std::path::Path;
use wgm_core::{InitOutcome, init_project};

/// Create a project directory with default configuration.
pub fn init(path: &Path) -> Result<()> {
    let output = Output::new();
    match init_project(path).context("Failed to initialize project")? {
        InitOutcome::Created(root) => {
            output.success(&format!("Initialized project at {}", root.display()));
        }
        InitOutcome::AlreadyInitialized(root) => {
            output.info(&format!("Project already initialized at {}", root.display()));
        }
    }
    Ok(())
}
