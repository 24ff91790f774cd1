//! Search command

use crate::ui::Output;
use crate::ui::table::search_table;
use anyhow::Result;
use std::path::Path;
use wgm_core::PackageFilter;

/// List repository packages matching `target` with their download status.
pub fn search(project: &Path, target: &str) -> Result<()> {
    let mirror = super::open(project)?;
    let output = Output::new();

    let rows = mirror.search(&PackageFilter::parse(target))?;
    if rows.is_empty() {
        output.info(&format!("No packages found matching '{target}'"));
        return Ok(());
    }

    let mut packages: Vec<String> = rows.iter().map(|r| r.id.to_string()).collect();
    packages.dedup();
    println!("Found {} package(s) matching '{target}':", packages.len());
    println!("{}", search_table(&rows));
    Ok(())
}
