use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use autovot_decode::{BatchReport, JobOutcome};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub model_path: String,
    pub tier_name: String,
    pub job_count: usize,
    pub written_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub schema_version: u32,
    pub meta: Meta,
    pub jobs: &'a [JobOutcome],
}

impl<'a> ReportDocument<'a> {
    pub fn new(meta: Meta, report: &'a BatchReport) -> Self {
        Self {
            schema_version: 1,
            meta,
            jobs: &report.outcomes,
        }
    }
}

pub fn write_report(path: &Path, report: &ReportDocument<'_>) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            format!(
                "Failed to create report output directory '{}': {err}",
                parent.display()
            )
        })?;
    }

    let mut file = File::create(path)
        .map_err(|err| format!("Failed to create report file '{}': {err}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, report).map_err(|err| {
        format!(
            "Failed to serialize report JSON '{}': {err}",
            path.display()
        )
    })?;
    file.write_all(b"\n")
        .map_err(|err| format!("Failed to finalize report file '{}': {err}", path.display()))?;
    Ok(())
}
