use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::construct::Constructor;
use crate::db::Database;
use crate::db::models::{IngestStats, NewTrackData};
use crate::extract::{ExtractStatus, Extractor};

#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
}

/// Everything that happened during one batch run.
/// Per-file failures are collected here; they never abort the batch.
pub struct OrganizeReport {
    pub scanned: u64,
    pub renamed: Vec<(String, String)>,
    pub unchanged: Vec<String>,
    pub unmatched: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub stats: IngestStats,
    pub dry_run: bool,
}

impl OrganizeReport {
    fn new(dry_run: bool) -> Self {
        Self {
            scanned: 0,
            renamed: Vec::new(),
            unchanged: Vec::new(),
            unmatched: Vec::new(),
            failed: Vec::new(),
            stats: IngestStats::default(),
            dry_run,
        }
    }
}

/// Walk directories, extract every audio filename, ingest the records into
/// the catalog, and rename files to their canonical form (unless `dry_run`).
pub fn organize(
    db: &Database,
    extractor: &Extractor<'_>,
    constructor: &Constructor<'_>,
    paths: &[String],
    dry_run: bool,
) -> std::result::Result<OrganizeReport, OrganizeError> {
    // First pass: collect candidate audio files
    let mut audio_files: Vec<PathBuf> = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            if extractor.extension_allowed(ext) {
                audio_files.push(entry.path().to_path_buf());
            }
        }
    }

    let pb = ProgressBar::new(audio_files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb.set_message(if dry_run { "Previewing..." } else { "Organizing..." });

    let mut report = OrganizeReport::new(dry_run);

    // One transaction for the whole batch; per-file failures are recorded
    // and processing continues
    let tx = db
        .conn
        .unchecked_transaction()
        .map_err(crate::db::DbError::from)?;

    for path in &audio_files {
        report.scanned += 1;
        pb.inc(1);

        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };

        let record = extractor.extract(file_name);
        if record.status == ExtractStatus::Unmatched {
            report.unmatched.push(file_name.to_string());
            continue;
        }

        if !dry_run {
            if let Some(data) = NewTrackData::from_record(&record) {
                match db.ingest(&data) {
                    Ok(outcome) => report.stats.record(outcome),
                    Err(e) => {
                        log::warn!("Ingest failed for {}: {}", file_name, e);
                        report.failed.push((file_name.to_string(), e.to_string()));
                    }
                }
            }
        }

        let Some(new_name) = constructor.auto(&record) else {
            continue;
        };
        if new_name == file_name {
            report.unchanged.push(file_name.to_string());
            continue;
        }

        if dry_run {
            report.renamed.push((file_name.to_string(), new_name));
            continue;
        }
        match rename_file(path, &new_name) {
            Ok(()) => report.renamed.push((file_name.to_string(), new_name)),
            Err(e) => {
                log::warn!("Rename failed for {}: {}", file_name, e);
                report.failed.push((file_name.to_string(), e.to_string()));
            }
        }
    }

    tx.commit().map_err(crate::db::DbError::from)?;

    pb.finish_with_message(format!(
        "Done: {} renamed, {} unchanged, {} not formatted, {} errors",
        report.renamed.len(),
        report.unchanged.len(),
        report.unmatched.len(),
        report.failed.len()
    ));

    Ok(report)
}

/// Rename a file within its directory, refusing to overwrite an existing
/// target. Collisions are an ordinary per-file failure.
pub fn rename_file(path: &Path, new_name: &str) -> std::io::Result<()> {
    let target = path.with_file_name(new_name);
    if target.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("target already exists: {new_name}"),
        ));
    }
    std::fs::rename(path, target)
}

/// Render the report as Markdown.
pub fn render_report(report: &OrganizeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# Organize Report — {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    );
    if report.dry_run {
        let _ = writeln!(out, "\n*Dry run — no files were renamed.*");
    }

    let verb = if report.dry_run { "Would rename" } else { "Renamed" };
    let _ = writeln!(out, "\n## {} ({})", verb, report.renamed.len());
    for (old, new) in &report.renamed {
        let _ = writeln!(out, "- `{old}` -> `{new}`");
    }

    let _ = writeln!(out, "\n## Already canonical ({})", report.unchanged.len());
    for name in &report.unchanged {
        let _ = writeln!(out, "- `{name}`");
    }

    let _ = writeln!(out, "\n## Not formatted ({})", report.unmatched.len());
    for name in &report.unmatched {
        let _ = writeln!(out, "- `{name}`");
    }

    let _ = writeln!(out, "\n## Errors ({})", report.failed.len());
    for (name, err) in &report.failed {
        let _ = writeln!(out, "- `{name}`: {err}");
    }

    let s = &report.stats;
    let _ = writeln!(
        out,
        "\n## Catalog\n{} new artists, {} new tracks, {} updated, {} unchanged",
        s.new_artists, s.new_tracks, s.updated, s.unchanged
    );
    out
}

/// Write the rendered report into the first organized directory.
pub fn write_report(dir: &Path, report: &OrganizeReport) -> std::io::Result<PathBuf> {
    let path = dir.join("tracktidy_report.md");
    std::fs::write(&path, render_report(report))?;
    Ok(path)
}
