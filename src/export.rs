use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::report;
use crate::roster::RollIndex;

const MANIFEST_ENTRY: &str = "manifest.json";
const REPORTS_DIR: &str = "Student_Reports";
pub const BUNDLE_FORMAT: &str = "report-card-bundle-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub student_count: usize,
    pub skipped_count: usize,
    pub entry_count: usize,
}

/// Writes every student's report into one zip bundle: a JSON document per
/// roll under Student_Reports/, then a manifest with per-entry sha256
/// digests. Builds run one student at a time in first-seen roll order.
pub fn export_report_bundle(index: &RollIndex, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if index.is_empty() {
        return Err(anyhow!("no result rows loaded"));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<serde_json::Value> = Vec::new();
    let mut skipped = 0usize;
    for roll in index.rolls() {
        let rows = index.rows_for_key(roll).unwrap_or(&[]);
        let Some(rep) = report::build_report(rows) else {
            skipped += 1;
            continue;
        };
        let body = serde_json::to_vec_pretty(&rep)
            .with_context(|| format!("failed to serialize report for roll {}", roll))?;
        let entry_name = format!("{}/{}.json", REPORTS_DIR, entry_stem(&rep.profile.name, roll));
        zip.start_file(entry_name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", entry_name))?;
        zip.write_all(&body)
            .with_context(|| format!("failed to write entry {}", entry_name))?;
        entries.push(json!({
            "entry": entry_name,
            "roll": roll,
            "sha256": hex::encode(Sha256::digest(&body)),
        }));
    }

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let student_count = entries.len();
    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "studentCount": student_count,
        "skippedCount": skipped,
        "reports": entries,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        student_count,
        skipped_count: skipped,
        entry_count: student_count + 1,
    })
}

/// Filename-safe stem for a report entry; learner name falls back to
/// "Student" when the sheet left it blank.
fn entry_stem(name: &str, roll: &str) -> String {
    let base = if name.trim().is_empty() {
        "Student"
    } else {
        name.trim()
    };
    format!("{}_{}", base, roll)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
