use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{info, warn};

use super::pyliteral;
use crate::error::AppError;

/// Outcome of converting one gzip dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub written: usize,
    pub failed: usize,
}

/// Convert the gzip'd metadata dump (one Python dict per line) into a JSON array.
pub fn clean_metadata(input_gz: &Path, output_json: &Path) -> Result<CleanReport, AppError> {
    let report = convert_lines(input_gz, output_json)?;
    info!(
        input = %input_gz.display(),
        output = %output_json.display(),
        written = report.written,
        failed = report.failed,
        "metadata cleaned"
    );
    Ok(report)
}

/// Convert the gzip'd review dump (one JSON object per line) into a JSON array.
pub fn clean_reviews(input_gz: &Path, output_json: &Path) -> Result<CleanReport, AppError> {
    let report = convert_lines(input_gz, output_json)?;
    info!(
        input = %input_gz.display(),
        output = %output_json.display(),
        written = report.written,
        failed = report.failed,
        "reviews cleaned"
    );
    Ok(report)
}

fn convert_lines(input_gz: &Path, output_json: &Path) -> Result<CleanReport, AppError> {
    let file = File::open(input_gz)
        .map_err(|e| AppError::Ingest(format!("cannot open {}: {e}", input_gz.display())))?;
    let mut reader = BufReader::new(GzDecoder::new(file));

    if let Some(parent) = output_json.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let out = File::create(output_json)
        .map_err(|e| AppError::Ingest(format!("cannot create {}: {e}", output_json.display())))?;
    let mut writer = BufWriter::new(out);

    let mut report = CleanReport::default();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    writer.write_all(b"[")?;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| AppError::Ingest(format!("read {}: {e}", input_gz.display())))?;
        if n == 0 {
            break;
        }
        line_no += 1;
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping line that is not valid UTF-8");
                report.failed += 1;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match pyliteral::parse(line) {
            Ok(value) => {
                if report.written > 0 {
                    writer.write_all(b",\n")?;
                }
                serde_json::to_writer(&mut writer, &value)
                    .map_err(|e| AppError::Ingest(format!("write {}: {e}", output_json.display())))?;
                report.written += 1;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping unparsable line");
                report.failed += 1;
            }
        }
    }
    writer.write_all(b"]")?;
    writer.flush()?;
    Ok(report)
}
