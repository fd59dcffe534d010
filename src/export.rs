// src/export.rs
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use log::info;
use crate::drivers::MonitorError;
use crate::types::ExportRecord;

/// Writes the rows as a spreadsheet (CSV with a `Time,ECG,Respiration,BPM`
/// header), sorted ascending by time. Absent channels become empty cells.
pub fn write_spreadsheet(path: &Path, rows: &[ExportRecord]) -> Result<usize, MonitorError> {
    let mut sorted: Vec<&ExportRecord> = rows.iter().collect();
    sorted.sort_by(|a, b| a.time.cmp(&b.time));
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for row in &sorted {
        writer.serialize(row)?;
    }
    // csv 只在写入第一行时输出表头
    if sorted.is_empty() {
        writer.write_record(["Time", "ECG", "Respiration", "BPM"])?;
    }
    let mut inner = writer
        .into_inner()
        .map_err(|e| MonitorError::ExportIo(e.into_error()))?;
    inner.flush()?;
    info!("💾 Exported {} row(s) to {}", sorted.len(), path.display());
    Ok(sorted.len())
}
