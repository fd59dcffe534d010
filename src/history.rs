// src/history.rs
use chrono::{Local, NaiveDateTime, TimeZone};
use log::info;
use crate::drivers::{CaptureLog, MonitorError};
use crate::types::{CaptureRecord, ExportRecord};

/// Format shared by the range fields, the export `Time` column and plot labels.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Upper bound on labelled ticks along the history plot's x axis.
pub const MAX_TICKS: usize = 5;

/// Parses a local `YYYY-MM-DD HH:MM:SS` string into Unix seconds.
pub fn parse_local_time(input: &str) -> Result<f64, MonitorError> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), TIME_FORMAT).map_err(|e| {
        MonitorError::TimeFormat {
            input: input.to_string(),
            reason: e.to_string(),
        }
    })?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| MonitorError::TimeFormat {
            input: input.to_string(),
            reason: "time does not exist in the local time zone".to_string(),
        })?;
    Ok(local.timestamp_millis() as f64 / 1000.0)
}

/// Formats Unix seconds as local `YYYY-MM-DD HH:MM:SS`.
pub fn format_local_time(timestamp: f64) -> String {
    let millis = (timestamp * 1000.0).floor() as i64;
    match Local.timestamp_millis_opt(millis).earliest() {
        Some(dt) => dt.format(TIME_FORMAT).to_string(),
        None => String::from("invalid time"),
    }
}

pub fn to_export_record(record: &CaptureRecord) -> ExportRecord {
    let value = |v: f64| if v.is_finite() { Some(v) } else { None };
    ExportRecord {
        time: format_local_time(record.timestamp),
        ecg: record.sample.ecg,
        respiration: value(record.sample.respiration),
        bpm: value(record.sample.bpm),
    }
}

/// Records between two operator-supplied times, oldest first. Either order is
/// accepted and the later time covers its whole second. An empty result is
/// reported as [`MonitorError::EmptyResult`].
pub fn select_range(
    log: &CaptureLog,
    start: &str,
    end: &str,
) -> Result<Vec<ExportRecord>, MonitorError> {
    let start_ts = parse_local_time(start)?;
    let end_ts = parse_local_time(end)?;
    let (lo, hi) = if start_ts <= end_ts { (start_ts, end_ts) } else { (end_ts, start_ts) };
    // 输入只精确到秒，结束时间包含该秒内的全部样本
    let result = log.query_until(lo, hi + 1.0);
    if result.is_empty() {
        return Err(MonitorError::EmptyResult {
            invalid_timestamp: result.invalid_timestamp,
            missing_primary: result.missing_primary,
        });
    }
    info!("🔎 {} record(s) between {} and {}", result.records.len(), start, end);
    Ok(result.records.iter().map(to_export_record).collect())
}

/// Pre-fill values for the range fields: the captured span, or now/now.
pub fn default_range(log: &CaptureLog, now: f64) -> (String, String) {
    let (lo, hi) = log.time_span().unwrap_or((now, now));
    (format_local_time(lo), format_local_time(hi))
}

/// Suggested export filename embedding the selected range.
pub fn default_export_name(start: &str, end: &str) -> String {
    let clean = |s: &str| s.trim().replace(':', "-").replace(' ', "_");
    format!("ECG_{}_{}.csv", clean(start), clean(end))
}

/// Up to [`MAX_TICKS`] evenly spaced row indices with time-only labels.
pub fn axis_ticks(records: &[ExportRecord]) -> Vec<(usize, String)> {
    if records.len() < 2 {
        return Vec::new();
    }
    let count = MAX_TICKS.min(records.len());
    let last = records.len() - 1;
    let mut ticks: Vec<(usize, String)> = (0..count)
        .map(|i| {
            let idx = i * last / (count - 1);
            (idx, time_only(&records[idx].time).to_string())
        })
        .collect();
    ticks.dedup_by_key(|(idx, _)| *idx);
    ticks
}

pub fn time_only(label: &str) -> &str {
    match label.split_once(' ') {
        Some((_, time)) => time,
        None => label,
    }
}
