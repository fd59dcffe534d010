use std::collections::HashMap;
use crate::types::{CaptureRecord, Sample};
/// Result of a time-range lookup, with the reasons entries were left out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureQuery {
    /// Ascending by timestamp.
    pub records: Vec<CaptureRecord>,
    pub invalid_timestamp: usize,
    pub missing_primary: usize,
}
impl CaptureQuery {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
/// Every sample acquired during the session, keyed by acquisition time.
///
/// Keys are the bit pattern of the timestamp, so recording twice at the exact
/// same instant replaces the earlier sample. Nothing is ever evicted.
#[derive(Default)]
pub struct CaptureLog {
    entries: HashMap<u64, CaptureRecord>,
}
impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn record(&mut self, timestamp: f64, sample: Sample) {
        self.entries
            .insert(timestamp.to_bits(), CaptureRecord { timestamp, sample });
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Earliest and latest valid timestamps, if any.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        self.entries
            .values()
            .map(|r| r.timestamp)
            .filter(|t| t.is_finite())
            .fold(None, |span, t| match span {
                None => Some((t, t)),
                Some((lo, hi)) => Some((f64::min(lo, t), f64::max(hi, t))),
            })
    }
    /// Entries with `min(start, end) <= timestamp <= max(start, end)`.
    pub fn query(&self, start: f64, end: f64) -> CaptureQuery {
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        self.collect(|t| t >= lo && t <= hi)
    }
    /// Entries with `start <= timestamp < end`.
    pub fn query_until(&self, start: f64, end: f64) -> CaptureQuery {
        self.collect(|t| t >= start && t < end)
    }
    fn collect(&self, in_range: impl Fn(f64) -> bool) -> CaptureQuery {
        let mut result = CaptureQuery::default();
        for record in self.entries.values() {
            if !record.timestamp.is_finite() {
                result.invalid_timestamp += 1;
                continue;
            }
            if !in_range(record.timestamp) {
                continue;
            }
            if !record.sample.ecg.is_finite() {
                result.missing_primary += 1;
                continue;
            }
            result.records.push(*record);
        }
        result
            .records
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        result
    }
}
