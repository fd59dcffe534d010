use thiserror::Error;
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("serial device {port} unavailable: {reason}")]
    DeviceUnavailable { port: String, reason: String },
    #[error("line could not be decoded as UTF-8, GBK or Latin-1")]
    Decode,
    #[error("malformed record {line:?}: {reason}")]
    Parse { line: String, reason: String },
    #[error("invalid time {input:?} (expected YYYY-MM-DD HH:MM:SS): {reason}")]
    TimeFormat { input: String, reason: String },
    #[error("{}", empty_result_message(*invalid_timestamp, *missing_primary))]
    EmptyResult {
        invalid_timestamp: usize,
        missing_primary: usize,
    },
    #[error("failed to write export file: {0}")]
    ExportIo(#[from] std::io::Error),
    #[error("failed to write spreadsheet rows: {0}")]
    ExportCsv(#[from] csv::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
fn empty_result_message(invalid_timestamp: usize, missing_primary: usize) -> String {
    let mut msg = String::from("no valid records in the selected time range");
    if invalid_timestamp > 0 {
        msg.push_str(&format!("; {invalid_timestamp} record(s) with an invalid timestamp"));
    }
    if missing_primary > 0 {
        msg.push_str(&format!("; {missing_primary} record(s) missing the ECG value"));
    }
    msg
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for MonitorError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        MonitorError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for MonitorError {
    fn from(value: image::ImageError) -> Self {
        MonitorError::Plot(value.to_string())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn empty_result_reports_diagnostic_counts() {
        let plain = MonitorError::EmptyResult {
            invalid_timestamp: 0,
            missing_primary: 0,
        };
        assert_eq!(
            plain.to_string(),
            "no valid records in the selected time range"
        );
        let detailed = MonitorError::EmptyResult {
            invalid_timestamp: 2,
            missing_primary: 3,
        };
        let msg = detailed.to_string();
        assert!(msg.contains("2 record(s) with an invalid timestamp"));
        assert!(msg.contains("3 record(s) missing the ECG value"));
    }
}
