use std::io::{self, BufRead, BufReader, Read};
use std::time::Duration;
use log::{debug, error};
use serialport::SerialPort;
use crate::drivers::source::LineSource;
use crate::drivers::MonitorError;
use crate::types::Sample;
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Serial device as a [`LineSource`].
pub struct SerialLineSource {
    port_name: String,
    reader: BufReader<Box<dyn SerialPort>>,
}
impl SerialLineSource {
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, MonitorError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| MonitorError::DeviceUnavailable {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            port_name: port_name.to_string(),
            reader: BufReader::new(port),
        })
    }
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}
impl LineSource for SerialLineSource {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let buffered = self.reader.buffer().len();
        let pending = self.reader.get_ref().bytes_to_read().map_err(io::Error::from)? as usize;
        Ok(buffered + pending)
    }
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        read_ready_line(&mut self.reader, |port| Ok(port.bytes_to_read()? as usize), buf)
    }
}
/// Appends buffered and already-arrived bytes to `buf`, up to and including
/// the first newline. Never asks `reader` for more than `ready` reports, so a
/// device that stalls mid-record cannot block the caller.
fn read_ready_line<R: Read>(
    reader: &mut BufReader<R>,
    mut ready: impl FnMut(&R) -> io::Result<usize>,
    buf: &mut Vec<u8>,
) -> io::Result<bool> {
    loop {
        if reader.buffer().is_empty() && ready(reader.get_ref())? == 0 {
            return Ok(false);
        }
        let available = match reader.fill_buf() {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(false),
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(false);
        }
        match available.iter().position(|b| *b == b'\n') {
            Some(end) => {
                buf.extend_from_slice(&available[..=end]);
                reader.consume(end + 1);
                return Ok(true);
            }
            None => {
                let taken = available.len();
                buf.extend_from_slice(available);
                reader.consume(taken);
            }
        }
    }
}
/// Names of the serial ports present on this machine.
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            error!("Error listing ports: {e}");
            Vec::new()
        }
    }
}
/// Configured port, else the first one found, else a platform default.
pub fn pick_port(requested: Option<&str>) -> String {
    if let Some(port) = requested {
        return port.to_string();
    }
    list_ports().into_iter().next().unwrap_or_else(|| {
        if cfg!(windows) {
            "COM8".to_string()
        } else {
            "/dev/ttyUSB0".to_string()
        }
    })
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReadOutcome {
    Sample(Sample),
    NoData,
    ParseError,
}
/// Line counters shown in the status bar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineStats {
    pub lines_ok: u64,
    pub lines_dropped: u64,
}
/// Polls a [`LineSource`] and turns each record into a [`Sample`].
///
/// A reader without a source (the device failed to open) reports `NoData`
/// forever.
pub struct SerialLineReader<S: LineSource> {
    source: Option<S>,
    pending: Vec<u8>,
    stats: LineStats,
}
impl<S: LineSource> SerialLineReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            pending: Vec::new(),
            stats: LineStats::default(),
        }
    }
    pub fn disconnected() -> Self {
        Self {
            source: None,
            pending: Vec::new(),
            stats: LineStats::default(),
        }
    }
    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }
    pub fn stats(&self) -> LineStats {
        self.stats
    }
    pub fn try_read_sample(&mut self) -> ReadOutcome {
        let Some(source) = self.source.as_mut() else {
            return ReadOutcome::NoData;
        };
        match source.bytes_available() {
            Ok(0) => return ReadOutcome::NoData,
            Ok(_) => {}
            Err(e) => {
                debug!("poll failed: {e}");
                return ReadOutcome::NoData;
            }
        }
        match source.read_line(&mut self.pending) {
            Ok(true) => {}
            // 半行数据留到下一次 tick 继续拼接
            Ok(false) => return ReadOutcome::NoData,
            Err(e) => {
                debug!("read failed: {e}");
                self.pending.clear();
                self.stats.lines_dropped += 1;
                return ReadOutcome::ParseError;
            }
        }
        let raw = std::mem::take(&mut self.pending);
        match decode_line(&raw).and_then(|line| parse_sample(&line)) {
            Ok(sample) => {
                self.stats.lines_ok += 1;
                ReadOutcome::Sample(sample)
            }
            Err(e) => {
                self.stats.lines_dropped += 1;
                debug!("dropped line: {e}");
                ReadOutcome::ParseError
            }
        }
    }
}
/// UTF-8, then GBK, then Latin-1.
pub fn decode_line(raw: &[u8]) -> Result<String, MonitorError> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Ok(text.to_owned());
    }
    if let Some(text) = encoding_rs::GBK.decode_without_bom_handling_and_without_replacement(raw) {
        return Ok(text.into_owned());
    }
    let (text, had_errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(raw);
    if had_errors {
        return Err(MonitorError::Decode);
    }
    Ok(text.into_owned())
}
/// `ecg,respiration,bpm[,...]` into a [`Sample`].
pub fn parse_sample(line: &str) -> Result<Sample, MonitorError> {
    let line = line.trim();
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 3 {
        return Err(MonitorError::Parse {
            line: line.to_string(),
            reason: format!("expected 3 fields, got {}", fields.len()),
        });
    }
    let field = |idx: usize, name: &str| -> Result<f64, MonitorError> {
        fields[idx].parse::<f64>().map_err(|e| MonitorError::Parse {
            line: line.to_string(),
            reason: format!("{name}: {e}"),
        })
    };
    Ok(Sample {
        ecg: field(0, "ecg")?,
        respiration: field(1, "respiration")?,
        bpm: field(2, "bpm")?,
    })
}
