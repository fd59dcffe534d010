use std::collections::VecDeque;
use std::f64::consts::PI;
use std::io;
use std::time::Instant;
use rand::Rng;
/// Byte stream that delivers newline-terminated records.
pub trait LineSource {
    /// Bytes that can be read right now. Must not block.
    fn bytes_available(&mut self) -> io::Result<usize>;
    /// Appends bytes up to and including the next `\n` to `buf`.
    /// Returns `false` when the stream ran dry before a newline arrived.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool>;
}
impl<T: LineSource + ?Sized> LineSource for Box<T> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        (**self).read_line(buf)
    }
}
/// In-memory source useful for tests and deterministic playback.
#[derive(Default)]
pub struct ManualSource {
    queue: VecDeque<u8>,
}
impl ManualSource {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            queue: bytes.as_ref().iter().copied().collect(),
        }
    }
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut source = Self::default();
        for line in lines {
            source.feed(line.as_ref().as_bytes());
            source.feed(b"\n");
        }
        source
    }
    pub fn feed(&mut self, bytes: &[u8]) {
        self.queue.extend(bytes.iter().copied());
    }
}
impl LineSource for ManualSource {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.queue.len())
    }
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        while let Some(byte) = self.queue.pop_front() {
            buf.push(byte);
            if byte == b'\n' {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
/// Synthetic ECG/respiration stream for running without hardware.
pub struct SimulatedSource {
    started: Instant,
    sample_rate_hz: f64,
    emitted: u64,
    bpm: f64,
    beat_phase: f64,
}
impl SimulatedSource {
    pub fn new(sample_rate_hz: f64) -> Self {
        Self {
            started: Instant::now(),
            sample_rate_hz: sample_rate_hz.max(1.0),
            emitted: 0,
            bpm: 72.0,
            beat_phase: 0.0,
        }
    }
    fn due(&self) -> u64 {
        (self.started.elapsed().as_secs_f64() * self.sample_rate_hz) as u64
    }
    fn next_line(&mut self) -> String {
        let mut rng = rand::thread_rng();
        let dt = 1.0 / self.sample_rate_hz;
        let t = self.emitted as f64 * dt;
        self.emitted += 1;
        // 心率随机游走
        self.bpm = (self.bpm + rng.gen_range(-0.3..0.3)).clamp(35.0, 130.0);
        self.beat_phase = (self.beat_phase + dt * self.bpm / 60.0).fract();
        let ecg = pqrst(self.beat_phase) + rng.gen_range(-0.02..0.02);
        let respiration = (2.0 * PI * 0.25 * t).sin() + rng.gen_range(-0.01..0.01);
        format!("{ecg:.4},{respiration:.4},{:.1}\n", self.bpm)
    }
}
impl LineSource for SimulatedSource {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(if self.due() > self.emitted { 1 } else { 0 })
    }
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        buf.extend_from_slice(self.next_line().as_bytes());
        Ok(true)
    }
}
/// One heartbeat as a sum of Gaussian bumps, `phase` in `[0, 1)`.
fn pqrst(phase: f64) -> f64 {
    const WAVES: [(f64, f64, f64); 5] = [
        (0.10, 0.15, 0.025), // P
        (0.20, -0.12, 0.008), // Q
        (0.23, 1.20, 0.010), // R
        (0.26, -0.25, 0.008), // S
        (0.45, 0.30, 0.040), // T
    ];
    WAVES
        .iter()
        .map(|(center, amp, width)| {
            amp * (-((phase - center).powi(2)) / (2.0 * width * width)).exp()
        })
        .sum()
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn manual_source_splits_on_newline() {
        let mut source = ManualSource::from_lines(["1,2,3", "4,5,6"]);
        assert_eq!(source.bytes_available().unwrap(), 12);
        let mut buf = Vec::new();
        assert!(source.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"1,2,3\n");
        buf.clear();
        assert!(source.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"4,5,6\n");
        assert_eq!(source.bytes_available().unwrap(), 0);
    }
    #[test]
    fn manual_source_reports_partial_line() {
        let mut source = ManualSource::new(b"0.5,1.");
        let mut buf = Vec::new();
        assert!(!source.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"0.5,1.");
    }
    #[test]
    fn simulated_lines_are_well_formed() {
        let mut source = SimulatedSource::new(250.0);
        for _ in 0..50 {
            let mut buf = Vec::new();
            assert!(source.read_line(&mut buf).unwrap());
            let line = String::from_utf8(buf).unwrap();
            let fields: Vec<f64> = line
                .trim()
                .split(',')
                .map(|f| f.parse().unwrap())
                .collect();
            assert_eq!(fields.len(), 3);
            assert!((35.0..=130.0).contains(&fields[2]));
        }
    }
    #[test]
    fn r_peak_dominates_the_beat() {
        assert!(pqrst(0.23) > 1.0);
        assert!(pqrst(0.7).abs() < 0.05);
    }
}
