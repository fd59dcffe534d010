// src/alarm.rs
use std::io::Write;
use std::time::Duration;
use log::warn;

/// Safe heart-rate band and alarm pacing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlarmPolicy {
    pub bpm_low: f64,
    pub bpm_high: f64,
    /// Minimum seconds between two alarms.
    pub interval_secs: f64,
}

impl Default for AlarmPolicy {
    fn default() -> Self {
        Self { bpm_low: 40.0, bpm_high: 120.0, interval_secs: 3.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmOutcome {
    Fired,
    Quiet,
}

/// Rate limiter for the heart-rate alarm. No hysteresis: a value that stays
/// out of range re-fires once per interval.
pub struct AlarmMonitor {
    policy: AlarmPolicy,
    last_alarm_time: Option<f64>,
}

impl AlarmMonitor {
    pub fn new(policy: AlarmPolicy) -> Self {
        Self { policy, last_alarm_time: None }
    }

    pub fn last_alarm_time(&self) -> Option<f64> {
        self.last_alarm_time
    }

    pub fn check(&mut self, bpm: f64, now: f64) -> AlarmOutcome {
        let out_of_range = bpm < self.policy.bpm_low || bpm > self.policy.bpm_high;
        if !out_of_range {
            return AlarmOutcome::Quiet;
        }
        let ready = match self.last_alarm_time {
            None => true,
            Some(last) => now - last >= self.policy.interval_secs,
        };
        if !ready {
            return AlarmOutcome::Quiet;
        }
        self.last_alarm_time = Some(now);
        AlarmOutcome::Fired
    }
}

/// Something that can make the alarm heard. Must return without waiting for
/// the tone to finish.
pub trait AlertSink {
    fn sound(&mut self, bpm: f64);
}

/// Tone parameters for the audible alert.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    pub freq_hz: u32,
    pub duration: Duration,
}

impl Default for Tone {
    fn default() -> Self {
        Self { freq_hz: 1000, duration: Duration::from_millis(500) }
    }
}

/// Terminal bell plus a warning in the log.
pub struct BellAlert {
    tone: Tone,
}

impl BellAlert {
    pub fn new(tone: Tone) -> Self {
        Self { tone }
    }
}

impl AlertSink for BellAlert {
    fn sound(&mut self, bpm: f64) {
        warn!("⚠️ Heart rate out of range: {bpm:.0} BPM ({} Hz / {} ms)", self.tone.freq_hz, self.tone.duration.as_millis());
        let mut out = std::io::stderr();
        write!(out, "\x07").ok();
        out.flush().ok();
    }
}

/// Sine tone through the default audio device.
#[cfg(feature = "audio")]
pub struct ToneAlert {
    tone: Tone,
    // 输出流必须保持存活，否则声音立即被截断
    _stream: rodio::OutputStream,
    handle: rodio::OutputStreamHandle,
}

#[cfg(feature = "audio")]
impl ToneAlert {
    pub fn new(tone: Tone) -> anyhow::Result<Self> {
        let (stream, handle) = rodio::OutputStream::try_default()?;
        Ok(Self { tone, _stream: stream, handle })
    }
}

#[cfg(feature = "audio")]
impl AlertSink for ToneAlert {
    fn sound(&mut self, bpm: f64) {
        use rodio::Source;
        warn!("⚠️ Heart rate out of range: {bpm:.0} BPM");
        match rodio::Sink::try_new(&self.handle) {
            Ok(sink) => {
                let wave = rodio::source::SineWave::new(self.tone.freq_hz as f32)
                    .take_duration(self.tone.duration)
                    .amplify(0.25);
                sink.append(wave);
                sink.detach();
            }
            Err(e) => warn!("audio alert failed: {e}"),
        }
    }
}

/// Picks the best available sink for this build.
pub fn default_sink(tone: Tone) -> Box<dyn AlertSink> {
    #[cfg(feature = "audio")]
    {
        match ToneAlert::new(tone) {
            Ok(sink) => return Box::new(sink),
            Err(e) => warn!("no audio output ({e}), falling back to terminal bell"),
        }
    }
    Box::new(BellAlert::new(tone))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval_while_out_of_range() {
        let mut monitor = AlarmMonitor::new(AlarmPolicy::default());
        let fired: Vec<f64> = (0..5)
            .map(|t| t as f64)
            .filter(|t| monitor.check(200.0, *t) == AlarmOutcome::Fired)
            .collect();
        assert_eq!(fired, vec![0.0, 3.0]);
    }

    #[test]
    fn in_range_values_never_fire() {
        let mut monitor = AlarmMonitor::new(AlarmPolicy::default());
        for (i, bpm) in [40.0, 72.0, 120.0].into_iter().enumerate() {
            assert_eq!(monitor.check(bpm, i as f64 * 10.0), AlarmOutcome::Quiet);
        }
        assert_eq!(monitor.last_alarm_time(), None);
    }

    #[test]
    fn low_rate_fires_and_updates_last_time() {
        let mut monitor = AlarmMonitor::new(AlarmPolicy::default());
        assert_eq!(monitor.check(30.0, 100.0), AlarmOutcome::Fired);
        assert_eq!(monitor.last_alarm_time(), Some(100.0));
        assert_eq!(monitor.check(30.0, 102.9), AlarmOutcome::Quiet);
        assert_eq!(monitor.check(130.0, 103.0), AlarmOutcome::Fired);
    }

    #[test]
    fn quiet_samples_do_not_reset_the_interval() {
        let mut monitor = AlarmMonitor::new(AlarmPolicy::default());
        assert_eq!(monitor.check(200.0, 0.0), AlarmOutcome::Fired);
        assert_eq!(monitor.check(80.0, 1.0), AlarmOutcome::Quiet);
        assert_eq!(monitor.check(200.0, 2.0), AlarmOutcome::Quiet);
        assert_eq!(monitor.check(200.0, 3.5), AlarmOutcome::Fired);
    }
}
