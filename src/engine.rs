// src/engine.rs
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use log::{info, warn};
use crate::alarm::{AlarmMonitor, AlarmOutcome, AlertSink};
use crate::config::MonitorConfig;
use crate::drivers::serial::{pick_port, LineStats, ReadOutcome, SerialLineReader, SerialLineSource};
use crate::drivers::source::{LineSource, ManualSource, SimulatedSource};
use crate::drivers::{CaptureLog, MonitorError, ScrollWindow};
use crate::types::*;

pub type DynReader = SerialLineReader<Box<dyn LineSource>>;

/// Seconds since the Unix epoch.
pub fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// 数据来源
#[derive(Clone, Debug, PartialEq)]
pub enum SourceMode {
    Serial,
    Simulate,
    Replay(PathBuf),
}

/// Opens the selected source. A source that fails to open is reported once
/// through the returned error and the reader then stays silent.
pub fn connect(config: &MonitorConfig, mode: &SourceMode) -> (DynReader, Option<MonitorError>) {
    let opened: Result<Box<dyn LineSource>, MonitorError> = match mode {
        SourceMode::Simulate => {
            info!("🧪 Using simulated ECG source at {} Hz", config.simulate_rate_hz);
            Ok(Box::new(SimulatedSource::new(config.simulate_rate_hz)))
        }
        SourceMode::Replay(path) => std::fs::read(path)
            .map(|bytes| {
                info!("📼 Replaying {} ({} bytes)", path.display(), bytes.len());
                Box::new(ManualSource::new(bytes)) as Box<dyn LineSource>
            })
            .map_err(|e| MonitorError::DeviceUnavailable {
                port: path.display().to_string(),
                reason: e.to_string(),
            }),
        SourceMode::Serial => {
            let port = pick_port(config.port.as_deref());
            SerialLineSource::open(&port, config.baud_rate, config.read_timeout()).map(|source| {
                info!("✅ Connected to {} @ {} baud", source.port_name(), config.baud_rate);
                Box::new(source) as Box<dyn LineSource>
            })
        }
    };
    match opened {
        Ok(source) => (SerialLineReader::new(source), None),
        Err(e) => {
            warn!("❌ {e}");
            (SerialLineReader::disconnected(), Some(e))
        }
    }
}

/// Everything the live loop owns: reader, display window, capture history
/// and alarm state.
pub struct MonitorSession<S: LineSource> {
    reader: SerialLineReader<S>,
    window: ScrollWindow,
    capture: CaptureLog,
    alarm: AlarmMonitor,
    sink: Box<dyn AlertSink>,
    state: LoopState,
    last_stamp: f64,
    last_sample: Option<Sample>,
    alarms_fired: u64,
    redraw_pending: bool,
}

impl<S: LineSource> MonitorSession<S> {
    pub fn new(
        reader: SerialLineReader<S>,
        config: &MonitorConfig,
        sink: Box<dyn AlertSink>,
    ) -> Self {
        Self {
            reader,
            window: ScrollWindow::new(config.window_len),
            capture: CaptureLog::new(),
            alarm: AlarmMonitor::new(config.alarm_policy()),
            sink,
            state: LoopState::Running,
            last_stamp: f64::NEG_INFINITY,
            last_sample: None,
            alarms_fired: 0,
            redraw_pending: false,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn window(&self) -> &ScrollWindow {
        &self.window
    }

    pub fn capture(&self) -> &CaptureLog {
        &self.capture
    }

    pub fn line_stats(&self) -> LineStats {
        self.reader.stats()
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_connected()
    }

    pub fn last_sample(&self) -> Option<Sample> {
        self.last_sample
    }

    pub fn alarms_fired(&self) -> u64 {
        self.alarms_fired
    }

    pub fn last_alarm_time(&self) -> Option<f64> {
        self.alarm.last_alarm_time()
    }

    /// True once after a tick that changed the window.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw_pending)
    }

    /// Start/Pause drive the state machine; Export leaves it untouched and is
    /// handled by the caller.
    pub fn dispatch(&mut self, command: MonitorCommand) -> LoopState {
        match command {
            MonitorCommand::Start => {
                if self.state == LoopState::Paused {
                    info!("▶️ Acquisition resumed");
                }
                self.state = LoopState::Running;
            }
            MonitorCommand::Pause => {
                if self.state == LoopState::Running {
                    info!("⏸️ Acquisition paused");
                }
                self.state = LoopState::Paused;
            }
            MonitorCommand::Export => {}
        }
        self.state
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(wall_clock())
    }

    /// One unit of loop work with an explicit clock reading.
    pub fn tick_at(&mut self, now: f64) -> TickOutcome {
        if self.state == LoopState::Paused {
            return TickOutcome::Paused;
        }
        let sample = match self.reader.try_read_sample() {
            ReadOutcome::Sample(sample) => sample,
            ReadOutcome::NoData => return TickOutcome::Idle,
            ReadOutcome::ParseError => return TickOutcome::Dropped,
        };
        self.window.push(sample.ecg, sample.respiration);
        // 时间戳严格递增，避免同一时钟刻度内的记录互相覆盖
        let stamp = if now > self.last_stamp { now } else { self.last_stamp + 1e-6 };
        self.last_stamp = stamp;
        self.capture.record(stamp, sample);
        let alarm = self.alarm.check(sample.bpm, now) == AlarmOutcome::Fired;
        if alarm {
            self.alarms_fired += 1;
            self.sink.sound(sample.bpm);
        }
        self.last_sample = Some(sample);
        self.redraw_pending = true;
        TickOutcome::Sample { sample, alarm }
    }
}

/// Drives the session from this thread with a fixed sleep between ticks.
/// Runs until `duration` elapses, or forever when it is `None`.
pub fn run_headless<S: LineSource>(
    session: &mut MonitorSession<S>,
    tick_interval: Duration,
    duration: Option<Duration>,
) {
    let started = Instant::now();
    let mut last_report = Instant::now();
    info!("⚙️ Headless monitor running (tick {} ms)", tick_interval.as_millis());
    loop {
        if let Some(limit) = duration {
            if started.elapsed() >= limit {
                break;
            }
        }
        session.tick();
        if last_report.elapsed() >= Duration::from_secs(5) {
            last_report = Instant::now();
            report(session);
        }
        thread::sleep(tick_interval);
    }
    report(session);
}

fn report<S: LineSource>(session: &MonitorSession<S>) {
    let stats = session.line_stats();
    let bpm = session
        .last_sample()
        .map(|s| format!("{:.0}", s.bpm))
        .unwrap_or_else(|| "--".to_owned());
    info!(
        "📈 captured={} ok={} dropped={} alarms={} bpm={}",
        session.capture().len(),
        stats.lines_ok,
        stats.lines_dropped,
        session.alarms_fired(),
        bpm
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingSink(Rc<RefCell<Vec<f64>>>);

    impl AlertSink for CountingSink {
        fn sound(&mut self, bpm: f64) {
            self.0.borrow_mut().push(bpm);
        }
    }

    fn session_with(lines: Vec<String>) -> (MonitorSession<ManualSource>, Rc<RefCell<Vec<f64>>>) {
        let sounded = Rc::new(RefCell::new(Vec::new()));
        let reader = SerialLineReader::new(ManualSource::from_lines(lines));
        let session = MonitorSession::new(
            reader,
            &MonitorConfig::default(),
            Box::new(CountingSink(sounded.clone())),
        );
        (session, sounded)
    }

    #[test]
    fn six_hundred_lines_fill_window_and_log() {
        let lines = (0..600).map(|i| format!("{}.0,{}.5,72.0", i, i)).collect();
        let (mut session, _) = session_with(lines);
        let base = 1_700_000_000.0;
        for i in 0..600 {
            let outcome = session.tick_at(base + i as f64 * 0.01);
            assert!(matches!(outcome, TickOutcome::Sample { alarm: false, .. }));
        }
        assert_eq!(session.tick_at(base + 10.0), TickOutcome::Idle);
        let ecg = session.window().ecg.snapshot();
        assert_eq!(ecg.len(), 500);
        assert_eq!(ecg[0], 100.0);
        assert_eq!(ecg[499], 599.0);
        assert_eq!(session.window().respiration.len(), 500);
        assert_eq!(session.capture().len(), 600);
        let all = session.capture().query(base, base + 6.0);
        assert_eq!(all.records.len(), 600);
    }

    #[test]
    fn malformed_lines_do_not_stop_the_loop() {
        let lines = vec!["1,2,72".into(), "garbage".into(), "3,4,72".into()];
        let (mut session, _) = session_with(lines);
        assert!(matches!(session.tick_at(1.0), TickOutcome::Sample { .. }));
        assert_eq!(session.tick_at(2.0), TickOutcome::Dropped);
        assert!(matches!(session.tick_at(3.0), TickOutcome::Sample { .. }));
        assert_eq!(session.capture().len(), 2);
        assert_eq!(session.line_stats().lines_dropped, 1);
    }

    #[test]
    fn paused_loop_does_not_poll() {
        let (mut session, _) = session_with(vec!["1,2,72".into()]);
        assert_eq!(session.dispatch(MonitorCommand::Pause), LoopState::Paused);
        assert_eq!(session.tick_at(1.0), TickOutcome::Paused);
        assert_eq!(session.dispatch(MonitorCommand::Export), LoopState::Paused);
        assert!(session.capture().is_empty());
        assert_eq!(session.dispatch(MonitorCommand::Start), LoopState::Running);
        assert!(matches!(session.tick_at(2.0), TickOutcome::Sample { .. }));
        assert_eq!(session.capture().len(), 1);
    }

    #[test]
    fn alarm_is_rate_limited_across_ticks() {
        let lines = (0..5).map(|_| "0.1,0.2,200".to_string()).collect();
        let (mut session, sounded) = session_with(lines);
        let alarms: Vec<bool> = (0..5)
            .map(|t| match session.tick_at(t as f64) {
                TickOutcome::Sample { alarm, .. } => alarm,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(alarms, vec![true, false, false, true, false]);
        assert_eq!(sounded.borrow().len(), 2);
        assert_eq!(session.alarms_fired(), 2);
        assert_eq!(session.last_alarm_time(), Some(3.0));
    }

    #[test]
    fn repeated_clock_reading_keeps_every_sample() {
        let lines = (0..3).map(|i| format!("{i},0,72")).collect();
        let (mut session, _) = session_with(lines);
        for _ in 0..3 {
            session.tick_at(42.0);
        }
        assert_eq!(session.capture().len(), 3);
        let result = session.capture().query(42.0, 43.0);
        let ecg: Vec<f64> = result.records.iter().map(|r| r.sample.ecg).collect();
        assert_eq!(ecg, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn redraw_is_requested_only_after_new_data() {
        let (mut session, _) = session_with(vec!["1,2,72".into()]);
        assert!(!session.take_redraw());
        session.tick_at(1.0);
        assert!(session.take_redraw());
        assert!(!session.take_redraw());
        session.tick_at(2.0);
        assert!(!session.take_redraw());
    }

    #[test]
    fn replay_file_feeds_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");
        std::fs::write(&path, "0.1,0.2,70\n0.3,0.4,71\n").unwrap();
        let (reader, err) = connect(&MonitorConfig::default(), &SourceMode::Replay(path));
        assert!(err.is_none());
        let mut session = MonitorSession::new(
            reader,
            &MonitorConfig::default(),
            Box::new(CountingSink(Rc::new(RefCell::new(Vec::new())))),
        );
        session.tick_at(1.0);
        session.tick_at(2.0);
        assert_eq!(session.capture().len(), 2);
        assert_eq!(session.last_sample().map(|s| s.bpm), Some(71.0));
    }

    #[test]
    fn missing_replay_file_is_reported_once_and_goes_silent() {
        let dir = tempfile::tempdir().unwrap();
        let mode = SourceMode::Replay(dir.path().join("nope.txt"));
        let (reader, err) = connect(&MonitorConfig::default(), &mode);
        assert!(matches!(err, Some(MonitorError::DeviceUnavailable { .. })));
        assert!(!reader.is_connected());
        let mut session = MonitorSession::new(
            reader,
            &MonitorConfig::default(),
            Box::new(CountingSink(Rc::new(RefCell::new(Vec::new())))),
        );
        assert_eq!(session.tick_at(1.0), TickOutcome::Idle);
    }

    #[test]
    fn headless_runner_respects_duration() {
        let (mut session, _) = session_with(vec!["1,2,72".into(), "3,4,72".into()]);
        run_headless(&mut session, Duration::from_millis(1), Some(Duration::from_millis(30)));
        assert_eq!(session.capture().len(), 2);
    }
}
