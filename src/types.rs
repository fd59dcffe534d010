// src/types.rs
use serde::{Deserialize, Serialize};

// 一次采集：心电、呼吸、心率
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub ecg: f64,
    pub respiration: f64,
    pub bpm: f64,
}

// 采集日志中的一条记录 (时间戳为 Unix 秒)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureRecord {
    pub timestamp: f64,
    pub sample: Sample,
}

/// Row of the exported spreadsheet, also fed to the history plot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "ECG")]
    pub ecg: f64,
    #[serde(rename = "Respiration")]
    pub respiration: Option<f64>,
    #[serde(rename = "BPM")]
    pub bpm: Option<f64>,
}

// 渲染循环状态
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum LoopState {
    Running,
    Paused,
}

// GUI 发给渲染循环的命令
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorCommand {
    Start,
    Pause,
    Export,
}

// 单次 tick 的结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    Sample { sample: Sample, alarm: bool },
    Idle,
    Dropped,
    Paused,
}
