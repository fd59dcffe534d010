// src/drivers/mod.rs
// 采集与存储相关的底层模块
pub mod buffer;
pub mod capture;
pub mod error;
pub mod plot;
pub mod serial;
pub mod source;
// 公开导出常用类型，方便外部调用
pub use buffer::{ScrollBuffer, ScrollWindow, WINDOW_LEN};
pub use capture::CaptureLog;
pub use error::MonitorError;
pub use plot::{render_history_png, PlotStyle};
