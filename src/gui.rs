// src/gui.rs
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use eframe::egui;
use egui::{Color32, RichText};
use egui_plot::{Line, Plot, PlotPoint, PlotPoints, Text, VLine};
use log::{error, info, warn};
use crate::drivers::source::LineSource;
use crate::drivers::{render_history_png, MonitorError, PlotStyle, ScrollBuffer};
use crate::engine::{wall_clock, MonitorSession};
use crate::export;
use crate::history;
use crate::types::*;

// 单帧内最多补跑的 tick 数
const MAX_TICKS_PER_FRAME: u32 = 64;

// 导出窗口的输入状态
struct ExportPanel {
    start: String,
    end: String,
    path: String,
    // 手动修改过路径后不再自动跟随时间范围
    path_edited: bool,
    status: String,
}

impl ExportPanel {
    fn new(start: String, end: String, dir: &Path, status: String) -> Self {
        let mut panel = Self { start, end, path: String::new(), path_edited: false, status };
        panel.reset_path(dir);
        panel
    }

    /// Points the output path back at the default name for the current range.
    fn reset_path(&mut self, dir: &Path) {
        self.path = dir
            .join(history::default_export_name(&self.start, &self.end))
            .display()
            .to_string();
        self.path_edited = false;
    }

    /// Called after the range fields change.
    fn range_changed(&mut self, dir: &Path) {
        if !self.path_edited {
            self.reset_path(dir);
        }
    }
}

// 历史数据图窗口
struct HistoryPlot {
    records: Vec<ExportRecord>,
    ticks: Vec<(usize, String)>,
    png_path: String,
}

enum ExportAction {
    Plot,
    Export,
}

pub struct MonitorApp {
    session: MonitorSession<Box<dyn LineSource>>,
    tick_interval: Duration,
    last_tick: Instant,
    export_dir: PathBuf,
    device_error: Option<String>,
    export_panel: Option<ExportPanel>,
    history_plot: Option<HistoryPlot>,
    log_messages: Vec<String>,
}

impl MonitorApp {
    pub fn new(
        session: MonitorSession<Box<dyn LineSource>>,
        tick_interval: Duration,
        export_dir: PathBuf,
        device_error: Option<MonitorError>,
    ) -> Self {
        let mut app = Self {
            session,
            tick_interval,
            last_tick: Instant::now(),
            export_dir,
            device_error: device_error.as_ref().map(|e| e.to_string()),
            export_panel: None,
            history_plot: None,
            log_messages: vec!["ECG Monitor ready.".to_owned()],
        };
        if let Some(e) = device_error {
            app.log(&format!("❌ {e}"));
        }
        app
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > 8 {
            self.log_messages.remove(0);
        }
    }

    fn handle_command(&mut self, command: MonitorCommand) {
        let before = self.session.state();
        let after = self.session.dispatch(command);
        match command {
            MonitorCommand::Export => self.open_export_panel(),
            _ if before != after => {
                // 恢复时不补跑暂停期间的 tick
                self.last_tick = Instant::now();
                self.log(if after == LoopState::Running { "▶ Started" } else { "⏸ Paused" });
            }
            _ => {}
        }
    }

    fn open_export_panel(&mut self) {
        let (start, end) = history::default_range(self.session.capture(), wall_clock());
        let status = if self.session.capture().is_empty() {
            "No data captured yet.".to_owned()
        } else {
            "Ready".to_owned()
        };
        self.export_panel = Some(ExportPanel::new(start, end, &self.export_dir, status));
    }

    /// Runs the ticks that came due since the last frame.
    fn run_due_ticks(&mut self) {
        if self.session.state() != LoopState::Running {
            return;
        }
        let elapsed = self.last_tick.elapsed();
        let interval = self.tick_interval.as_secs_f64().max(1e-3);
        let due = ((elapsed.as_secs_f64() / interval) as u32).clamp(1, MAX_TICKS_PER_FRAME);
        for _ in 0..due {
            match self.session.tick() {
                TickOutcome::Sample { alarm: true, sample } => {
                    self.log(&format!("🚨 BPM {:.0} out of range", sample.bpm));
                }
                TickOutcome::Idle | TickOutcome::Paused => break,
                _ => {}
            }
        }
        self.last_tick = Instant::now();
    }

    fn run_export_action(&mut self, panel: &mut ExportPanel, action: ExportAction) {
        let rows = match history::select_range(self.session.capture(), &panel.start, &panel.end) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("{e}");
                panel.status = e.to_string();
                return;
            }
        };
        match action {
            ExportAction::Plot => {
                panel.status = format!("Plotting {} record(s)", rows.len());
                let png_path = self
                    .export_dir
                    .join(history::default_export_name(&panel.start, &panel.end))
                    .with_extension("png")
                    .display()
                    .to_string();
                self.history_plot = Some(HistoryPlot {
                    ticks: history::axis_ticks(&rows),
                    records: rows,
                    png_path,
                });
            }
            ExportAction::Export => {
                let path = PathBuf::from(panel.path.trim());
                match export::write_spreadsheet(&path, &rows) {
                    Ok(n) => {
                        panel.status = format!("Exported {n} row(s) to {}", path.display());
                        self.log(&format!("💾 {} rows exported", n));
                    }
                    Err(e) => {
                        error!("{e}");
                        panel.status = e.to_string();
                    }
                }
            }
        }
    }

    fn show_export_panel(&mut self, ctx: &egui::Context) {
        let Some(mut panel) = self.export_panel.take() else {
            return;
        };
        let mut open = true;
        let mut action = None;
        egui::Window::new("ECG data export")
            .open(&mut open)
            .default_width(520.0)
            .show(ctx, |ui| {
                egui::Grid::new("export_range").num_columns(2).show(ui, |ui| {
                    ui.label("Start time:");
                    let start = ui.text_edit_singleline(&mut panel.start);
                    ui.end_row();
                    ui.label("End time:");
                    let end = ui.text_edit_singleline(&mut panel.end);
                    ui.end_row();
                    if start.changed() || end.changed() {
                        panel.range_changed(&self.export_dir);
                    }
                    ui.label("Save as:");
                    if ui.text_edit_singleline(&mut panel.path).changed() {
                        panel.path_edited = true;
                    }
                    ui.end_row();
                });
                ui.label(RichText::new("Format: YYYY-MM-DD HH:MM:SS").small().weak());
                ui.horizontal(|ui| {
                    if ui.button("📈 Plot").clicked() {
                        action = Some(ExportAction::Plot);
                    }
                    if ui.button("💾 Export").clicked() {
                        action = Some(ExportAction::Export);
                    }
                    if ui.button("Default name").clicked() {
                        panel.reset_path(&self.export_dir);
                    }
                });
                ui.separator();
                ui.label(panel.status.as_str());
            });
        if let Some(action) = action {
            self.run_export_action(&mut panel, action);
        }
        if open {
            self.export_panel = Some(panel);
        }
    }

    fn show_history_plot(&mut self, ctx: &egui::Context) {
        let Some(plot) = self.history_plot.take() else {
            return;
        };
        let mut open = true;
        let mut save = false;
        egui::Window::new("ECG history")
            .open(&mut open)
            .default_size([900.0, 500.0])
            .show(ctx, |ui| {
                if ui.button("Save chart (PNG)").clicked() {
                    save = true;
                }
                let points: Vec<[f64; 2]> = plot
                    .records
                    .iter()
                    .enumerate()
                    .map(|(i, r)| [i as f64, r.ecg])
                    .collect();
                let y_min = plot.records.iter().map(|r| r.ecg).fold(f64::INFINITY, f64::min);
                Plot::new("history_plot")
                    .height(400.0)
                    .show_x(false)
                    .show(ui, |plot_ui| {
                        plot_ui.line(
                            Line::new(PlotPoints::new(points))
                                .color(Color32::RED)
                                .name("ECG"),
                        );
                        for (idx, label) in &plot.ticks {
                            let x = *idx as f64;
                            plot_ui.vline(VLine::new(x).color(Color32::from_gray(80)));
                            if y_min.is_finite() {
                                plot_ui.text(Text::new(PlotPoint::new(x, y_min), label.clone()));
                            }
                        }
                    });
            });
        if save {
            let result = render_history_png(&plot.records, PlotStyle::default())
                .and_then(|png| std::fs::write(&plot.png_path, png).map_err(MonitorError::from));
            match result {
                Ok(()) => {
                    info!("Chart saved to {}", plot.png_path);
                    self.log(&format!("🖼 Chart saved to {}", plot.png_path));
                }
                Err(e) => {
                    error!("{e}");
                    self.log(&format!("❌ {e}"));
                }
            }
        }
        if open {
            self.history_plot = Some(plot);
        }
    }

    fn live_plot(
        ui: &mut egui::Ui,
        id: &str,
        title: &str,
        buffer: &ScrollBuffer,
        color: Color32,
        height: f32,
    ) {
        ui.label(RichText::new(title).strong());
        let (lo, hi) = buffer.bounds();
        Plot::new(id)
            .height(height)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .include_x(0.0)
            .include_x(buffer.len() as f64)
            .include_y(lo)
            .include_y(hi)
            .auto_bounds_x()
            .auto_bounds_y()
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(PlotPoints::new(buffer.points())).color(color).width(1.5));
            });
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 渲染循环
        self.run_due_ticks();
        if self.session.take_redraw() {
            ctx.request_repaint();
        }
        if self.session.state() == LoopState::Running {
            ctx.request_repaint_after(self.tick_interval);
        }

        // 2. UI 绘制
        let mut command = None;
        egui::SidePanel::left("controls").min_width(240.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("ECG Monitor");
            ui.label("ECG / Respiration / BPM");
            ui.separator();

            ui.horizontal(|ui| {
                let running = self.session.state() == LoopState::Running;
                if ui.add_enabled(!running, egui::Button::new("▶ START")).clicked() {
                    command = Some(MonitorCommand::Start);
                }
                if ui.add_enabled(running, egui::Button::new("⏸ PAUSE")).clicked() {
                    command = Some(MonitorCommand::Pause);
                }
                if ui.button("💾 EXPORT").clicked() {
                    command = Some(MonitorCommand::Export);
                }
            });

            ui.add_space(10.0);
            let state_text = match self.session.state() {
                LoopState::Running => RichText::new("● RUNNING").color(Color32::GREEN),
                LoopState::Paused => RichText::new("● PAUSED").color(Color32::YELLOW),
            };
            ui.label(state_text);
            if let Some(err) = &self.device_error {
                ui.label(RichText::new(err).color(Color32::RED).small());
            } else if !self.session.is_connected() {
                ui.label(RichText::new("Device not connected").color(Color32::RED).small());
            }

            ui.separator();
            let bpm = self.session.last_sample().map(|s| s.bpm);
            let bpm_text = match bpm {
                Some(v) => format!("{v:.0} BPM"),
                None => "-- BPM".to_owned(),
            };
            ui.label(RichText::new(bpm_text).size(28.0).strong());
            let stats = self.session.line_stats();
            ui.label(format!("Captured: {}", self.session.capture().len()));
            ui.label(format!("Lines ok / dropped: {} / {}", stats.lines_ok, stats.lines_dropped));
            ui.label(format!("Alarms: {}", self.session.alarms_fired()));
            if let Some(t) = self.session.last_alarm_time() {
                let at = history::format_local_time(t);
                let text = format!("Last alarm: {}", history::time_only(&at));
                ui.label(RichText::new(text).color(Color32::RED));
            }

            ui.add_space(10.0);
            egui::ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let height = (ui.available_height() / 2.0 - 30.0).max(120.0);
            let window = self.session.window();
            Self::live_plot(
                ui,
                "ecg_plot",
                "ECG",
                &window.ecg,
                Color32::from_rgb(230, 60, 60),
                height,
            );
            ui.add_space(8.0);
            Self::live_plot(
                ui,
                "resp_plot",
                "Respiration",
                &window.respiration,
                Color32::from_rgb(70, 130, 230),
                height,
            );
        });

        if let Some(command) = command {
            self.handle_command(command);
        }
        self.show_export_panel(ctx);
        self.show_history_plot(ctx);
    }
}
