use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::drivers::error::MonitorError;
use crate::history::{axis_ticks, MAX_TICKS};
use crate::types::ExportRecord;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub trace: RGBColor,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            background: RGBColor(10, 10, 10),
            trace: RED,
        }
    }
}
/// Draws the ECG column of `records` against row index, with at most five
/// time-of-day labels along the x axis. Returns PNG bytes.
pub fn render_history_png(
    records: &[ExportRecord],
    style: PlotStyle,
) -> Result<Vec<u8>, MonitorError> {
    if records.is_empty() {
        return Err(MonitorError::Plot("no records to plot".into()));
    }
    let ticks = axis_ticks(records);
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let (y_min, y_max) = records
            .iter()
            .map(|r| r.ecg)
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let y_bounds = if !y_min.is_finite() || (y_max - y_min).abs() < f64::EPSILON {
            let mid = if y_min.is_finite() { y_min } else { 0.0 };
            (mid - 1.0, mid + 1.0)
        } else {
            (y_min, y_max)
        };
        let x_max = (records.len() - 1).max(1) as f64;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption("ECG history", ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(0f64..x_max, y_bounds.0..y_bounds.1)?;
        chart
            .configure_mesh()
            .light_line_style(&WHITE.mix(0.1))
            .x_labels(MAX_TICKS)
            .x_label_formatter(&|x| {
                let idx = x.round().max(0.0) as usize;
                ticks
                    .iter()
                    .min_by_key(|(tick, _)| tick.abs_diff(idx))
                    .map(|(_, label)| label.clone())
                    .unwrap_or_default()
            })
            .x_desc("Time")
            .y_desc("Amplitude")
            .label_style(("sans-serif", 12).into_font().color(&WHITE))
            .draw()?;
        let series = records.iter().enumerate().map(|(i, r)| (i as f64, r.ecg));
        chart.draw_series(LineSeries::new(series, &style.trace))?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, MonitorError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| MonitorError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
