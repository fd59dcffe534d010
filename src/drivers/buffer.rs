use std::collections::VecDeque;
/// Default number of points shown per live trace.
pub const WINDOW_LEN: usize = 500;
/// Fixed-length FIFO for one live trace. Starts filled with zeros and never
/// changes length: every push evicts the oldest value.
#[derive(Clone, Debug)]
pub struct ScrollBuffer {
    values: VecDeque<f64>,
}
impl ScrollBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            values: std::iter::repeat(0.0).take(len).collect(),
        }
    }
    pub fn push(&mut self, value: f64) {
        if self.values.is_empty() {
            return;
        }
        self.values.pop_front();
        self.values.push_back(value);
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    /// Oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
    /// Axis range for redraw. A flat trace gets padded so the axis keeps height.
    pub fn bounds(&self) -> (f64, f64) {
        let (min, max) = self
            .values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() || !max.is_finite() {
            return (-1.0, 1.0);
        }
        let span = max - min;
        if span < f64::EPSILON {
            (min - 0.5, max + 0.5)
        } else {
            (min - span * 0.05, max + span * 0.05)
        }
    }
    /// `[index, value]` pairs ready for `egui_plot::PlotPoints`.
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| [i as f64, *v])
            .collect()
    }
}
/// The two live traces shown by the monitor.
#[derive(Clone, Debug)]
pub struct ScrollWindow {
    pub ecg: ScrollBuffer,
    pub respiration: ScrollBuffer,
}
impl ScrollWindow {
    pub fn new(len: usize) -> Self {
        Self {
            ecg: ScrollBuffer::new(len),
            respiration: ScrollBuffer::new(len),
        }
    }
    pub fn push(&mut self, ecg: f64, respiration: f64) {
        self.ecg.push(ecg);
        self.respiration.push(respiration);
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn length_is_fixed_from_the_start() {
        let mut buf = ScrollBuffer::new(WINDOW_LEN);
        assert_eq!(buf.snapshot().len(), WINDOW_LEN);
        assert!(buf.snapshot().iter().all(|v| *v == 0.0));
        for i in 0..37 {
            buf.push(i as f64);
            assert_eq!(buf.snapshot().len(), WINDOW_LEN);
        }
    }
    #[test]
    fn keeps_the_latest_values_in_order() {
        let mut buf = ScrollBuffer::new(WINDOW_LEN);
        let k = 1234;
        for i in 1..=k {
            buf.push(i as f64);
        }
        let expected: Vec<f64> = ((k - WINDOW_LEN + 1)..=k).map(|i| i as f64).collect();
        assert_eq!(buf.snapshot(), expected);
    }
    #[test]
    fn partial_fill_keeps_leading_zeros() {
        let mut buf = ScrollBuffer::new(4);
        buf.push(7.0);
        buf.push(8.0);
        assert_eq!(buf.snapshot(), vec![0.0, 0.0, 7.0, 8.0]);
    }
    #[test]
    fn bounds_pad_flat_and_track_range() {
        let buf = ScrollBuffer::new(10);
        let (lo, hi) = buf.bounds();
        assert!(lo < 0.0 && hi > 0.0);
        let mut buf = ScrollBuffer::new(3);
        for v in [-2.0, 4.0, 1.0] {
            buf.push(v);
        }
        let (lo, hi) = buf.bounds();
        assert!(lo <= -2.0 && hi >= 4.0);
        assert!(lo > -3.0 && hi < 5.0);
    }
    #[test]
    fn window_pushes_both_channels() {
        let mut window = ScrollWindow::new(3);
        window.push(1.0, 10.0);
        assert_eq!(window.ecg.snapshot(), vec![0.0, 0.0, 1.0]);
        assert_eq!(window.respiration.snapshot(), vec![0.0, 0.0, 10.0]);
        assert_eq!(window.ecg.points()[2], [2.0, 1.0]);
    }
}
