//! Force plot - horizontal additive explanation of one prediction
//!
//! Positive contributions (red) push the output up from the left, negative
//! ones (blue) push it down from the right; both stacks meet at `f(x)`.
//! The bar spans `[f(x) - sum(pos), f(x) + sum(|neg|)]`, which always
//! contains the base value.

use super::canvas::{Canvas, Rgb, WHITE};
use super::font;
use super::RenderError;

const WIDTH: u32 = 900;
const HEIGHT: u32 = 200;
const MARGIN: i64 = 40;

const AXIS_Y: i64 = 84;
const BAR_TOP: i64 = 92;
const BAR_BOTTOM: i64 = 120;

const RED: Rgb = [255, 0, 81];
const BLUE: Rgb = [0, 139, 251];
const INK: Rgb = [40, 40, 40];
const GRAY: Rgb = [130, 130, 130];

const MAX_TICKS: usize = 20;

/// Input for one force plot, all values in margin space
#[derive(Debug, Clone)]
pub struct ForcePlot<'a> {
    pub base_value: f64,
    pub output_value: f64,
    pub contributions: &'a [f64],
    /// One label per contribution, e.g. `fc = 40`
    pub labels: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    feature: usize,
    start: f64,
    end: f64,
    positive: bool,
}

impl ForcePlot<'_> {
    /// Stack contributions outward from the output value, largest first.
    fn segments(&self) -> Vec<Segment> {
        let mut order: Vec<usize> = (0..self.contributions.len())
            .filter(|&i| self.contributions[i] != 0.0 && self.contributions[i].is_finite())
            .collect();
        order.sort_by(|&a, &b| {
            self.contributions[b]
                .abs()
                .partial_cmp(&self.contributions[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut segments = Vec::with_capacity(order.len());
        let mut pos_edge = self.output_value;
        let mut neg_edge = self.output_value;
        for i in order {
            let phi = self.contributions[i];
            if phi > 0.0 {
                segments.push(Segment { feature: i, start: pos_edge - phi, end: pos_edge, positive: true });
                pos_edge -= phi;
            } else {
                segments.push(Segment { feature: i, start: neg_edge, end: neg_edge - phi, positive: false });
                neg_edge -= phi;
            }
        }
        segments
    }

    /// Value range shown on the axis
    fn domain(&self, segments: &[Segment]) -> (f64, f64) {
        let mut lo = self.output_value.min(self.base_value);
        let mut hi = self.output_value.max(self.base_value);
        for s in segments {
            lo = lo.min(s.start);
            hi = hi.max(s.end);
        }
        let span = hi - lo;
        let pad = if span > 0.0 {
            span * 0.08
        } else {
            (self.output_value.abs() * 0.1).max(1.0)
        };
        (lo - pad, hi + pad)
    }

    pub fn render(&self) -> Canvas {
        let mut canvas = Canvas::new(WIDTH, HEIGHT, WHITE);
        let segments = self.segments();
        let (lo, hi) = self.domain(&segments);
        let right = canvas.width() as i64 - MARGIN;
        let plot_width = (right - MARGIN) as f64;
        let to_x = |v: f64| MARGIN + ((v - lo) / (hi - lo) * plot_width).round() as i64;

        // Legend
        canvas.fill_rect(MARGIN, 10, MARGIN + 10, 20, RED);
        canvas.draw_text(MARGIN + 16, 12, "higher", 1, INK);
        canvas.fill_rect(MARGIN + 70, 10, MARGIN + 80, 20, BLUE);
        canvas.draw_text(MARGIN + 86, 12, "lower", 1, INK);

        // Axis and ticks
        canvas.hline(MARGIN, right, AXIS_Y, GRAY);
        for tick in ticks(lo, hi) {
            let x = to_x(tick.value);
            canvas.vline(x, AXIS_Y - 4, AXIS_Y, GRAY);
            canvas.draw_text_centered(x, AXIS_Y - 14, &format_tick(tick.value, tick.step), 1, GRAY);
        }

        // Bars
        for s in &segments {
            let (x0, x1) = (to_x(s.start), to_x(s.end));
            let color = if s.positive { RED } else { BLUE };
            canvas.fill_rect(x0, BAR_TOP, x1.max(x0 + 1), BAR_BOTTOM, color);
            // Separator on the side facing away from f(x)
            let edge = if s.positive { x0 } else { x1 };
            canvas.vline(edge, BAR_TOP, BAR_BOTTOM - 1, WHITE);

            let label = &self.labels.get(s.feature).cloned().unwrap_or_default();
            let short = label.split(" = ").next().unwrap_or_default();
            let room = (x1 - x0 - 6).max(0) as u32;
            let text = if font::text_width(label, 1) <= room {
                Some(label.as_str())
            } else if font::text_width(short, 1) <= room {
                Some(short)
            } else {
                None
            };
            if let Some(text) = text {
                canvas.draw_text_centered((x0 + x1) / 2, BAR_BOTTOM + 6, text, 1, color);
            }
        }

        // Output value
        let out_x = to_x(self.output_value);
        canvas.vline(out_x, 30, BAR_BOTTOM, INK);
        canvas.draw_text_centered(out_x, 30, "f(x)", 2, INK);
        canvas.draw_text_centered(
            out_x,
            30 + Canvas::text_height(2) as i64 + 4,
            &format!("{:.2}", self.output_value),
            2,
            INK,
        );

        // Base value
        let base_x = to_x(self.base_value);
        let base_label_y = (canvas.height() as i64 - 16).min(BAR_BOTTOM + 44);
        canvas.vline(base_x, BAR_BOTTOM, base_label_y - 4, GRAY);
        canvas.draw_text_centered(
            base_x,
            base_label_y,
            &format!("base value {:.2}", self.base_value),
            1,
            GRAY,
        );

        canvas
    }

    pub fn render_png(&self) -> Result<Vec<u8>, RenderError> {
        self.render().encode_png()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tick {
    value: f64,
    step: f64,
}

/// Tick positions within `[lo, hi]`, at most `MAX_TICKS + 1` of them.
///
/// Positions are computed from an integer index so a step below the float
/// spacing at `lo` cannot stall the sequence.
fn ticks(lo: f64, hi: f64) -> Vec<Tick> {
    let step = nice_step(hi - lo, 6);
    let first = (lo / step).ceil() * step;
    let count = (hi - first) / step;
    if !(count >= 0.0) || !first.is_finite() {
        return Vec::new();
    }
    let last = (count.floor() as usize).min(MAX_TICKS);
    (0..=last)
        .map(|k| Tick { value: first + k as f64 * step, step })
        .collect()
}

/// Round tick spacing: 1, 2 or 5 times a power of ten.
fn nice_step(span: f64, target_ticks: u32) -> f64 {
    if !(span > 0.0) || !span.is_finite() {
        return 1.0;
    }
    let raw = span / target_ticks as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude - 1e-9;
    let nice = if residual <= 1.0 {
        1.0
    } else if residual <= 2.0 {
        2.0
    } else if residual <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step >= 1.0 { 0 } else { (-step.log10().floor()) as usize };
    // Avoid "-0"
    let value = if value.abs() < step * 1e-9 { 0.0 } else { value };
    format!("{:.*}", decimals, value)
}
