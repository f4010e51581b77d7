// src/renderer.rs

use crate::error::{CensusError, Result};
use crate::model::{Tier, TierGroups};
use crate::subtypes::SubtypeBreakdown;
use image::{Rgb, RgbImage};
use indicatif::{ParallelProgressIterator, ProgressBar};
use palette::{FromColor, Lch, LinSrgb, Srgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const HISTOGRAM_BINS: usize = 20;
pub const HISTOGRAM_RANGE: (f64, f64) = (0.0, 25_000_000.0);
pub const HISTOGRAM_PREFIX: &str = "code_size_histogram";

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 48]);
const GRID: Rgb<u8> = Rgb([225, 225, 232]);
const MEDIAN: Rgb<u8> = Rgb([20, 20, 24]);
const MEAN: Rgb<u8> = Rgb([214, 39, 40]);
const SERIES: Rgb<u8> = Rgb([0x45, 0xB7, 0xD1]);

/// `bins + 1` evenly spaced edges from `lo` to `hi`
pub fn bin_edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    (0..=bins)
        .map(|i| lo + (hi - lo) * i as f64 / bins as f64)
        .collect()
}

/// Counts per bin. Bins are half-open except the last, which also takes its
/// right edge. Values outside the edges are not counted.
pub fn histogram_bins(values: &[f64], edges: &[f64]) -> Vec<usize> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let bins = edges.len() - 1;
    let mut counts = vec![0; bins];
    let (first, last) = (edges[0], edges[bins]);

    for &v in values {
        if !v.is_finite() || v < first || v > last {
            continue;
        }
        let idx = (edges.partition_point(|e| *e <= v) - 1).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}

/// Five-number summary with Tukey whiskers
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value within `q1 - 1.5 IQR`
    pub whisker_low: f64,
    /// Largest value within `q3 + 1.5 IQR`
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
    pub mean: f64,
}

impl BoxStats {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = percentile(&sorted, 0.25);
        let median = percentile(&sorted, 0.5);
        let q3 = percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let inside = sorted.iter().copied().filter(|v| *v >= lo_fence && *v <= hi_fence);
        let whisker_low = inside.clone().next().unwrap_or(q1);
        let whisker_high = inside.last().unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < lo_fence || *v > hi_fence)
            .collect();
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;

        Some(Self {
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            outliers,
            mean,
        })
    }

    fn low(&self) -> f64 {
        self.outliers.iter().copied().fold(self.whisker_low, f64::min)
    }

    fn high(&self) -> f64 {
        self.outliers.iter().copied().fold(self.whisker_high, f64::max)
    }
}

/// Linear interpolation between closest ranks
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// One labelled box in a boxplot
pub struct BoxSeries<'a> {
    pub label: &'a str,
    pub values: &'a [f64],
    pub color: Rgb<u8>,
}

pub fn tier_color(tier: Tier) -> Rgb<u8> {
    match tier {
        Tier::Lesser => Rgb([0xFF, 0x6B, 0x6B]),
        Tier::Medium => Rgb([0x4E, 0xCD, 0xC4]),
        Tier::High => Rgb([0x45, 0xB7, 0xD1]),
    }
}

/// `<metric>_boxplot_<local timestamp>.png`
pub fn timestamped_boxplot_name(metric: &str) -> String {
    format!(
        "{}_boxplot_{}.png",
        metric,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Writes PNG charts. Plots carry no text; labels and percentages belong in
/// the accompanying text report.
pub struct ChartRenderer {
    width: u32,
    height: u32,
    progress: ProgressBar,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(1200, 800)
    }
}

impl ChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(64),
            height: height.max(64),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Bars over `edges` with a log-scaled count axis.
    pub fn histogram(&self, values: &[f64], edges: &[f64], color: Rgb<u8>, path: &Path) -> Result<()> {
        let counts = histogram_bins(values, edges);
        let mut canvas = Canvas::new(self.width, self.height);
        let max_count = counts.iter().copied().max().unwrap_or(0);
        let log_max = (1.0 + max_count as f64).ln().max(f64::EPSILON);

        // one gridline per decade
        let mut decade = 1usize;
        while decade <= max_count {
            canvas.hline_at((1.0 + decade as f64).ln() / log_max, GRID);
            decade *= 10;
        }

        let fill = shade(color, 0.0);
        let edge = shade(color, -0.35);
        let slot = canvas.plot_width() as f64 / counts.len().max(1) as f64;
        for (i, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let frac = (1.0 + count as f64).ln() / log_max;
            let x0 = canvas.left + (i as f64 * slot) as u32;
            let x1 = canvas.left + ((i + 1) as f64 * slot) as u32;
            let top = canvas.y_of(frac);
            canvas.fill_rect(x0, top, x1, canvas.bottom, fill);
            canvas.outline_rect(x0, top, x1, canvas.bottom, edge);
        }
        canvas.axes();

        debug!("Histogram {:?} -> {}", counts, path.display());
        canvas.save(path)
    }

    /// One histogram per tier, rendered in parallel. Returns the written paths
    /// in tier order.
    pub fn tier_histograms(&self, groups: &TierGroups, out_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(out_dir).map_err(|e| CensusError::io(out_dir, e))?;
        let edges = bin_edges(HISTOGRAM_RANGE.0, HISTOGRAM_RANGE.1, HISTOGRAM_BINS);
        let series = groups.as_series();

        self.progress.set_length(series.len() as u64);
        self.progress.set_message("Rendering histograms");

        let paths = series
            .par_iter()
            .progress_with(self.progress.clone())
            .map(|(tier, values)| {
                let path = out_dir.join(format!("{}_{}.png", prefix, tier.name()));
                self.histogram(values, &edges, tier_color(*tier), &path)?;
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()?;

        self.progress.finish_with_message("Histograms complete");
        info!("Wrote {} histograms to {}", paths.len(), out_dir.display());
        Ok(paths)
    }

    /// Side-by-side boxes on a shared linear axis. Empty series leave a gap.
    pub fn boxplot(&self, series: &[BoxSeries<'_>], path: &Path) -> Result<()> {
        let boxes: Vec<Option<BoxStats>> = series.iter().map(|s| BoxStats::of(s.values)).collect();
        let mut canvas = Canvas::new(self.width, self.height);

        let (lo, hi) = boxes
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
                (lo.min(b.low()), hi.max(b.high()))
            });
        if lo.is_finite() {
            let pad = ((hi - lo) * 0.05).max(0.5);
            let (lo, hi) = (lo - pad, hi + pad);
            let frac = |v: f64| (v - lo) / (hi - lo);

            for step in 1..10 {
                canvas.hline_at(step as f64 / 10.0, GRID);
            }

            let slot = canvas.plot_width() as f64 / series.len() as f64;
            for (i, (s, stats)) in series.iter().zip(&boxes).enumerate() {
                let Some(b) = stats else { continue };
                let center = canvas.left as f64 + slot * (i as f64 + 0.5);
                let half = (slot * 0.25) as u32;
                let (x0, x1) = (center as u32 - half, center as u32 + half);
                let cx = center as u32;

                let (y_q1, y_q3) = (canvas.y_of(frac(b.q1)), canvas.y_of(frac(b.q3)));
                let (y_lo, y_hi) = (canvas.y_of(frac(b.whisker_low)), canvas.y_of(frac(b.whisker_high)));

                canvas.vline(cx, y_hi, y_q3, AXIS);
                canvas.vline(cx, y_q1, y_lo, AXIS);
                canvas.hline(cx - half / 2, cx + half / 2, y_hi, AXIS);
                canvas.hline(cx - half / 2, cx + half / 2, y_lo, AXIS);

                canvas.fill_rect(x0, y_q3, x1, y_q1, shade(s.color, 0.35));
                canvas.outline_rect(x0, y_q3, x1, y_q1, shade(s.color, -0.35));
                let y_med = canvas.y_of(frac(b.median));
                canvas.fill_rect(x0, y_med.saturating_sub(1), x1, y_med + 1, MEDIAN);

                for &o in &b.outliers {
                    canvas.marker(cx, canvas.y_of(frac(o)), 3, s.color);
                }
                canvas.marker(cx, canvas.y_of(frac(b.mean)), 4, MEAN);
            }
        }
        canvas.axes();

        let labels: Vec<&str> = series.iter().map(|s| s.label).collect();
        debug!("Boxplot of {:?} -> {}", labels, path.display());
        canvas.save(path)
    }

    /// Compares the tiers of one metric.
    pub fn tier_boxplot(&self, groups: &TierGroups, path: &Path) -> Result<()> {
        let series = groups.as_series();
        let boxes: Vec<BoxSeries<'_>> = series
            .iter()
            .map(|(tier, values)| BoxSeries {
                label: tier.label(),
                values,
                color: tier_color(*tier),
            })
            .collect();
        self.boxplot(&boxes, path)?;
        info!("Wrote tier boxplot to {}", path.display());
        Ok(())
    }

    /// A single box, e.g. for a column of edit distances.
    pub fn series_boxplot(&self, label: &str, values: &[f64], path: &Path) -> Result<()> {
        self.boxplot(
            &[BoxSeries {
                label,
                values,
                color: SERIES,
            }],
            path,
        )?;
        info!("Wrote {} boxplot to {}", label, path.display());
        Ok(())
    }

    /// One row per sub-type, one bar per group within the row.
    pub fn subtype_bars(&self, breakdown: &SubtypeBreakdown, path: &Path) -> Result<()> {
        let groups = breakdown.groups();
        let subtypes = breakdown.subtypes();
        let colors = group_colors(groups.len());
        let mut canvas = Canvas::new(self.width, self.height);

        let max_count = subtypes
            .iter()
            .flat_map(|s| groups.iter().map(move |g| breakdown.count(g, s)))
            .max()
            .unwrap_or(0);

        if max_count > 0 {
            for step in 1..10 {
                let x = canvas.left + canvas.plot_width() * step / 10;
                canvas.vline(x, canvas.top, canvas.bottom, GRID);
            }

            let row_height = canvas.plot_height() as f64 / subtypes.len() as f64;
            let bar_height = row_height * 0.8 / groups.len() as f64;
            for (row, subtype) in subtypes.iter().enumerate() {
                let row_top = canvas.top as f64 + row as f64 * row_height + row_height * 0.1;
                for (g, group) in groups.iter().enumerate() {
                    let count = breakdown.count(group, subtype);
                    if count == 0 {
                        continue;
                    }
                    let y0 = (row_top + g as f64 * bar_height) as u32;
                    let y1 = (row_top + (g + 1) as f64 * bar_height) as u32;
                    let len = canvas.plot_width() as f64 * count as f64 / max_count as f64;
                    let x1 = canvas.left + len as u32;
                    canvas.fill_rect(canvas.left, y0, x1, y1, colors[g]);
                    canvas.outline_rect(canvas.left, y0, x1, y1, shade(colors[g], -0.35));
                }
            }
        }
        canvas.axes();

        info!(
            "Wrote sub-type chart ({} groups, {} sub-types) to {}",
            groups.len(),
            subtypes.len(),
            path.display()
        );
        canvas.save(path)
    }
}

/// Mixes `color` toward white (`amount > 0`) or black (`amount < 0`) in
/// linear light.
fn shade(color: Rgb<u8>, amount: f32) -> Rgb<u8> {
    let [r, g, b] = color.0;
    let c: LinSrgb<f32> = Srgb::new(r, g, b).into_format::<f32>().into_linear();
    let target = if amount >= 0.0 { 1.0f32 } else { 0.0f32 };
    let t = amount.abs().min(1.0);

    let mixed = LinSrgb::new(
        c.red * (1.0 - t) + target * t,
        c.green * (1.0 - t) + target * t,
        c.blue * (1.0 - t) + target * t,
    );
    to_rgb8(Srgb::from_linear(mixed))
}

fn group_colors(count: usize) -> Vec<Rgb<u8>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let hue = rng.gen_range(0.0f32..360.0f32);
            to_rgb8(Srgb::from_color(Lch::new(65.0f32, 70.0f32, hue)))
        })
        .collect()
}

/// Rounds to the nearest 8-bit channel value, clamping out-of-gamut channels
fn to_rgb8(srgb: Srgb<f32>) -> Rgb<u8> {
    let (r, g, b) = srgb.into_components();
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([channel(r), channel(g), channel(b)])
}

/// An image with a fixed plot area inside margins
struct Canvas {
    image: RgbImage,
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        let image = RgbImage::from_pixel(width, height, BACKGROUND);
        Self {
            image,
            left: width / 12,
            right: width - width / 24,
            top: height / 16,
            bottom: height - height / 10,
        }
    }

    fn plot_width(&self) -> u32 {
        self.right - self.left
    }

    fn plot_height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Pixel row for a fraction of the plot height, 0 at the bottom
    fn y_of(&self, frac: f64) -> u32 {
        let frac = frac.clamp(0.0, 1.0);
        self.bottom - (frac * self.plot_height() as f64).round() as u32
    }

    fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        let (x0, x1) = (x0.min(x1), x0.max(x1).min(self.image.width() - 1));
        let (y0, y1) = (y0.min(y1), y0.max(y1).min(self.image.height() - 1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.image.put_pixel(x, y, color);
            }
        }
    }

    fn outline_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        self.hline(x0, x1, y0, color);
        self.hline(x0, x1, y1, color);
        self.vline(x0, y0, y1, color);
        self.vline(x1, y0, y1, color);
    }

    fn hline(&mut self, x0: u32, x1: u32, y: u32, color: Rgb<u8>) {
        self.fill_rect(x0, y, x1, y, color);
    }

    fn vline(&mut self, x: u32, y0: u32, y1: u32, color: Rgb<u8>) {
        self.fill_rect(x, y0, x, y1, color);
    }

    fn hline_at(&mut self, frac: f64, color: Rgb<u8>) {
        let y = self.y_of(frac);
        self.hline(self.left, self.right, y, color);
    }

    fn marker(&mut self, x: u32, y: u32, radius: u32, color: Rgb<u8>) {
        self.fill_rect(
            x.saturating_sub(radius),
            y.saturating_sub(radius),
            x + radius,
            y + radius,
            color,
        );
    }

    fn axes(&mut self) {
        self.hline(self.left, self.right, self.bottom, AXIS);
        self.vline(self.left, self.top, self.bottom, AXIS);
    }

    fn save(self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CensusError::io(parent, e))?;
        }
        self.image.save(path).map_err(|e| CensusError::Render {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_edges_span_range() {
        let edges = bin_edges(HISTOGRAM_RANGE.0, HISTOGRAM_RANGE.1, HISTOGRAM_BINS);
        assert_eq!(edges.len(), 21);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[1], 1_250_000.0);
        assert_eq!(edges[20], 25_000_000.0);
    }

    #[test]
    fn test_histogram_last_bin_closed() {
        let counts = histogram_bins(&[0.0, 5.0, 10.0, 20.0, 25.0, -1.0, f64::NAN], &[0.0, 10.0, 20.0]);
        assert_eq!(counts, vec![2, 2]);
    }

    #[test]
    fn test_histogram_degenerate_edges() {
        assert!(histogram_bins(&[1.0], &[0.0]).is_empty());
    }

    #[test]
    fn test_box_stats_with_outlier() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
        let b = BoxStats::of(&values).unwrap();
        assert!((b.q1 - 3.25).abs() < 1e-12);
        assert!((b.median - 5.5).abs() < 1e-12);
        assert!((b.q3 - 7.75).abs() < 1e-12);
        assert_eq!(b.whisker_low, 1.0);
        assert_eq!(b.whisker_high, 9.0);
        assert_eq!(b.outliers, vec![100.0]);
        assert!((b.mean - 14.5).abs() < 1e-12);
    }

    #[test]
    fn test_box_stats_single_value() {
        let b = BoxStats::of(&[7.0]).unwrap();
        assert_eq!((b.q1, b.median, b.q3), (7.0, 7.0, 7.0));
        assert!(b.outliers.is_empty());
        assert!(BoxStats::of(&[]).is_none());
    }

    #[test]
    fn test_shade_extremes() {
        let c = Rgb([100, 150, 200]);
        assert_eq!(shade(c, 1.0), Rgb([255, 255, 255]));
        assert_eq!(shade(c, -1.0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_to_rgb8_rounds_and_clamps() {
        assert_eq!(to_rgb8(Srgb::new(0.999, 0.5, 0.002)), Rgb([255, 128, 1]));
        assert_eq!(to_rgb8(Srgb::new(1.2, -0.1, 0.0)), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_shade_zero_keeps_colour() {
        let c = Rgb([0x4E, 0xCD, 0xC4]);
        assert_eq!(shade(c, 0.0), c);
    }

    #[test]
    fn test_group_colors_deterministic() {
        assert_eq!(group_colors(4), group_colors(4));
        assert_eq!(group_colors(3).len(), 3);
    }

    #[test]
    fn test_tier_histograms_written() {
        let dir = tempfile::tempdir().unwrap();
        let groups = TierGroups {
            lesser: vec![10, 2_000_000],
            medium: vec![],
            high: vec![24_999_999, 30_000_000],
            other: 0,
            coerced: 0,
        };
        let paths = ChartRenderer::new(320, 240)
            .tier_histograms(&groups, dir.path(), HISTOGRAM_PREFIX)
            .unwrap();

        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "code_size_histogram_lesser.png",
                "code_size_histogram_medium.png",
                "code_size_histogram_high.png"
            ]
        );
        let img = image::open(&paths[0]).unwrap();
        assert_eq!((img.width(), img.height()), (320, 240));
    }

    #[test]
    fn test_boxplot_and_bars_written() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(200, 150);

        let groups = TierGroups {
            lesser: vec![1, 2, 3, 50],
            medium: vec![4, 4, 4],
            high: vec![],
            other: 2,
            coerced: 0,
        };
        let box_path = dir.path().join("nested/bugfix.png");
        renderer.tier_boxplot(&groups, &box_path).unwrap();
        assert!(box_path.is_file());

        let rows = vec![
            crate::table::Row::from_pairs([("group", "1"), ("matcha_subtype", "a")]),
            crate::table::Row::from_pairs([("group", "2"), ("matcha_subtype", "b")]),
        ];
        let breakdown = SubtypeBreakdown::from_rows(&rows, "group", "matcha_subtype");
        let bar_path = dir.path().join("subtypes.png");
        renderer.subtype_bars(&breakdown, &bar_path).unwrap();
        assert!(bar_path.is_file());
    }

    #[test]
    fn test_timestamped_name_shape() {
        let name = timestamped_boxplot_name("bugfix");
        assert!(name.starts_with("bugfix_boxplot_"));
        assert!(name.ends_with(".png"));
    }
}
