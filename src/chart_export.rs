//! Chart export to PNG (plotters bitmap) and EPS (minimal PostScript, no deps).
//!
//! Two charts exist: the cause ranking as bars and the monthly accident counts as a line.
//! Both are literal renderings of the aggregates in [`crate::summary`].

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::summary::{group_thousands, CauseCount, MonthlyCount, YearMonth};

/// Longest cause label drawn under a bar, in characters.
const MAX_LABEL_CHARS: usize = 18;

/// Export format for a chart: PNG or EPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartExportFormat {
    Png,
    Eps,
}

impl ChartExportFormat {
    /// Pick the format from the file extension; anything but `.eps` is PNG.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("eps") => Self::Eps,
            _ => Self::Png,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
}

/// Everything needed to draw one chart, independent of the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartExport {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// (x, y) points; for bars x is the bar position.
    pub points: Vec<(f64, f64)>,
    /// Tick labels for bar positions 0, 1, 2, ...; empty for a line chart.
    pub categories: Vec<String>,
    pub x_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl ChartExport {
    /// Bars for the `limit` most frequent causes (all when `None`).
    pub fn cause_ranking(counts: &[CauseCount], limit: Option<usize>) -> Self {
        let take = limit.unwrap_or(counts.len()).min(counts.len());
        let shown = &counts[..take];
        let points: Vec<(f64, f64)> = shown
            .iter()
            .enumerate()
            .map(|(i, c)| (i as f64, c.count as f64))
            .collect();
        Self {
            kind: ChartKind::Bar,
            title: "Accidents by cause".to_string(),
            x_label: "Cause".to_string(),
            y_label: "Accidents".to_string(),
            categories: shown.iter().map(|c| shorten(&c.cause)).collect(),
            x_min: -0.5,
            x_max: (take as f64 - 0.5).max(0.5),
            y_max: y_ceiling(&points),
            points,
        }
    }

    /// One point per month, x being [`YearMonth::ordinal`].
    pub fn monthly_series(monthly: &[MonthlyCount]) -> Self {
        let points: Vec<(f64, f64)> = monthly
            .iter()
            .map(|m| (m.month.ordinal() as f64, m.count as f64))
            .collect();
        let (x_min, x_max) = match (points.first(), points.last()) {
            (Some(first), Some(last)) if last.0 > first.0 => (first.0, last.0),
            (Some(only), _) => (only.0 - 1.0, only.0 + 1.0),
            _ => (0.0, 1.0),
        };
        Self {
            kind: ChartKind::Line,
            title: "Accidents per month".to_string(),
            x_label: "Month".to_string(),
            y_label: "Accidents".to_string(),
            categories: Vec::new(),
            x_min,
            x_max,
            y_max: y_ceiling(&points),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Tick label for an x value: the category for bars, `YYYY-MM` for months.
    pub fn x_tick_label(&self, v: f64) -> String {
        match self.kind {
            ChartKind::Bar => {
                let rounded = v.round();
                if (v - rounded).abs() > 0.01 || rounded < 0.0 {
                    return String::new();
                }
                self.categories
                    .get(rounded as usize)
                    .cloned()
                    .unwrap_or_default()
            }
            ChartKind::Line => YearMonth::from_ordinal(v.round() as i64).to_string(),
        }
    }

    /// Write to `path`, choosing PNG or EPS from its extension.
    pub fn write(&self, path: &Path, size: (u32, u32)) -> Result<()> {
        match ChartExportFormat::from_path(path) {
            ChartExportFormat::Png => write_chart_png(path, self, size),
            ChartExportFormat::Eps => write_chart_eps(path, self),
        }
    }
}

fn shorten(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_string();
    }
    let mut short: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
    short.push('…');
    short
}

fn y_ceiling(points: &[(f64, f64)]) -> f64 {
    let max = points.iter().map(|p| p.1).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        1.0
    } else {
        max * 1.1
    }
}

/// Escape a string for PostScript ( and ) and \.
fn ps_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Write chart to EPS (Encapsulated PostScript). No external dependencies.
pub fn write_chart_eps(path: &Path, chart: &ChartExport) -> Result<()> {
    if chart.is_empty() {
        return Err(eyre!("No data to export"));
    }

    const W: f64 = 480.0;
    const H: f64 = 320.0;
    const MARGIN_LEFT: f64 = 60.0;
    const MARGIN_BOTTOM: f64 = 50.0;
    const PLOT_W: f64 = W - MARGIN_LEFT - 30.0;
    const PLOT_H: f64 = H - MARGIN_BOTTOM - 40.0;

    let x_range = (chart.x_max - chart.x_min).max(f64::EPSILON);
    let to_x = |x: f64| MARGIN_LEFT + (x - chart.x_min) / x_range * PLOT_W;
    let to_y = |y: f64| MARGIN_BOTTOM + y / chart.y_max * PLOT_H;

    let mut f = File::create(path)?;
    writeln!(f, "%!PS-Adobe-3.0 EPSF-3.0")?;
    writeln!(f, "%%BoundingBox: 0 0 {} {}", W as i32, H as i32)?;
    writeln!(f, "%%Creator: acidentes")?;
    writeln!(f, "%%EndComments")?;
    writeln!(f, "gsave")?;

    writeln!(f, "/Helvetica findfont 12 scalefont setfont")?;
    writeln!(f, "{} {} moveto ({}) show", MARGIN_LEFT, H - 20.0, ps_escape(&chart.title))?;

    // Axes
    writeln!(f, "1 setlinewidth 0 setgray")?;
    writeln!(f, "{} {} moveto {} 0 rlineto stroke", MARGIN_LEFT, MARGIN_BOTTOM, PLOT_W)?;
    writeln!(f, "{} {} moveto 0 {} rlineto stroke", MARGIN_LEFT, MARGIN_BOTTOM, PLOT_H)?;

    writeln!(f, "/Helvetica findfont 8 scalefont setfont")?;
    writeln!(f, "{} {} moveto ({}) show", 4.0, to_y(chart.y_max), group_thousands(chart.y_max as usize))?;
    writeln!(f, "{} {} moveto (0) show", MARGIN_LEFT - 12.0, MARGIN_BOTTOM)?;

    match chart.kind {
        ChartKind::Bar => {
            writeln!(f, "0.13 0.73 0.89 setrgbcolor")?;
            let half = (PLOT_W / (chart.points.len() as f64 + 1.0) * 0.3).max(1.0);
            for &(x, y) in &chart.points {
                writeln!(
                    f,
                    "{} {} {} {} rectfill",
                    to_x(x) - half,
                    MARGIN_BOTTOM,
                    half * 2.0,
                    to_y(y) - MARGIN_BOTTOM
                )?;
            }
            writeln!(f, "0 setgray")?;
            for &(x, _) in &chart.points {
                writeln!(
                    f,
                    "gsave {} {} translate -60 rotate 0 0 moveto ({}) show grestore",
                    to_x(x),
                    MARGIN_BOTTOM - 6.0,
                    ps_escape(&chart.x_tick_label(x))
                )?;
            }
        }
        ChartKind::Line => {
            writeln!(f, "0.13 0.73 0.89 setrgbcolor 1.5 setlinewidth newpath")?;
            for (i, &(x, y)) in chart.points.iter().enumerate() {
                let op = if i == 0 { "moveto" } else { "lineto" };
                writeln!(f, "{} {} {}", to_x(x), to_y(y), op)?;
            }
            writeln!(f, "stroke 0 setgray")?;
            if let (Some(first), Some(last)) = (chart.points.first(), chart.points.last()) {
                writeln!(f, "{} {} moveto ({}) show", to_x(first.0), MARGIN_BOTTOM - 14.0, chart.x_tick_label(first.0))?;
                writeln!(f, "{} {} moveto ({}) show", to_x(last.0) - 30.0, MARGIN_BOTTOM - 14.0, chart.x_tick_label(last.0))?;
            }
        }
    }

    writeln!(f, "grestore")?;
    writeln!(f, "showpage")?;
    writeln!(f, "%%EOF")?;
    Ok(())
}

/// Write chart to PNG using plotters bitmap backend. Size is (width, height) in pixels.
pub fn write_chart_png(path: &Path, chart: &ChartExport, (width, height): (u32, u32)) -> Result<()> {
    use plotters::prelude::*;

    if chart.is_empty() {
        return Err(eyre!("No data to export"));
    }

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut binding = ChartBuilder::on(&root);
    let builder = binding
        .margin(30)
        .caption(chart.title.as_str(), ("sans-serif", 20));
    let mut plot = builder
        .x_label_area_size(if chart.kind == ChartKind::Bar { 120 } else { 40 })
        .y_label_area_size(60)
        .build_cartesian_2d(chart.x_min..chart.x_max, 0.0..chart.y_max)?;

    let x_formatter = |v: &f64| chart.x_tick_label(*v);
    let y_formatter = |v: &f64| group_thousands(v.max(0.0).round() as usize);
    let x_labels = match chart.kind {
        ChartKind::Bar => chart.points.len().max(1),
        ChartKind::Line => 12,
    };
    plot.configure_mesh()
        .x_desc(chart.x_label.as_str())
        .y_desc(chart.y_label.as_str())
        .x_labels(x_labels)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .draw()?;

    let color = RGBColor(0x21, 0xbb, 0xe2);
    match chart.kind {
        ChartKind::Bar => {
            plot.draw_series(chart.points.iter().map(|&(x, y)| {
                Rectangle::new([(x - 0.3, 0.0), (x + 0.3, y)], color.filled())
            }))?;
        }
        ChartKind::Line => {
            plot.draw_series(LineSeries::new(chart.points.iter().copied(), color))?;
            plot.draw_series(
                chart
                    .points
                    .iter()
                    .map(|&p| Circle::new(p, 2, color.filled())),
            )?;
        }
    }

    root.present()?;
    Ok(())
}
