// Raster rendering of speedup charts into PNG files.

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};

use crate::chart::font::{GLYPH_HEIGHT, GLYPH_SPACING, GLYPH_WIDTH, glyph, text_width};
use crate::chart::{Chart, ChartBackend};
use crate::{Error, Result};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

// Plot area, in pixels from the image origin (top left).
const PLOT_LEFT: i64 = 90;
const PLOT_RIGHT: i64 = 770;
const PLOT_TOP: i64 = 70;
const PLOT_BOTTOM: i64 = 510;

// Horizontal padding between the y axis and the first category (and the last category and the
// right edge).
const CATEGORY_PADDING: i64 = 40;

const TITLE_SCALE: u32 = 3;
const LABEL_SCALE: u32 = 2;
const MARKER_RADIUS: i64 = 4;

// Speedups above this are drawn at the top of the axis. Keeps the axis bounds finite.
const MAX_AXIS_VALUE: f64 = 1e12;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);

// Line colours, cycled when there are more series than colours.
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
];

/// Renders charts as 800x600 PNG images.
///
/// Thread counts are drawn as evenly spaced categories, speedups on a linear axis starting at
/// zero with two-decimal tick labels. Undefined speedups leave a gap in their line.
#[derive(Clone, Copy, Debug, Default)]
pub struct PngChartBackend;

impl ChartBackend for PngChartBackend {
    fn render(&self, chart: &Chart, path: &Path) -> Result<()> {
        draw(chart)
            .save_with_format(path, ImageFormat::Png)
            .map_err(|source| Error::RenderChart {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Vertical axis layout: the upper bound and the distance between grid lines.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ValueAxis {
    max: f64,
    step: f64,
}

impl ValueAxis {
    const TARGET_STEPS: f64 = 5.0;

    /// Chooses a "nice" step (1, 2 or 5 times a power of ten) so that roughly five grid lines
    /// cover every value. The axis always reaches at least 1.0, the no-speedup line.
    fn covering(values: impl Iterator<Item = f64>) -> Self {
        let highest = values
            .filter(|v| v.is_finite())
            .fold(1.0_f64, f64::max)
            .min(MAX_AXIS_VALUE);

        let raw_step = highest / Self::TARGET_STEPS;
        let magnitude = 10.0_f64.powf(raw_step.log10().floor());
        let step = [1.0, 2.0, 5.0, 10.0]
            .into_iter()
            .map(|factor| factor * magnitude)
            .find(|&step| step >= raw_step)
            .unwrap_or(10.0 * magnitude);

        Self {
            max: (highest / step).ceil() * step,
            step,
        }
    }

    fn ticks(self) -> impl Iterator<Item = f64> {
        // Tolerate accumulated rounding when reaching the top tick.
        let count = (self.max / self.step).round();

        (0_u32..)
            .map(f64::from)
            .take_while(move |&i| i <= count)
            .map(move |i| i * self.step)
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "plot coordinates are small enough to be exact in f64"
    )]
    fn y(self, value: f64) -> i64 {
        let fraction = (value / self.max).clamp(0.0, 1.0);
        let (top, bottom) = (PLOT_TOP as f64, PLOT_BOTTOM as f64);
        to_pixel(bottom - fraction * (bottom - top))
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "category counts and plot coordinates are small enough to be exact in f64"
)]
fn category_x(index: usize, count: usize) -> i64 {
    let left = PLOT_LEFT.saturating_add(CATEGORY_PADDING) as f64;
    let right = PLOT_RIGHT.saturating_sub(CATEGORY_PADDING) as f64;

    if count <= 1 {
        return to_pixel(f64::midpoint(left, right));
    }

    let fraction = index as f64 / count.saturating_sub(1) as f64;
    to_pixel(left + fraction * (right - left))
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "chart coordinates are clamped to the image bounds before conversion"
)]
fn to_pixel(value: f64) -> i64 {
    value.round().clamp(-1.0, f64::from(WIDTH.max(HEIGHT))) as i64
}

#[expect(
    clippy::arithmetic_side_effects,
    reason = "layout offsets are small constants added to coordinates inside the image"
)]
#[expect(clippy::integer_division, reason = "centring may be off by half a pixel")]
fn draw(chart: &Chart) -> RgbImage {
    let mut canvas = Canvas::new(WIDTH, HEIGHT);

    let axis = ValueAxis::covering(
        chart
            .series()
            .iter()
            .flat_map(|series| series.points().iter().flatten().copied()),
    );
    let categories = chart.thread_counts().len();

    // Title, centred above the plot area.
    let title = chart.title();
    let title_x = (i64::from(WIDTH) - i64::from(text_width(&title, TITLE_SCALE))) / 2;
    canvas.text(title_x, 20, &title, TITLE_SCALE, BLACK);

    // Horizontal grid lines with their values.
    for tick in axis.ticks() {
        let y = axis.y(tick);
        canvas.line(PLOT_LEFT, y, PLOT_RIGHT, y, GRID);

        let label = format!("{tick:.2}");
        let label_x = PLOT_LEFT - 8 - i64::from(text_width(&label, LABEL_SCALE));
        canvas.text(label_x, y - 5, &label, LABEL_SCALE, BLACK);
    }

    // Axes.
    canvas.line(PLOT_LEFT, PLOT_TOP, PLOT_LEFT, PLOT_BOTTOM, BLACK);
    canvas.line(PLOT_LEFT, PLOT_BOTTOM, PLOT_RIGHT, PLOT_BOTTOM, BLACK);

    // Category ticks with their thread counts.
    for (index, threads) in chart.thread_counts().iter().enumerate() {
        let x = category_x(index, categories);
        canvas.line(x, PLOT_BOTTOM, x, PLOT_BOTTOM + 6, BLACK);

        let label = threads.to_string();
        let label_x = x - i64::from(text_width(&label, LABEL_SCALE)) / 2;
        canvas.text(label_x, PLOT_BOTTOM + 12, &label, LABEL_SCALE, BLACK);
    }

    let x_label = "Number of threads";
    let x_label_x = (PLOT_LEFT + PLOT_RIGHT - i64::from(text_width(x_label, LABEL_SCALE))) / 2;
    canvas.text(x_label_x, PLOT_BOTTOM + 40, x_label, LABEL_SCALE, BLACK);
    canvas.text(PLOT_LEFT - 40, PLOT_TOP - 20, "Speedup", LABEL_SCALE, BLACK);

    // Series lines and markers.
    for (series, &color) in chart.series().iter().zip(PALETTE.iter().cycle()) {
        let points: Vec<Option<(i64, i64)>> = series
            .points()
            .iter()
            .enumerate()
            .map(|(index, point)| point.map(|value| (category_x(index, categories), axis.y(value))))
            .collect();

        for pair in points.windows(2) {
            if let [Some((x1, y1)), Some((x2, y2))] = *pair {
                canvas.thick_line(x1, y1, x2, y2, color);
            }
        }

        for &(x, y) in points.iter().flatten() {
            canvas.disc(x, y, MARKER_RADIUS, color);
        }
    }

    // Legend in the top left corner of the plot area.
    let legend_x = PLOT_LEFT + 15;
    let mut legend_y = PLOT_TOP + 10;
    for (series, &color) in chart.series().iter().zip(PALETTE.iter().cycle()) {
        canvas.thick_line(legend_x, legend_y + 5, legend_x + 24, legend_y + 5, color);
        canvas.disc(legend_x + 12, legend_y + 5, MARKER_RADIUS, color);
        canvas.text(legend_x + 32, legend_y, series.label(), LABEL_SCALE, BLACK);
        legend_y += 18;
    }

    canvas.into_image()
}

/// A white image with bounds-checked drawing primitives.
struct Canvas {
    image: RgbImage,
}

#[expect(
    clippy::arithmetic_side_effects,
    reason = "coordinates stay within a few thousand pixels of the image bounds"
)]
impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, WHITE),
        }
    }

    fn into_image(self) -> RgbImage {
        self.image
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };

        if x < self.image.width() && y < self.image.height() {
            self.image.put_pixel(x, y, color);
        }
    }

    fn fill_rect(&mut self, x: i64, y: i64, width: i64, height: i64, color: Rgb<u8>) {
        for dy in 0..height {
            for dx in 0..width {
                self.put(x + dx, y + dy, color);
            }
        }
    }

    /// One pixel wide line between two points, inclusive (Bresenham).
    fn line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };

        let (mut x, mut y) = (x1, y1);
        let mut error = dx + dy;

        loop {
            self.put(x, y, color);

            if x == x2 && y == y2 {
                break;
            }

            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += sx;
            }
            if doubled <= dx {
                error += dx;
                y += sy;
            }
        }
    }

    fn thick_line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
        for offset in [-1, 0, 1] {
            self.line(x1, y1 + offset, x2, y2 + offset, color);
            self.line(x1 + offset, y1, x2 + offset, y2, color);
        }
    }

    fn disc(&mut self, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn text(&mut self, x: i64, y: i64, text: &str, scale: u32, color: Rgb<u8>) {
        let scale = i64::from(scale);
        let advance = i64::from(GLYPH_WIDTH + GLYPH_SPACING) * scale;
        let mut glyph_x = x;

        for c in text.chars() {
            for (row, bits) in (0..i64::from(GLYPH_HEIGHT)).zip(glyph(c)) {
                for column in 0..i64::from(GLYPH_WIDTH) {
                    let mask = 0b100_u8 >> column;
                    if bits & mask != 0 {
                        self.fill_rect(
                            glyph_x + column * scale,
                            y + row * scale,
                            scale,
                            scale,
                            color,
                        );
                    }
                }
            }

            glyph_x += advance;
        }
    }
}
