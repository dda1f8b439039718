//! Pixel-level statistics of decoded frames.
//!
//! Hue uses the 0-180 scale and saturation/value the 0-255 scale, so the
//! thresholds below read the same as in common computer vision tooling.

use super::frame_source::RgbFrame;
use crate::video_store::ColorTag;

const SATURATION_THRESHOLD: u8 = 35;
const CANNY_LOW: i32 = 50;
const CANNY_HIGH: i32 = 150;
/// Share of saturated pixels below which a clothing region counts as achromatic.
const MIN_SATURATED_SHARE: f64 = 0.15;
const MIN_PERSON_WIDTH_PX: f64 = 30.0;
const MIN_PERSON_HEIGHT_PX: f64 = 50.0;

pub const UNKNOWN_COLOR: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    /// Per-channel mean, RGB order.
    pub mean_color: [f64; 3],
    /// Mean over every channel of every pixel.
    pub brightness: f64,
    /// Fraction of pixels on an edge.
    pub edge_density: f64,
    pub dominant_colors: Vec<ColorTag>,
}

impl FrameStats {
    /// Standard deviation of the channel means.
    pub fn color_spread(&self) -> f64 {
        std_dev(&self.mean_color)
    }
}

pub fn analyze_frame(frame: &RgbFrame) -> FrameStats {
    let mean_color = mean_color(frame);
    FrameStats {
        mean_color,
        brightness: mean_color.iter().sum::<f64>() / 3.0,
        edge_density: edge_density(frame),
        dominant_colors: dominant_colors(frame),
    }
}

pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;

    let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };
    let h = if diff == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / diff
    } else if max == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        ((h / 2.0).round() as u32 % 180) as u8,
        s.round() as u8,
        max as u8,
    ]
}

/// Color name of a saturated hue.
pub fn hue_color_name(hue: u8) -> &'static str {
    match hue {
        h if h < 10 || h >= 175 => "red",
        h if h < 20 => "orange",
        h if h < 35 => "yellow",
        h if h < 85 => "green",
        h if h < 115 => "cyan",
        h if h < 135 => "blue",
        h if h < 155 => "purple",
        _ => "pink",
    }
}

fn achromatic_name(value: f64) -> &'static str {
    if value > 200.0 {
        "white"
    } else if value < 50.0 {
        "black"
    } else {
        "gray"
    }
}

fn mean_color(frame: &RgbFrame) -> [f64; 3] {
    let count = frame.pixel_count();
    if count == 0 {
        return [0.0; 3];
    }
    let mut sums = [0u64; 3];
    for px in frame.data.chunks_exact(3) {
        sums[0] += px[0] as u64;
        sums[1] += px[1] as u64;
        sums[2] += px[2] as u64;
    }
    sums.map(|s| s as f64 / count as f64)
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn grayscale(frame: &RgbFrame) -> Vec<i32> {
    frame
        .data
        .chunks_exact(3)
        .map(|px| {
            (0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64).round() as i32
        })
        .collect()
}

/// Canny edge detection (Sobel 3x3, L1 magnitude, non-maximum suppression,
/// hysteresis between 50 and 150); returns the fraction of edge pixels.
pub fn edge_density(frame: &RgbFrame) -> f64 {
    let w = frame.width as usize;
    let h = frame.height as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }
    let gray = grayscale(frame);
    let at = |x: usize, y: usize| gray[y * w + x];

    let mut gx = vec![0i32; w * h];
    let mut gy = vec![0i32; w * h];
    let mut mag = vec![0i32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let dx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let dy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            let i = y * w + x;
            gx[i] = dx;
            gy[i] = dy;
            mag[i] = dx.abs() + dy.abs();
        }
    }

    // 0 = none, 1 = weak, 2 = strong
    let mut class = vec![0u8; w * h];
    let mut stack = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = mag[i];
            if m <= CANNY_LOW {
                continue;
            }
            let ax = gx[i].abs() as f64;
            let ay = gy[i].abs() as f64;
            let (n1, n2) = if ay <= ax * 0.414_213_56 {
                (i - 1, i + 1)
            } else if ay >= ax * 2.414_213_56 {
                (i - w, i + w)
            } else if (gx[i] > 0) == (gy[i] > 0) {
                (i - w - 1, i + w + 1)
            } else {
                (i - w + 1, i + w - 1)
            };
            if m > mag[n1] && m >= mag[n2] {
                if m > CANNY_HIGH {
                    class[i] = 2;
                    stack.push(i);
                } else {
                    class[i] = 1;
                }
            }
        }
    }

    while let Some(i) = stack.pop() {
        let (x, y) = (i % w, i / w);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let n = ny * w + nx;
                if class[n] == 1 {
                    class[n] = 2;
                    stack.push(n);
                }
            }
        }
    }

    let edges = class.iter().filter(|c| **c == 2).count();
    edges as f64 / (w * h) as f64
}

struct HsvRange {
    lower: [u8; 3],
    upper: [u8; 3],
}

impl HsvRange {
    const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

const COLOR_RANGES: &[(&str, &[HsvRange])] = &[
    ("red", &[HsvRange::new([0, 50, 50], [10, 255, 255])]),
    ("orange", &[HsvRange::new([10, 50, 50], [25, 255, 255])]),
    ("yellow", &[HsvRange::new([25, 50, 50], [40, 255, 255])]),
    ("green", &[HsvRange::new([40, 50, 50], [80, 255, 255])]),
    ("blue", &[HsvRange::new([80, 50, 50], [130, 255, 255])]),
    ("purple", &[HsvRange::new([130, 50, 50], [160, 255, 255])]),
    (
        "pink",
        &[
            HsvRange::new([160, 20, 100], [180, 255, 255]),
            HsvRange::new([0, 20, 100], [15, 255, 255]),
        ],
    ),
];

/// Named colors covering a noticeable share of the frame, largest first, at most 3.
pub fn dominant_colors(frame: &RgbFrame) -> Vec<ColorTag> {
    let total = frame.pixel_count();
    if total == 0 {
        return Vec::new();
    }

    let mut counts = [0usize; COLOR_RANGES.len()];
    let mut pink_rgb_sum = [0u64; 3];
    for px in frame.data.chunks_exact(3) {
        let rgb = [px[0], px[1], px[2]];
        let hsv = rgb_to_hsv(rgb);
        for (slot, (name, ranges)) in COLOR_RANGES.iter().enumerate() {
            if ranges.iter().any(|r| r.contains(hsv)) {
                counts[slot] += 1;
                if *name == "pink" {
                    for c in 0..3 {
                        pink_rgb_sum[c] += rgb[c] as u64;
                    }
                }
            }
        }
    }

    let mut colors: Vec<ColorTag> = COLOR_RANGES
        .iter()
        .zip(counts)
        .filter_map(|((name, _), count)| {
            let ratio = count as f64 / total as f64;
            let is_pink = *name == "pink";
            let threshold = if is_pink { 0.005 } else { 0.02 };
            if ratio <= threshold {
                return None;
            }
            let confidence = if is_pink {
                let mean = pink_rgb_sum.map(|s| s as f64 / count as f64);
                if mean[0] > mean[2] && mean[1] > mean[2] * 0.5 {
                    (ratio * 3.0).min(1.0)
                } else {
                    (ratio * 1.5).min(0.7)
                }
            } else {
                (ratio * 2.0).min(1.0)
            };
            Some(ColorTag {
                color: name.to_string(),
                ratio,
                confidence,
            })
        })
        .collect();

    colors.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
    colors.truncate(3);
    colors
}

/// Name of the most vivid color of a list of HSV pixels.
fn region_color_name(pixels: &[[u8; 3]]) -> &'static str {
    if pixels.is_empty() {
        return UNKNOWN_COLOR;
    }

    // (count, saturation sum) per hue name
    let mut buckets: Vec<(&'static str, usize, u64)> = Vec::new();
    let mut saturated = 0usize;
    for hsv in pixels.iter().filter(|p| p[1] >= SATURATION_THRESHOLD) {
        saturated += 1;
        let name = hue_color_name(hsv[0]);
        match buckets.iter_mut().find(|(n, _, _)| *n == name) {
            Some(bucket) => {
                bucket.1 += 1;
                bucket.2 += hsv[1] as u64;
            }
            None => buckets.push((name, 1, hsv[1] as u64)),
        }
    }

    if (saturated as f64) < pixels.len() as f64 * MIN_SATURATED_SHARE || saturated == 0 {
        let mean_v = pixels.iter().map(|p| p[2] as f64).sum::<f64>() / pixels.len() as f64;
        return achromatic_name(mean_v);
    }

    buckets
        .into_iter()
        .map(|(name, count, s_sum)| {
            let mean_s = s_sum as f64 / count as f64;
            (name, count as f64 * (mean_s / 255.0 + 0.1))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| name)
        .unwrap_or(UNKNOWN_COLOR)
}

fn region_pixels(frame: &RgbFrame, x0: u32, x1: u32, y0: u32, y1: u32) -> Vec<[u8; 3]> {
    let mut pixels = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
    for y in y0..y1 {
        for x in x0..x1 {
            pixels.push(rgb_to_hsv(frame.pixel(x, y)));
        }
    }
    pixels
}

/// Upper and lower clothing colors of a person given a normalized `[x1, y1, x2, y2]` box.
pub fn clothing_colors(frame: &RgbFrame, bbox: [f64; 4]) -> (String, String) {
    let unknown = || (UNKNOWN_COLOR.to_string(), UNKNOWN_COLOR.to_string());
    let fw = frame.width as f64;
    let fh = frame.height as f64;

    let left = (bbox[0].clamp(0.0, 1.0) * fw) as u32;
    let top = (bbox[1].clamp(0.0, 1.0) * fh) as u32;
    let right = ((bbox[2].clamp(0.0, 1.0) * fw) as u32).min(frame.width);
    let bottom = ((bbox[3].clamp(0.0, 1.0) * fh) as u32).min(frame.height);
    if right <= left || bottom <= top {
        return unknown();
    }

    let w = (right - left) as f64;
    let h = (bottom - top) as f64;
    if w < MIN_PERSON_WIDTH_PX || h < MIN_PERSON_HEIGHT_PX {
        return unknown();
    }

    let x_start = left + (w * 0.2) as u32;
    let x_end = left + (w * 0.8) as u32;
    let at = |share: f64| top + (h * share) as u32;

    let upper = region_pixels(frame, x_start, x_end, at(0.2), at(0.5));
    let lower = region_pixels(frame, x_start, x_end, at(0.5), at(0.85));
    (
        region_color_name(&upper).to_string(),
        region_color_name(&lower).to_string(),
    )
}
