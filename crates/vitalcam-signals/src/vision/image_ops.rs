//! Frame access and crop operations.
//!
//! - Mean RGB over a clipped rectangle
//! - Area-averaging resize of a crop into a small patch tensor (SSR input)

use ndarray::Array3;

/// RGB8 video frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw RGB8 pixel data (row-major)
    data: Vec<u8>,
    /// Width in pixels
    width: u32,
    /// Height in pixels
    height: u32,
    /// Timestamp in microseconds
    pub timestamp_us: i64,
}

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl CropRect {
    /// Square of half-side `half` around `(cx, cy)`, clipped to `width × height`.
    pub fn centered(cx: i64, cy: i64, half: i64, width: u32, height: u32) -> Self {
        let clip = |v: i64, max: u32| v.clamp(0, max as i64) as u32;
        Self {
            x0: clip(cx - half, width),
            y0: clip(cy - half, height),
            x1: clip(cx + half, width),
            y1: clip(cy + half, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl Frame {
    /// Wrap raw RGB8 data; `None` when the buffer size does not match.
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_us: i64) -> Option<Self> {
        if data.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            timestamp_us,
        })
    }

    /// Build a frame from a per-pixel colour function.
    pub fn from_fn<F>(width: u32, height: u32, timestamp_us: i64, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
            timestamp_us,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get pixel at (x, y) as [R, G, B]; black outside the frame
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Mean RGB over a rectangle, zeros when it is empty
    pub fn roi_mean_rgb(&self, rect: CropRect) -> [f32; 3] {
        if rect.is_empty() {
            return [0.0; 3];
        }
        let mut sum = [0.0f64; 3];
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                let px = self.get_pixel(x, y);
                sum[0] += px[0] as f64;
                sum[1] += px[1] as f64;
                sum[2] += px[2] as f64;
            }
        }
        let inv = 1.0 / (rect.width() as f64 * rect.height() as f64);
        [(sum[0] * inv) as f32, (sum[1] * inv) as f32, (sum[2] * inv) as f32]
    }

    /// Resize a crop to `size × size × 3` by area averaging.
    ///
    /// Each output pixel is the coverage-weighted mean of the source pixels
    /// its footprint overlaps. An empty crop gives an all-zero patch.
    pub fn crop_resize_area(&self, rect: CropRect, size: usize) -> Array3<f32> {
        let mut patch = Array3::zeros((size, size, 3));
        if rect.is_empty() || size == 0 {
            return patch;
        }
        let rows = area_weights(rect.height() as usize, size);
        let cols = area_weights(rect.width() as usize, size);

        for (oy, row_w) in rows.iter().enumerate() {
            for (ox, col_w) in cols.iter().enumerate() {
                let mut acc = [0.0f64; 3];
                let mut total = 0.0f64;
                for &(sy, wy) in row_w {
                    for &(sx, wx) in col_w {
                        let w = wy * wx;
                        let px = self.get_pixel(rect.x0 + sx as u32, rect.y0 + sy as u32);
                        for c in 0..3 {
                            acc[c] += w * px[c] as f64;
                        }
                        total += w;
                    }
                }
                for c in 0..3 {
                    patch[[oy, ox, c]] = (acc[c] / total) as f32;
                }
            }
        }
        patch
    }
}

/// For each of `dst` output cells, the source cells it overlaps and the
/// overlap length when `src` cells are stretched onto `dst`.
fn area_weights(src: usize, dst: usize) -> Vec<Vec<(usize, f64)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|o| {
            let start = o as f64 * scale;
            let end = start + scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src);
            (first..last)
                .filter_map(|s| {
                    let overlap = end.min(s as f64 + 1.0) - start.max(s as f64);
                    (overlap > 1e-12).then_some((s, overlap))
                })
                .collect()
        })
        .collect()
}
