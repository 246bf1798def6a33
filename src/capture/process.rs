//! Pure image post-processing shared by snapshot capture and live preview.
//!
//! Every produced preview goes through the same fixed sequence: optional
//! dark-edge trim (live frames only), chrome trim, aspect fit-crop, and
//! composite onto an opaque canvas of the exact output size.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

const CHROME_DIVISOR: u32 = 60;
const CHROME_MIN: u32 = 6;
const CHROME_MAX: u32 = 14;

const DARK_SUM: u32 = 24;
const DARK_STRIDE: usize = 8;
const DARK_MIN_REMAINDER: u32 = 16;

/// Output of the post-processor for one card.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardCanvas {
    pub width: u32,
    pub height: u32,
    /// Gray level (0..=1) showing through transparent source pixels.
    pub shade: f32,
    pub trim_dark_edges: bool,
}

impl CardCanvas {
    pub fn ratio(&self) -> f64 { f64::from(self.width.max(1)) / f64::from(self.height.max(1)) }
}

/// Removes the platform border strip along the right edge: `width / 60`
/// pixels, clamped to `6..=14`.
pub fn trim_chrome(image: RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let strip = (width / CHROME_DIVISOR).clamp(CHROME_MIN, CHROME_MAX);
    if width <= strip || height == 0 {
        return image;
    }
    imageops::crop_imm(&image, 0, 0, width - strip, height).to_image()
}

/// Strips near-black letterboxing that streams deliver around a window,
/// up to a quarter of each dimension per side.
pub fn trim_dark_edges(image: RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width <= 8 || height <= 8 {
        return image;
    }
    let limit_x = (width / 4).max(1);
    let limit_y = (height / 4).max(1);

    let dark = |x: u32, y: u32| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        u32::from(r) + u32::from(g) + u32::from(b) < DARK_SUM
    };
    let column_dark = |x: u32| (0..height).step_by(DARK_STRIDE).all(|y| dark(x, y));
    let row_dark = |y: u32| (0..width).step_by(DARK_STRIDE).all(|x| dark(x, y));
    let run = |limit: u32, is_dark: &dyn Fn(u32) -> bool| {
        (0..limit).take_while(|&i| is_dark(i)).count() as u32
    };

    let left = run(limit_x, &|i| column_dark(i));
    let right = run(limit_x, &|i| column_dark(width - 1 - i));
    let top = run(limit_y, &|i| row_dark(i));
    let bottom = run(limit_y, &|i| row_dark(height - 1 - i));

    if left + right + top + bottom == 0 {
        return image;
    }
    let kept_width = width - left - right;
    let kept_height = height - top - bottom;
    if kept_width <= DARK_MIN_REMAINDER || kept_height <= DARK_MIN_REMAINDER {
        return image;
    }
    imageops::crop_imm(&image, left, top, kept_width, kept_height).to_image()
}

/// Crops to `ratio` (width / height) without scaling. Too-wide sources lose
/// equal amounts on both sides; too-tall sources keep their top edge, where
/// title bars and toolbars live.
pub fn fit_crop(image: RgbaImage, ratio: f64) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || !(ratio > 0.0) {
        return image;
    }
    let source = f64::from(width) / f64::from(height);
    if source > ratio {
        let kept = ((f64::from(height) * ratio).floor() as u32).clamp(1, width);
        let x = (width - kept) / 2;
        imageops::crop_imm(&image, x, 0, kept, height).to_image()
    } else if source < ratio {
        let kept = ((f64::from(width) / ratio).floor() as u32).clamp(1, height);
        imageops::crop_imm(&image, 0, 0, width, kept).to_image()
    } else {
        image
    }
}

/// Draws `image` scaled to exactly `width × height` over an opaque gray canvas.
pub fn composite(image: &RgbaImage, width: u32, height: u32, shade: f32) -> RgbaImage {
    let width = width.max(1);
    let height = height.max(1);
    let level = (shade.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([level, level, level, 255]));
    if image.width() > 0 && image.height() > 0 {
        let scaled = imageops::resize(image, width, height, FilterType::CatmullRom);
        imageops::overlay(&mut canvas, &scaled, 0, 0);
    }
    canvas
}

pub fn render_card(raw: RgbaImage, canvas: &CardCanvas) -> RgbaImage {
    let image = if canvas.trim_dark_edges { trim_dark_edges(raw) } else { raw };
    let image = fit_crop(trim_chrome(image), canvas.ratio());
    composite(&image, canvas.width, canvas.height, canvas.shade)
}
