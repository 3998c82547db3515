//! Pixel statistics: mean color, color distance, luma and Otsu binarization.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::otsu_level;

use super::geometry::Area;

/// Crop `area` out of `image`, clipped to the image bounds.
///
/// Returns the crop and the clipped area it was taken from.
pub fn crop(image: &RgbImage, area: Area) -> (RgbImage, Area) {
    let clipped = area.clipped(image.width(), image.height());
    if clipped.is_empty() {
        return (RgbImage::new(0, 0), clipped);
    }
    let view = image::imageops::crop_imm(
        image,
        clipped.x1 as u32,
        clipped.y1 as u32,
        clipped.width() as u32,
        clipped.height() as u32,
    );
    (view.to_image(), clipped)
}

/// Mean color of `area`. An empty area averages to black.
pub fn mean_color(image: &RgbImage, area: Area) -> Rgb<u8> {
    let clipped = area.clipped(image.width(), image.height());
    if clipped.is_empty() {
        return Rgb([0, 0, 0]);
    }
    let mut sum = [0u64; 3];
    for y in clipped.y1..clipped.y2 {
        for x in clipped.x1..clipped.x2 {
            let p = image.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                sum[c] += p[c] as u64;
            }
        }
    }
    let n = (clipped.width() as u64) * (clipped.height() as u64);
    Rgb([
        ((sum[0] as f64 / n as f64).round()) as u8,
        ((sum[1] as f64 / n as f64).round()) as u8,
        ((sum[2] as f64 / n as f64).round()) as u8,
    ])
}

/// Spread of the per-channel difference: the largest positive difference
/// minus the largest negative one. Zero for identical colors.
pub fn color_distance(a: Rgb<u8>, b: Rgb<u8>) -> i32 {
    let diffs = [0, 1, 2].map(|c| a[c] as i32 - b[c] as i32);
    let positive = diffs.iter().map(|d| (*d).max(0)).max().unwrap_or(0);
    let negative = diffs.iter().map(|d| (*d).min(0)).min().unwrap_or(0);
    positive - negative
}

pub fn color_similar(a: Rgb<u8>, b: Rgb<u8>, threshold: i32) -> bool {
    color_distance(a, b) <= threshold
}

/// Per-pixel similarity to `color`, `255 - distance`, saturating at zero.
pub fn color_similarity_2d(image: &RgbImage, color: Rgb<u8>) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let d = color_distance(*image.get_pixel(x, y), color);
        Luma([(255 - d).max(0) as u8])
    })
}

/// BT.601 luma.
pub fn luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([y.round().clamp(0.0, 255.0) as u8])
    })
}

/// Luma followed by an Otsu threshold: pixels above the level become 255.
pub fn binarize(image: &RgbImage) -> GrayImage {
    let gray = luma(image);
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }
    let level = otsu_level(&gray);
    let mut out = gray;
    for p in out.pixels_mut() {
        p[0] = if p[0] > level { 255 } else { 0 };
    }
    out
}

/// Number of pixels in `area` whose similarity to `color` is at least `threshold`.
pub fn count_similar(image: &RgbImage, area: Area, color: Rgb<u8>, threshold: u8) -> usize {
    let (cropped, _) = crop(image, area);
    color_similarity_2d(&cropped, color)
        .pixels()
        .filter(|p| p[0] >= threshold)
        .count()
}
