/// Zero-mean normalized cross-correlation
///
/// Scores every placement of a template inside a search window. A score of 1.0
/// is a perfect match; the mean of each channel is removed first, so uniform
/// brightness changes do not affect the result.
use image::{ImageBuffer, Luma, Pixel};
use imageproc::definitions::Image;
use imageproc::integral_image::{
    ArrayData, integral_image, integral_squared_image, sum_image_pixels,
};
use imageproc::map::{ChannelMap, WithChannel};
use imageproc::template_matching::find_extremes;

/// Best placement found in a score map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    pub similarity: f32,
    pub x: u32,
    pub y: u32,
}

/// Score map of `template` slid over `image`.
///
/// Window sums and sums of squares come from integral images, so only the
/// cross term with the template is accumulated per pixel.
///
/// `None` when the template is empty or does not fit inside the image.
pub fn score_map<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    template: &ImageBuffer<P, Vec<u8>>,
) -> Option<Image<Luma<f32>>>
where
    P: Pixel<Subpixel = u8> + WithChannel<u64>,
    ChannelMap<P, u64>: ArrayData + Copy,
    <ChannelMap<P, u64> as ArrayData>::DataType: AsRef<[u64]>,
{
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let channels = P::CHANNEL_COUNT as usize;
    let n = (tw * th) as f64;
    let t_raw = template.as_raw();
    let i_raw = image.as_raw();

    let mut t_mean = vec![0f64; channels];
    for px in t_raw.chunks_exact(channels) {
        for c in 0..channels {
            t_mean[c] += px[c] as f64;
        }
    }
    t_mean.iter_mut().for_each(|m| *m /= n);

    // Centered template sums to zero per channel, so the window mean drops
    // out of the cross term.
    let t_centered: Vec<f64> = t_raw
        .iter()
        .enumerate()
        .map(|(i, v)| *v as f64 - t_mean[i % channels])
        .collect();
    let t_energy: f64 = t_centered.iter().map(|v| v * v).sum();

    let sums = integral_image::<P, u64>(image);
    let squares = integral_squared_image::<P, u64>(image);

    let out_w = iw - tw + 1;
    let out_h = ih - th + 1;
    let mut scores = Image::<Luma<f32>>::new(out_w, out_h);
    let row_len = (iw as usize) * channels;
    let t_row_len = (tw as usize) * channels;
    let mut w_mean = vec![0f64; channels];

    for oy in 0..out_h {
        for ox in 0..out_w {
            let (right, bottom) = (ox + tw - 1, oy + th - 1);
            let sum = sum_image_pixels(&sums, ox, oy, right, bottom);
            let square = sum_image_pixels(&squares, ox, oy, right, bottom);

            let mut w_energy = 0f64;
            for (c, (s, q)) in sum.as_ref().iter().zip(square.as_ref()).enumerate() {
                let s = *s as f64;
                w_mean[c] = s / n;
                w_energy += (*q as f64 - s * s / n).max(0.0);
            }

            let mut cross = 0f64;
            for ty in 0..th as usize {
                let start = (oy as usize + ty) * row_len + (ox as usize) * channels;
                let window = &i_raw[start..start + t_row_len];
                let t_row = &t_centered[ty * t_row_len..(ty + 1) * t_row_len];
                cross += window.iter().zip(t_row).map(|(w, t)| *w as f64 * t).sum::<f64>();
            }

            let score = normalize(cross, t_energy, w_energy, &t_mean, &w_mean);
            scores.put_pixel(ox, oy, Luma([score]));
        }
    }

    Some(scores)
}

// Flat regions carry no shape information; two flat regions match only if
// they have the same brightness.
fn normalize(cross: f64, t_energy: f64, w_energy: f64, t_mean: &[f64], w_mean: &[f64]) -> f32 {
    const FLAT: f64 = 1e-6;
    match (t_energy < FLAT, w_energy < FLAT) {
        (true, true) => {
            let same = t_mean.iter().zip(w_mean).all(|(a, b)| (a - b).abs() < 1.0);
            if same { 1.0 } else { 0.0 }
        }
        (true, false) | (false, true) => 0.0,
        (false, false) => (cross / (t_energy * w_energy).sqrt()).clamp(-1.0, 1.0) as f32,
    }
}

/// Highest scoring placement of `template` inside `image`.
pub fn best_match<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    template: &ImageBuffer<P, Vec<u8>>,
) -> Option<BestMatch>
where
    P: Pixel<Subpixel = u8> + WithChannel<u64>,
    ChannelMap<P, u64>: ArrayData + Copy,
    <ChannelMap<P, u64> as ArrayData>::DataType: AsRef<[u64]>,
{
    let scores = score_map(image, template)?;
    let extremes = find_extremes(&scores);
    let (x, y) = extremes.max_value_location;
    log::trace!(
        "correlation {}x{} in {}x{}: {:.3} at ({}, {})",
        template.width(),
        template.height(),
        image.width(),
        image.height(),
        extremes.max_value,
        x,
        y
    );
    Some(BestMatch {
        similarity: extremes.max_value,
        x,
        y,
    })
}
