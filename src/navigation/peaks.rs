//! One-dimensional peak detection over an aggregated row signal.
//!
//! Follows the usual definitions: a peak is a local maximum (the middle of a
//! flat top), its bases are the lowest points on each side before the signal
//! rises above the peak again, and its width is measured at
//! `peak - prominence * rel_height`, never beyond the bases.

use serde::{Deserialize, Serialize};

/// Filters applied to candidate peaks. `None` disables a filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakParams {
    /// Minimum peak value
    pub height: Option<f64>,
    /// Minimum width at `rel_height`
    pub width: Option<f64>,
    /// Minimum index distance between two peaks; higher peaks win
    pub distance: Option<usize>,
    /// Where widths are measured, as a fraction of prominence below the peak
    pub rel_height: f64,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            height: None,
            width: None,
            distance: None,
            rel_height: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub prominence: f64,
    pub left_base: usize,
    pub right_base: usize,
    pub width: f64,
}

/// Local maxima, taking the (left-biased) middle of flat tops.
///
/// Flat tops touching either end of the signal are not peaks.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let mut i = 1;
    let last = x.len() - 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Keep the highest peaks, dropping any closer than `distance` to a kept one.
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|a, b| x[peaks[*a]].total_cmp(&x[peaks[*b]]));

    let mut keep = vec![true; peaks.len()];
    for &i in order.iter().rev() {
        if !keep[i] {
            continue;
        }
        for j in (0..i).rev() {
            if peaks[i] - peaks[j] >= distance {
                break;
            }
            keep[j] = false;
        }
        for j in i + 1..peaks.len() {
            if peaks[j] - peaks[i] >= distance {
                break;
            }
            keep[j] = false;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .map(|(p, _)| *p)
        .collect()
}

fn prominence(x: &[f64], peak: usize) -> (f64, usize, usize) {
    let top = x[peak];

    let mut left_base = peak;
    let mut left_min = top;
    for i in (0..=peak).rev() {
        if x[i] > top {
            break;
        }
        if x[i] < left_min {
            left_min = x[i];
            left_base = i;
        }
    }

    let mut right_base = peak;
    let mut right_min = top;
    for (i, value) in x.iter().enumerate().skip(peak) {
        if *value > top {
            break;
        }
        if *value < right_min {
            right_min = *value;
            right_base = i;
        }
    }

    (top - left_min.max(right_min), left_base, right_base)
}

fn width(
    x: &[f64],
    peak: usize,
    prominence: f64,
    left_base: usize,
    right_base: usize,
    rel_height: f64,
) -> f64 {
    let level = x[peak] - prominence * rel_height;

    let mut i = peak;
    while left_base < i && level < x[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if x[i] < level {
        left += (level - x[i]) / (x[i + 1] - x[i]);
    }

    let mut i = peak;
    while i < right_base && level < x[i] {
        i += 1;
    }
    let mut right = i as f64;
    if x[i] < level {
        right -= (level - x[i]) / (x[i - 1] - x[i]);
    }

    right - left
}

/// Peaks of `x` that pass every filter in `params`, in index order.
pub fn find_peaks(x: &[f64], params: &PeakParams) -> Vec<Peak> {
    let mut candidates = local_maxima(x);
    if let Some(height) = params.height {
        candidates.retain(|p| x[*p] >= height);
    }
    if let Some(distance) = params.distance
        && distance > 1
    {
        candidates = select_by_distance(x, &candidates, distance);
    }

    let rel_height = params.rel_height.max(0.0);
    candidates
        .into_iter()
        .map(|index| {
            let (prominence, left_base, right_base) = prominence(x, index);
            Peak {
                index,
                prominence,
                left_base,
                right_base,
                width: width(x, index, prominence, left_base, right_base, rel_height),
            }
        })
        .filter(|peak| params.width.is_none_or(|w| peak.width >= w))
        .collect()
}
