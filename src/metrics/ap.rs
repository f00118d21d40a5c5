//! Average Precision (AP) integration of a precision-recall curve.

use crate::params::ApMode;

/// Number of recall levels of the 11-point interpolation.
const ELEVEN_POINTS: usize = 11;

/// Calculate Average Precision from a precision-recall curve.
///
/// # Arguments
///
/// * `recalls` - Recall after each detection, in descending-score order
/// * `precisions` - Precision after each detection, same order and length
/// * `mode` - Integration mode
///
/// # Returns
///
/// The Average Precision, between 0.0 and 1.0 for valid curves.
///
/// # Example
///
/// ```
/// use obb_eval::metrics::ap::average_precision;
/// use obb_eval::params::ApMode;
///
/// let recalls = vec![0.5, 0.5, 1.0];
/// let precisions = vec![1.0, 0.5, 2.0 / 3.0];
/// let ap = average_precision(&recalls, &precisions, ApMode::Area);
/// assert!((ap - (0.5 * 1.0 + 0.5 * 2.0 / 3.0)).abs() < 1e-12);
/// ```
pub fn average_precision(recalls: &[f64], precisions: &[f64], mode: ApMode) -> f64 {
    match mode {
        ApMode::Area => area_under_curve(recalls, precisions),
        ApMode::ElevenPoints => eleven_point(recalls, precisions),
    }
}

/// Replace each precision with the maximum precision at its position or later.
///
/// The result is non-increasing.
pub fn monotonic_envelope(precisions: &[f64]) -> Vec<f64> {
    let mut envelope = precisions.to_vec();
    for i in (1..envelope.len()).rev() {
        envelope[i - 1] = envelope[i - 1].max(envelope[i]);
    }
    envelope
}

/// Area under the monotonic envelope, with `(0, 0)` and `(1, 0)` sentinels.
fn area_under_curve(recalls: &[f64], precisions: &[f64]) -> f64 {
    let mut mrec = Vec::with_capacity(recalls.len() + 2);
    mrec.push(0.0);
    mrec.extend_from_slice(recalls);
    mrec.push(1.0);

    let mut mpre = Vec::with_capacity(precisions.len() + 2);
    mpre.push(0.0);
    mpre.extend_from_slice(precisions);
    mpre.push(0.0);
    let mpre = monotonic_envelope(&mpre);

    mrec.windows(2)
        .zip(mpre.iter().skip(1))
        .filter(|(r, _)| r[1] != r[0])
        .map(|(r, p)| (r[1] - r[0]) * p)
        .sum()
}

/// Mean of the best precision at recall >= 0.0, 0.1, ..., 1.0.
fn eleven_point(recalls: &[f64], precisions: &[f64]) -> f64 {
    let total: f64 = (0..ELEVEN_POINTS)
        .map(|i| {
            let thr = i as f64 * 0.1;
            recalls
                .iter()
                .zip(precisions)
                .filter(|(&r, _)| r >= thr)
                .map(|(_, &p)| p)
                .fold(0.0f64, f64::max)
        })
        .sum();

    total / ELEVEN_POINTS as f64
}
