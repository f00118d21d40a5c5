//! IoU threshold lists.

use crate::error::{ObbEvalError, Result};

/// Generate evenly spaced IoU thresholds.
///
/// # Arguments
///
/// * `start` - First threshold (inclusive)
/// * `end` - Last threshold (inclusive)
/// * `steps` - Number of thresholds to generate
///
/// # Example
///
/// ```
/// use obb_eval::threshold::iou_threshold_range;
///
/// let thresholds = iou_threshold_range(0.5, 0.95, 10).unwrap();
/// assert_eq!(thresholds.len(), 10);
/// assert!((thresholds[1] - 0.55).abs() < 1e-10);
/// assert!((thresholds[9] - 0.95).abs() < 1e-10);
/// ```
pub fn iou_threshold_range(start: f64, end: f64, steps: usize) -> Result<Vec<f64>> {
    if steps == 0 {
        return Err(ObbEvalError::InvalidConfiguration(
            "Number of steps must be greater than 0".to_string(),
        ));
    }

    validate_threshold(start)?;
    validate_threshold(end)?;

    if start > end {
        return Err(ObbEvalError::InvalidConfiguration(format!(
            "Start threshold ({}) must be <= end threshold ({})",
            start, end
        )));
    }

    if steps == 1 {
        return Ok(vec![start]);
    }

    let step_size = (end - start) / (steps - 1) as f64;
    Ok((0..steps).map(|i| start + step_size * i as f64).collect())
}

/// Check a threshold list: non-empty, every value finite and in `[0, 1]`.
pub fn validate_iou_thresholds(thresholds: &[f64]) -> Result<()> {
    if thresholds.is_empty() {
        return Err(ObbEvalError::InvalidConfiguration(
            "At least one IoU threshold is required".to_string(),
        ));
    }
    thresholds.iter().try_for_each(|&t| validate_threshold(t))
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ObbEvalError::InvalidConfiguration(format!(
            "IoU threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }
    Ok(())
}
