//! Precision and recall curves from overlap records.

use crate::types::OverlapRecord;

/// Added to the precision denominator so the curve is defined everywhere.
///
/// Equal to the spacing of floats at 1.0.
pub const PRECISION_EPSILON: f64 = f64::EPSILON;

/// Precision and recall after each detection, in descending-score order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecisionRecallCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
}

impl PrecisionRecallCurve {
    pub fn len(&self) -> usize {
        self.precision.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precision.is_empty()
    }

    /// Mean of the precision sequence, 0 for an empty curve.
    pub fn mean_precision(&self) -> f64 {
        mean(&self.precision)
    }

    /// Mean of the recall sequence, 0 for an empty curve.
    pub fn mean_recall(&self) -> f64 {
        mean(&self.recall)
    }
}

/// Sort records by descending score.
///
/// The sort is stable: records with equal scores keep their insertion order.
pub fn sort_by_confidence(records: &mut [OverlapRecord]) {
    records.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Cumulative true and false positive counts along `records`.
///
/// A record is a true positive when its overlap is at least `iou_threshold`.
/// Unmatched records carry overlap 0 and so only count as true positives at a
/// threshold of 0.
pub fn cumulative_counts(records: &[OverlapRecord], iou_threshold: f64) -> (Vec<f64>, Vec<f64>) {
    let mut tp_sum = Vec::with_capacity(records.len());
    let mut fp_sum = Vec::with_capacity(records.len());
    let mut tp = 0.0;
    let mut fp = 0.0;

    for record in records {
        if record.overlap >= iou_threshold {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        tp_sum.push(tp);
        fp_sum.push(fp);
    }

    (tp_sum, fp_sum)
}

/// Build the precision-recall curve of records already sorted by confidence.
///
/// # Arguments
///
/// * `records` - Overlap records, sorted by descending score
/// * `iou_threshold` - Minimum overlap of a true positive
/// * `total_ground_truth` - Number of ground-truth instances in scope
///
/// # Example
///
/// ```
/// use obb_eval::metrics::precision_recall::precision_recall_curve;
/// use obb_eval::types::OverlapRecord;
///
/// let records = vec![
///     OverlapRecord { gt_id: Some(1), overlap: 0.9, cat_id: 1, score: 0.9 },
///     OverlapRecord::unmatched(1, 0.5),
/// ];
/// let curve = precision_recall_curve(&records, 0.5, 2);
/// assert_eq!(curve.recall, vec![0.5, 0.5]);
/// assert!((curve.precision[1] - 0.5).abs() < 1e-12);
/// ```
pub fn precision_recall_curve(
    records: &[OverlapRecord],
    iou_threshold: f64,
    total_ground_truth: usize,
) -> PrecisionRecallCurve {
    let (tp_sum, fp_sum) = cumulative_counts(records, iou_threshold);

    let recall = if total_ground_truth > 0 {
        tp_sum
            .iter()
            .map(|tp| tp / total_ground_truth as f64)
            .collect()
    } else {
        vec![0.0; tp_sum.len()]
    };

    let precision = tp_sum
        .iter()
        .zip(&fp_sum)
        .map(|(tp, fp)| tp / (tp + fp + PRECISION_EPSILON))
        .collect();

    PrecisionRecallCurve { precision, recall }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
