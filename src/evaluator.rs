//! Main evaluation orchestrator for OBB proposal metrics.

use crate::aggregate::{collect_overlaps, partition_by_category};
use crate::dataset::ObbDataset;
use crate::error::Result;
use crate::metrics::ap::average_precision;
use crate::metrics::precision_recall::{precision_recall_curve, sort_by_confidence};
use crate::params::{ApMode, EvalParams};
use crate::types::{
    MetricsReport, OverlapRecord, ScopeMetrics, ScopeReport, ThresholdEntry, ThresholdMetrics,
};
use log::{debug, info};
use std::time::Instant;

/// Evaluate overlap records at several IoU thresholds.
///
/// # Arguments
///
/// * `records` - Overlap records in scope (all, or one category)
/// * `iou_thresholds` - IoU thresholds to evaluate at
/// * `total_ground_truth` - Ground-truth instances in the same scope
/// * `mode` - AP integration mode
///
/// # Returns
///
/// One entry per threshold, in the order given: Average Precision and the
/// means of the precision and recall sequences. Means of an empty sequence
/// are 0.
///
/// # Example
///
/// ```
/// use obb_eval::evaluator::evaluate_overlaps;
/// use obb_eval::params::ApMode;
/// use obb_eval::types::OverlapRecord;
///
/// let records = vec![OverlapRecord { gt_id: Some(1), overlap: 1.0, cat_id: 1, score: 0.9 }];
/// let entries = evaluate_overlaps(&records, &[0.5], 1, ApMode::Area);
/// assert!((entries[0].metrics.ap - 1.0).abs() < 1e-9);
/// ```
pub fn evaluate_overlaps(
    records: &[OverlapRecord],
    iou_thresholds: &[f64],
    total_ground_truth: usize,
    mode: ApMode,
) -> Vec<ThresholdEntry> {
    let mut sorted = records.to_vec();
    sort_by_confidence(&mut sorted);

    iou_thresholds
        .iter()
        .map(|&iou_threshold| {
            let curve = precision_recall_curve(&sorted, iou_threshold, total_ground_truth);
            let ap = average_precision(&curve.recall, &curve.precision, mode);
            ThresholdEntry {
                iou_threshold,
                metrics: ThresholdMetrics {
                    ap,
                    precision: curve.mean_precision(),
                    recall: curve.mean_recall(),
                },
            }
        })
        .collect()
}

/// Mean of each metric over all thresholds.
pub fn average_over_thresholds(entries: &[ThresholdEntry]) -> ThresholdMetrics {
    if entries.is_empty() {
        return ThresholdMetrics::default();
    }

    let n = entries.len() as f64;
    let sum = entries.iter().fold(ThresholdMetrics::default(), |acc, e| ThresholdMetrics {
        ap: acc.ap + e.metrics.ap,
        precision: acc.precision + e.metrics.precision,
        recall: acc.recall + e.metrics.recall,
    });

    ThresholdMetrics {
        ap: sum.ap / n,
        precision: sum.precision / n,
        recall: sum.recall / n,
    }
}

/// Evaluate the proposals loaded into a dataset.
///
/// Every image with proposals is matched against its ground truth, then the
/// records are evaluated either together or per category. Classwise reports
/// have one scope per category that occurs in the records, in ascending id
/// order, each with that category's ground-truth count.
///
/// # Errors
///
/// * `InvalidConfiguration` if the parameters do not validate
/// * `InvalidUsage` if no proposals are loaded
pub fn calculate_metrics(dataset: &ObbDataset, params: &EvalParams) -> Result<MetricsReport> {
    params.validate()?;
    let proposals = dataset.require_proposals()?;
    let start = Instant::now();

    let (records, _) = collect_overlaps(dataset, proposals, params.parallel)?;
    let ann_set_idx = proposals.ann_set_idx;

    let mut scopes = Vec::new();
    if params.classwise {
        for (cat_id, cat_records) in partition_by_category(&records) {
            let total_gt = dataset.ground_truth_count(ann_set_idx, Some(cat_id));
            debug!("category {}: {} records, {} ground truth", cat_id, cat_records.len(), total_gt);
            scopes.push(ScopeReport {
                category_id: Some(cat_id),
                metrics: scope_metrics(&cat_records, total_gt, params),
            });
        }
    } else {
        let total_gt = dataset.ground_truth_count(ann_set_idx, None);
        scopes.push(ScopeReport {
            category_id: None,
            metrics: scope_metrics(&records, total_gt, params),
        });
    }

    info!(
        "evaluated {} proposals in {} scope(s), t={:.2}s",
        records.len(),
        scopes.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(MetricsReport { scopes })
}

fn scope_metrics(records: &[OverlapRecord], total_gt: usize, params: &EvalParams) -> ScopeMetrics {
    let entries = evaluate_overlaps(records, &params.iou_thresholds, total_gt, params.ap_mode);
    if params.average_thresholds {
        ScopeMetrics::Averaged(average_over_thresholds(&entries))
    } else {
        ScopeMetrics::PerThreshold(entries)
    }
}
