//! Greedy matching of detections to ground truth within one image.

use crate::metrics::overlap::overlap;
use crate::types::{OverlapRecord, Proposal};
use log::trace;

/// Minimum overlap a detection needs to claim a ground-truth instance.
///
/// The comparison is strict: an overlap of exactly 0.2 does not claim.
pub const RESERVATION_THRESHOLD: f64 = 0.2;

/// A ground-truth annotation resolved to a single category.
#[derive(Debug, Clone, PartialEq)]
pub struct GtCandidate {
    pub id: u64,
    pub cat_id: u64,
    pub a_bbox: [f64; 4],
    pub o_bbox: [f64; 8],
}

/// Find the ground-truth candidate a detection claims.
///
/// Only candidates of the detection's category are considered. Among those
/// the one with the largest overlap wins; on equal overlaps the candidate
/// that comes first in `pool` wins. Nothing is claimed unless the best
/// overlap exceeds [`RESERVATION_THRESHOLD`].
///
/// # Returns
///
/// The position of the claimed candidate in `pool` and its overlap, or
/// `(None, 0.0)` when the detection stays unmatched.
pub fn match_detection(detection: &Proposal, pool: &[GtCandidate]) -> (Option<usize>, f64) {
    let mut best: Option<(usize, f64)> = None;

    for (pos, candidate) in pool.iter().enumerate() {
        if candidate.cat_id != detection.cat_id {
            continue;
        }
        let ov = overlap(candidate, &detection.bbox);
        match best {
            Some((_, best_ov)) if ov <= best_ov => {}
            _ => best = Some((pos, ov)),
        }
    }

    match best {
        Some((pos, ov)) if ov > RESERVATION_THRESHOLD => (Some(pos), ov),
        _ => (None, 0.0),
    }
}

/// Match all detections of one image against its ground truth.
///
/// Detections are processed in *ascending* score order (stable for equal
/// scores), so lower-confidence detections claim ground truth before
/// higher-confidence ones. A claimed candidate leaves the pool and cannot be
/// claimed again.
///
/// # Arguments
///
/// * `detections` - Detections of the image, in any order
/// * `candidates` - Unclaimed ground truth of the image; consumed as scratch state
///
/// # Returns
///
/// One record per detection, in processing order.
pub fn match_image(detections: &[&Proposal], mut candidates: Vec<GtCandidate>) -> Vec<OverlapRecord> {
    let mut order: Vec<&Proposal> = detections.to_vec();
    order.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut records = Vec::with_capacity(order.len());

    for det in order {
        let (claimed, ov) = match_detection(det, &candidates);
        let record = match claimed {
            Some(pos) => {
                let gt = candidates.remove(pos);
                trace!("detection (score {:.4}) claimed gt {} at overlap {:.4}", det.score, gt.id, ov);
                OverlapRecord {
                    gt_id: Some(gt.id),
                    overlap: ov,
                    cat_id: det.cat_id,
                    score: det.score,
                }
            }
            None => OverlapRecord::unmatched(det.cat_id, det.score),
        };
        records.push(record);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoxCoords;

    fn gt(id: u64, cat_id: u64, a_bbox: [f64; 4]) -> GtCandidate {
        let [x0, y0, x1, y1] = a_bbox;
        GtCandidate {
            id,
            cat_id,
            a_bbox,
            o_bbox: [x0, y0, x1, y0, x1, y1, x0, y1],
        }
    }

    fn det(cat_id: u64, bbox: [f64; 4], score: f64) -> Proposal {
        Proposal {
            bbox: BoxCoords::Aligned(bbox),
            cat_id,
            img_idx: 0,
            score,
        }
    }

    #[test]
    fn test_perfect_match() {
        let d = det(1, [10.0, 10.0, 50.0, 50.0], 0.9);
        let records = match_image(&[&d], vec![gt(7, 1, [10.0, 10.0, 50.0, 50.0])]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gt_id, Some(7));
        assert!((records[0].overlap - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_category_mismatch_is_unmatched() {
        let d = det(2, [10.0, 10.0, 50.0, 50.0], 0.9);
        let records = match_image(&[&d], vec![gt(7, 1, [10.0, 10.0, 50.0, 50.0])]);
        assert_eq!(records[0], OverlapRecord::unmatched(2, 0.9));
    }

    #[test]
    fn test_low_overlap_is_unmatched() {
        // overlap 10*10 / (10*50) = 0.2, not strictly above the threshold
        let d = det(1, [0.0, 0.0, 10.0, 10.0], 0.9);
        let records = match_image(&[&d], vec![gt(7, 1, [0.0, 0.0, 10.0, 50.0])]);
        assert_eq!(records[0].gt_id, None);
        assert_eq!(records[0].overlap, 0.0);
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let d = det(1, [0.0, 0.0, 10.0, 10.0], 0.9);
        let pool = vec![
            gt(3, 1, [0.0, 0.0, 10.0, 10.0]),
            gt(1, 1, [0.0, 0.0, 10.0, 10.0]),
        ];
        assert_eq!(match_detection(&d, &pool), (Some(0), 1.0));
    }

    #[test]
    fn test_lowest_score_claims_first() {
        let high = det(1, [0.0, 0.0, 10.0, 10.0], 0.9);
        let low = det(1, [0.0, 0.0, 10.0, 10.0], 0.1);
        let records = match_image(&[&high, &low], vec![gt(5, 1, [0.0, 0.0, 10.0, 10.0])]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].score, 0.1);
        assert_eq!(records[0].gt_id, Some(5));
        assert_eq!(records[1].score, 0.9);
        assert_eq!(records[1].gt_id, None);
    }

    #[test]
    fn test_claimed_gt_not_reused() {
        let dets = [
            det(1, [0.0, 0.0, 10.0, 10.0], 0.3),
            det(1, [1.0, 1.0, 11.0, 11.0], 0.5),
            det(1, [0.0, 0.0, 10.0, 10.0], 0.7),
        ];
        let refs: Vec<&Proposal> = dets.iter().collect();
        let pool = vec![
            gt(1, 1, [0.0, 0.0, 10.0, 10.0]),
            gt(2, 1, [1.0, 1.0, 11.0, 11.0]),
        ];
        let records = match_image(&refs, pool);

        let claimed: Vec<u64> = records.iter().filter_map(|r| r.gt_id).collect();
        assert_eq!(claimed, vec![1, 2]);
        assert!(!records[2].is_matched());
    }

    #[test]
    fn test_no_ground_truth() {
        let d = det(1, [0.0, 0.0, 10.0, 10.0], 0.5);
        let records = match_image(&[&d], Vec::new());
        assert_eq!(records, vec![OverlapRecord::unmatched(1, 0.5)]);
    }

    #[test]
    fn test_no_detections() {
        let records = match_image(&[], vec![gt(1, 1, [0.0, 0.0, 1.0, 1.0])]);
        assert!(records.is_empty());
    }
}
