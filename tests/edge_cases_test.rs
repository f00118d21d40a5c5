//! Edge case and boundary condition tests.

use obb_eval::evaluator::evaluate_overlaps;
use obb_eval::matching::{match_image, GtCandidate, RESERVATION_THRESHOLD};
use obb_eval::metrics::overlap::{overlap_aligned, overlap_oriented};
use obb_eval::types::{BoxCoords, OverlapRecord, Proposal};
use obb_eval::{ApMode, EvalParams, ObbDataset};

fn create_candidate(id: u64, cat_id: u64, a_bbox: [f64; 4]) -> GtCandidate {
    let [x0, y0, x1, y1] = a_bbox;
    GtCandidate {
        id,
        cat_id,
        a_bbox,
        o_bbox: [x0, y0, x1, y0, x1, y1, x0, y1],
    }
}

fn create_proposal(cat_id: u64, bbox: [f64; 4], score: f64) -> Proposal {
    Proposal {
        bbox: BoxCoords::Aligned(bbox),
        cat_id,
        img_idx: 0,
        score,
    }
}

// ============================================================================
// MATCHING EDGE CASES
// ============================================================================

#[test]
fn test_no_detections() {
    let gt = vec![create_candidate(1, 1, [0.0, 0.0, 10.0, 10.0])];
    assert!(match_image(&[], gt).is_empty());
}

#[test]
fn test_no_ground_truth() {
    let det = create_proposal(1, [0.0, 0.0, 10.0, 10.0], 0.9);
    let records = match_image(&[&det], Vec::new());
    assert_eq!(records, vec![OverlapRecord::unmatched(1, 0.9)]);
}

#[test]
fn test_overlap_at_reservation_threshold_does_not_claim() {
    let gt = vec![create_candidate(1, 1, [0.0, 0.0, 10.0, 10.0])];

    // 2x10 inside a 10x10 extent: exactly the threshold
    let at = create_proposal(1, [0.0, 0.0, 2.0, 10.0], 0.9);
    assert_eq!(
        overlap_aligned(&[0.0, 0.0, 10.0, 10.0], &[0.0, 0.0, 2.0, 10.0]),
        RESERVATION_THRESHOLD
    );
    let records = match_image(&[&at], gt.clone());
    assert_eq!(records[0].gt_id, None);
    assert_eq!(records[0].overlap, 0.0);

    let above = create_proposal(1, [0.0, 0.0, 3.0, 10.0], 0.9);
    let records = match_image(&[&above], gt);
    assert_eq!(records[0].gt_id, Some(1));
    assert!((records[0].overlap - 0.3).abs() < 1e-12);
}

#[test]
fn test_many_detections_one_ground_truth() {
    let gt = vec![create_candidate(7, 1, [0.0, 0.0, 10.0, 10.0])];
    let dets: Vec<Proposal> = (0..5)
        .map(|i| create_proposal(1, [0.0, 0.0, 10.0, 10.0], 0.5 + i as f64 * 0.1))
        .collect();
    let refs: Vec<&Proposal> = dets.iter().collect();

    let records = match_image(&refs, gt);
    assert_eq!(records.len(), 5);
    assert_eq!(records.iter().filter(|r| r.is_matched()).count(), 1);
    // the lowest score is processed first and wins
    assert_eq!(records[0].gt_id, Some(7));
    assert!((records[0].score - 0.5).abs() < 1e-12);
}

#[test]
fn test_one_detection_many_ground_truths() {
    let gt = vec![
        create_candidate(1, 1, [0.0, 0.0, 10.0, 10.0]),
        create_candidate(2, 1, [2.0, 0.0, 12.0, 10.0]),
        create_candidate(3, 1, [50.0, 50.0, 60.0, 60.0]),
    ];
    let det = create_proposal(1, [2.0, 0.0, 12.0, 10.0], 0.9);
    let records = match_image(&[&det], gt);
    assert_eq!(records[0].gt_id, Some(2));
    assert!((records[0].overlap - 1.0).abs() < 1e-12);
}

#[test]
fn test_equal_overlap_prefers_first_candidate() {
    let gt = vec![
        create_candidate(10, 1, [0.0, 0.0, 10.0, 10.0]),
        create_candidate(20, 1, [0.0, 0.0, 10.0, 10.0]),
    ];
    let a = create_proposal(1, [0.0, 0.0, 10.0, 10.0], 0.4);
    let b = create_proposal(1, [0.0, 0.0, 10.0, 10.0], 0.6);

    let records = match_image(&[&b, &a], gt);
    assert_eq!(records[0].gt_id, Some(10));
    assert_eq!(records[1].gt_id, Some(20));
}

#[test]
fn test_category_mismatch_never_claims() {
    let gt = vec![create_candidate(1, 2, [0.0, 0.0, 10.0, 10.0])];
    let det = create_proposal(1, [0.0, 0.0, 10.0, 10.0], 0.9);
    let records = match_image(&[&det], gt);
    assert_eq!(records[0].gt_id, None);
    assert_eq!(records[0].cat_id, 1);
}

#[test]
fn test_equal_scores_keep_input_order() {
    let gt = vec![create_candidate(1, 1, [0.0, 0.0, 10.0, 10.0])];
    let first = create_proposal(1, [0.0, 0.0, 10.0, 9.0], 0.5);
    let second = create_proposal(1, [0.0, 0.0, 10.0, 10.0], 0.5);

    let records = match_image(&[&first, &second], gt);
    assert_eq!(records[0].gt_id, Some(1));
    assert!((records[0].overlap - 0.9).abs() < 1e-12);
    assert_eq!(records[1].gt_id, None);
}

#[test]
fn test_degenerate_oriented_detection() {
    let gt = vec![create_candidate(1, 1, [0.0, 0.0, 10.0, 10.0])];
    let det = Proposal {
        bbox: BoxCoords::Oriented([0.0, 0.0, 10.0, 10.0, 10.0, 10.0, 0.0, 0.0]),
        cat_id: 1,
        img_idx: 0,
        score: 0.9,
    };
    let records = match_image(&[&det], gt);
    assert_eq!(records[0].gt_id, None);
}

// ============================================================================
// GEOMETRY EDGE CASES
// ============================================================================

#[test]
fn test_contained_box_aligned() {
    // small box inside: intersection equals the small box, extent the big one
    let big = [0.0, 0.0, 10.0, 10.0];
    let small = [2.0, 2.0, 4.0, 4.0];
    assert!((overlap_aligned(&big, &small) - 0.04).abs() < 1e-12);
}

#[test]
fn test_corner_touching_boxes() {
    let a = [0.0, 0.0, 10.0, 10.0];
    let b = [10.0, 10.0, 20.0, 20.0];
    assert_eq!(overlap_aligned(&a, &b), 0.0);

    let qa = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];
    let qb = [10.0, 10.0, 20.0, 10.0, 20.0, 20.0, 10.0, 20.0];
    assert!(overlap_oriented(&qa, &qb).abs() < 1e-12);
}

#[test]
fn test_large_coordinates() {
    let a = [1e6, 1e6, 1e6 + 100.0, 1e6 + 100.0];
    assert!((overlap_aligned(&a, &a) - 1.0).abs() < 1e-9);

    let q = [1e6, 1e6, 1e6 + 100.0, 1e6, 1e6 + 100.0, 1e6 + 100.0, 1e6, 1e6 + 100.0];
    assert!((overlap_oriented(&q, &q) - 1.0).abs() < 1e-6);
}

// ============================================================================
// EVALUATION EDGE CASES
// ============================================================================

#[test]
fn test_zero_ground_truth_scope() {
    let records = vec![OverlapRecord::unmatched(1, 0.9), OverlapRecord::unmatched(1, 0.8)];
    let entries = evaluate_overlaps(&records, &[0.5], 0, ApMode::Area);
    assert_eq!(entries[0].metrics.ap, 0.0);
    assert_eq!(entries[0].metrics.recall, 0.0);
    assert_eq!(entries[0].metrics.precision, 0.0);
}

#[test]
fn test_threshold_of_one_requires_exact_overlap() {
    let records = vec![
        OverlapRecord { gt_id: Some(1), overlap: 1.0, cat_id: 1, score: 0.9 },
        OverlapRecord { gt_id: Some(2), overlap: 0.999, cat_id: 1, score: 0.8 },
    ];
    let entries = evaluate_overlaps(&records, &[1.0], 2, ApMode::Area);
    assert!((entries[0].metrics.ap - 0.5).abs() < 1e-9);
}

#[test]
fn test_threshold_of_zero_counts_unmatched_as_true_positive() {
    // overlap 0 >= 0: every record counts
    let records = vec![OverlapRecord::unmatched(1, 0.9)];
    let entries = evaluate_overlaps(&records, &[0.0], 1, ApMode::Area);
    assert!((entries[0].metrics.ap - 1.0).abs() < 1e-9);
}

#[test]
fn test_image_without_ground_truth() {
    let mut ds = ObbDataset::from_json_str(
        r#"{
            "annotation_sets": ["deepscores"],
            "categories": {"1": {"name": "note", "annotation_set": "deepscores"}},
            "images": [
                {"id": 1, "filename": "a.png", "ann_ids": []},
                {"id": 2, "filename": "b.png", "ann_ids": [1]}
            ],
            "annotations": {
                "1": {"a_bbox": [0, 0, 10, 10], "o_bbox": [0, 0, 10, 0, 10, 10, 0, 10],
                      "cat_id": [1], "img_id": 2}
            }
        }"#,
        None,
    )
    .unwrap();
    ds.load_proposals_str(
        r#"{"annotation_set": "deepscores", "proposals": [
            {"bbox": [0, 0, 10, 10], "cat_id": 1, "img_id": 1, "score": 0.9}
        ]}"#,
    )
    .unwrap();

    // the detection sits on the empty image; the ground truth stays unclaimed
    let report = ds.calculate_metrics(&EvalParams::default()).unwrap();
    let m = report.overall().unwrap().averaged().unwrap();
    assert_eq!(m.ap, 0.0);
    assert_eq!(m.recall, 0.0);
}

#[test]
fn test_classwise_skips_categories_without_detections() {
    let mut ds = ObbDataset::from_json_str(
        r#"{
            "annotation_sets": ["deepscores"],
            "categories": {
                "1": {"name": "note", "annotation_set": "deepscores"},
                "2": {"name": "rest", "annotation_set": "deepscores"}
            },
            "images": [{"id": 1, "filename": "a.png", "ann_ids": [1, 2]}],
            "annotations": {
                "1": {"a_bbox": [0, 0, 10, 10], "o_bbox": [0, 0, 10, 0, 10, 10, 0, 10],
                      "cat_id": [1], "img_id": 1},
                "2": {"a_bbox": [20, 0, 30, 10], "o_bbox": [20, 0, 30, 0, 30, 10, 20, 10],
                      "cat_id": [2], "img_id": 1}
            }
        }"#,
        None,
    )
    .unwrap();
    ds.load_proposals_str(
        r#"{"annotation_set": "deepscores", "proposals": [
            {"bbox": [20, 0, 30, 10], "cat_id": 2, "img_id": 1, "score": 0.9}
        ]}"#,
    )
    .unwrap();

    let report = ds
        .calculate_metrics(&EvalParams::default().with_classwise(true))
        .unwrap();
    assert_eq!(report.scopes.len(), 1);
    assert!(report.category(1).is_none());
    assert!(report.category(2).is_some());
}
