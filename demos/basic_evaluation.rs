//! Basic evaluation example demonstrating core functionality.
//!
//! Run with `RUST_LOG=info` to see the loader and evaluator logs.

use obb_eval::dataset::{ImageRef, ImageSelector};
use obb_eval::metrics::overlap::{overlap_aligned, overlap_oriented};
use obb_eval::{ApMode, EvalParams, ObbDataset};

const DATASET: &str = r#"{
    "info": {"description": "Two hand-drawn score pages"},
    "annotation_sets": ["deepscores", "muscima++"],
    "categories": {
        "1": {"name": "noteheadBlack", "annotation_set": "deepscores"},
        "2": {"name": "stem", "annotation_set": "deepscores"},
        "3": {"name": "noteheadFull", "annotation_set": "muscima++"},
        "4": {"name": "stem", "annotation_set": "muscima++"}
    },
    "images": [
        {"id": 1, "filename": "page-1.png", "width": 640, "height": 480, "ann_ids": [1, 2]},
        {"id": 2, "filename": "page-2.png", "width": 640, "height": 480, "ann_ids": [3]}
    ],
    "annotations": {
        "1": {"a_bbox": [100, 100, 112, 110], "o_bbox": [100, 100, 112, 100, 112, 110, 100, 110],
              "cat_id": [1, 3], "img_id": 1, "comments": "instance:#000001;"},
        "2": {"a_bbox": [111, 60, 113, 105], "o_bbox": [111, 60, 113, 60, 113, 105, 111, 105],
              "cat_id": [2, 4], "img_id": 1, "comments": "instance:#000002;"},
        "3": {"a_bbox": [300, 200, 312, 210], "o_bbox": [300, 200, 312, 200, 312, 210, 300, 210],
              "cat_id": [1, 3], "img_id": 2, "comments": ""}
    }
}"#;

const PROPOSALS: &str = r#"{
    "annotation_set": "deepscores",
    "proposals": [
        {"bbox": [100, 101, 112, 111], "cat_id": 1, "img_id": 1, "score": 0.94},
        {"bbox": [111, 62, 113, 104], "cat_id": 2, "img_id": 1, "score": 0.81},
        {"bbox": [303, 200, 315, 210], "cat_id": 1, "img_id": 2, "score": 0.77},
        {"bbox": [500, 400, 512, 410], "cat_id": 1, "img_id": 2, "score": 0.35}
    ]
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("=== OBB Evaluation Example ===\n");

    // Example 1: Overlap measures
    println!("1. Overlap Measures");
    let gt = [0.0, 0.0, 10.0, 10.0];
    let det = [5.0, 5.0, 15.0, 15.0];
    println!("   Aligned overlap (joint extent): {:.4}", overlap_aligned(&gt, &det));
    let gt_quad = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];
    let diamond = [5.0, 0.0, 10.0, 5.0, 5.0, 10.0, 0.0, 5.0];
    println!("   Oriented IoU (square vs. diamond): {:.4}", overlap_oriented(&gt_quad, &diamond));
    println!();

    // Example 2: Load the dataset
    println!("2. Loading Annotations");
    let mut dataset = ObbDataset::from_json_str(DATASET, Some("deepscores"))?;
    println!("{}", dataset);
    println!("   Categories in view: {:?}", dataset.class_occurrences());
    for ann in dataset.get_anns(ImageRef::Id(1), None)? {
        println!(
            "   annotation {} -> categories {:?}, comments {:?}",
            ann.annotation.id,
            ann.cat_ids,
            ann.annotation.parsed_comments()
        );
    }
    println!();

    // Example 3: Load proposals and inspect the matching
    println!("3. Matching Proposals");
    dataset.load_proposals_str(PROPOSALS)?;
    let page_two = dataset.get_img_props(&ImageSelector::Ids(vec![2]))?;
    println!("   Proposals on page 2: {}", page_two.len());
    for record in dataset.overlaps(true)? {
        println!(
            "   score {:.2} cat {} -> gt {:>3} overlap {:.4}",
            record.score,
            record.cat_id,
            record.gt_id_or_sentinel(),
            record.overlap
        );
    }
    println!();

    // Example 4: Metrics
    println!("4. Metrics");
    let params = EvalParams::default()
        .with_iou_thresholds(vec![0.5, 0.55, 0.75])
        .with_average_thresholds(false);
    let report = dataset.calculate_metrics(&params)?;
    if let Some(overall) = report.overall() {
        for t in &params.iou_thresholds {
            if let Some(m) = overall.at_threshold(*t) {
                println!(
                    "   IoU {:.2}: AP {:.4}  precision {:.4}  recall {:.4}",
                    t, m.ap, m.precision, m.recall
                );
            }
        }
    }
    println!();

    // Example 5: Classwise 11-point AP as JSON
    println!("5. Classwise Report (11-point AP)");
    let classwise = EvalParams::default()
        .with_classwise(true)
        .with_ap_mode(ApMode::ElevenPoints);
    let report = dataset.calculate_metrics(&classwise)?;
    println!("{}", report.to_json()?);

    // Example 6: Blacklisting a class
    println!("\n6. Blacklisting 'stem'");
    dataset.set_class_blacklist(&["stem"]);
    let report = dataset.calculate_metrics(&EvalParams::default())?;
    if let Some(m) = report.overall().and_then(|s| s.averaged()) {
        println!("   AP {:.4}  precision {:.4}  recall {:.4}", m.ap, m.precision, m.recall);
    }

    Ok(())
}
