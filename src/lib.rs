//! # obb-eval
//!
//! A Rust library for evaluating oriented (OBB) and axis-aligned bounding box
//! proposals against ground-truth annotations of a labeled image corpus.
//!
//! The evaluation runs in four stages:
//! - **Overlap**: aligned box overlap (intersection over joint extent) or
//!   oriented polygon IoU
//! - **Matching**: per image, detections claim the best unclaimed ground
//!   truth of their category, lowest score first
//! - **Aggregation**: one overlap record per detection, over all images,
//!   optionally in parallel
//! - **Evaluation**: precision/recall curves and Average Precision per IoU
//!   threshold, overall or per category, optionally averaged over thresholds
//!
//! ## Quick Start
//!
//! ```rust
//! use obb_eval::{EvalParams, ObbDataset};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load ground truth and proposals (in actual use)
//! // let mut dataset = ObbDataset::from_file("deepscores_test.json", None)?;
//! // dataset.load_proposals("proposals.json")?;
//!
//! // Evaluate with default parameters
//! // let report = dataset.calculate_metrics(&EvalParams::default())?;
//!
//! // Print results
//! // println!("{}", report.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Proposal Format
//!
//! ```json
//! {
//!   "annotation_set": "deepscores",
//!   "proposals": [
//!     {"bbox": [x0, y0, x1, y1, x2, y2, x3, y3], "cat_id": 25, "img_id": 1, "score": 0.95}
//!   ]
//! }
//! ```
//!
//! Boxes have either 4 coordinates (`xmin, ymin, xmax, ymax`) or 8 (four
//! corner points), the same for every proposal of a file.

pub mod error;
pub mod types;
pub mod loader;
pub mod dataset;
pub mod params;
pub mod threshold;
pub mod stats;
pub mod metrics;
pub mod matching;
pub mod aggregate;
pub mod evaluator;

// Re-export commonly used types and functions
pub use error::{ObbEvalError, Result};
pub use types::{
    Annotation, BoxCoords, BoxKind, Category, Image, MetricsReport, OverlapRecord, Proposal,
    ProposalSet, ScopeMetrics, ThresholdMetrics,
};
pub use dataset::{ImageRef, ImageSelector, ObbDataset};
pub use params::{ApMode, EvalParams};
pub use evaluator::{calculate_metrics, evaluate_overlaps};
pub use threshold::iou_threshold_range;
