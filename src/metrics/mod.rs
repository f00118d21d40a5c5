//! Metrics calculation modules for OBB evaluation.

pub mod overlap;
pub mod precision_recall;
pub mod ap;

pub use overlap::{overlap, overlap_aligned, overlap_oriented};
pub use precision_recall::{
    cumulative_counts, precision_recall_curve, sort_by_confidence, PrecisionRecallCurve,
};
pub use ap::{average_precision, monotonic_envelope};
