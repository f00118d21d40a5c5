//! Core data types for OBB annotations, proposals and evaluation reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A category of the dataset, owned by exactly one annotation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub annotation_set: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<serde_json::Value>,
}

/// An image of the corpus with the ids of the annotations drawn on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub ann_ids: Vec<u64>,
}

/// A ground-truth annotation.
///
/// `cat_ids` holds one category id per annotation set, in the order the
/// dataset declares its annotation sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    /// Axis-aligned box as `[xmin, ymin, xmax, ymax]`.
    pub a_bbox: [f64; 4],
    /// Oriented box as four corner points `[x0, y0, x1, y1, x2, y2, x3, y3]`.
    pub o_bbox: [f64; 8],
    pub cat_ids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    pub img_id: u64,
    #[serde(default)]
    pub comments: String,
}

impl Annotation {
    /// Category id of this annotation within the annotation set at `set_idx`.
    pub fn category_for_set(&self, set_idx: usize) -> Option<u64> {
        self.cat_ids.get(set_idx).copied()
    }

    /// Parse the `key:value;key:value` comment field.
    ///
    /// Segments without exactly one `:` are ignored.
    ///
    /// ```
    /// use obb_eval::types::Annotation;
    ///
    /// let ann = Annotation {
    ///     id: 1,
    ///     a_bbox: [0.0, 0.0, 1.0, 1.0],
    ///     o_bbox: [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
    ///     cat_ids: vec![1],
    ///     area: None,
    ///     img_id: 1,
    ///     comments: "instance:#000a1f;rel_position:-3;".to_string(),
    /// };
    /// let parsed = ann.parsed_comments();
    /// assert_eq!(parsed["instance"], "#000a1f");
    /// assert_eq!(parsed["rel_position"], "-3");
    /// ```
    pub fn parsed_comments(&self) -> BTreeMap<String, String> {
        self.comments
            .split(';')
            .filter_map(|segment| {
                let mut parts = segment.split(':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(key), Some(value), None) => Some((key.to_string(), value.to_string())),
                    _ => None,
                }
            })
            .collect()
    }
}

/// An annotation seen through an annotation-set filter and the class blacklist.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredAnnotation<'a> {
    pub annotation: &'a Annotation,
    /// Surviving category ids, in filter order. Never empty.
    pub cat_ids: Vec<u64>,
}

/// Shape of the boxes of a proposal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxKind {
    /// Four coordinates, `[xmin, ymin, xmax, ymax]`.
    Aligned,
    /// Eight coordinates, four corner points.
    Oriented,
}

impl BoxKind {
    /// Number of coordinates a box of this kind carries.
    pub fn arity(self) -> usize {
        match self {
            BoxKind::Aligned => 4,
            BoxKind::Oriented => 8,
        }
    }

    /// Box kind for a coordinate count, if it is one of the supported ones.
    pub fn from_arity(len: usize) -> Option<Self> {
        match len {
            4 => Some(BoxKind::Aligned),
            8 => Some(BoxKind::Oriented),
            _ => None,
        }
    }
}

/// Coordinates of a detection box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoxCoords {
    Aligned([f64; 4]),
    Oriented([f64; 8]),
}

impl BoxCoords {
    /// Build a box from a flat coordinate slice of length 4 or 8.
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        match coords.len() {
            4 => Some(BoxCoords::Aligned([coords[0], coords[1], coords[2], coords[3]])),
            8 => {
                let mut corners = [0.0; 8];
                corners.copy_from_slice(coords);
                Some(BoxCoords::Oriented(corners))
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> BoxKind {
        match self {
            BoxCoords::Aligned(_) => BoxKind::Aligned,
            BoxCoords::Oriented(_) => BoxKind::Oriented,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            BoxCoords::Aligned(c) => c,
            BoxCoords::Oriented(c) => c,
        }
    }
}

/// A detection produced by the model under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub bbox: BoxCoords,
    pub cat_id: u64,
    /// Position of the owning image in the dataset image list.
    pub img_idx: usize,
    pub score: f64,
}

/// All proposals of one proposal file.
///
/// Every proposal has boxes of the same `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalSet {
    pub annotation_set: String,
    /// Index of `annotation_set` in the dataset annotation sets.
    pub ann_set_idx: usize,
    pub kind: BoxKind,
    pub proposals: Vec<Proposal>,
}

impl ProposalSet {
    pub fn is_oriented(&self) -> bool {
        self.kind == BoxKind::Oriented
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

/// Matching outcome of a single detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapRecord {
    /// Claimed ground-truth annotation, `None` when unmatched.
    pub gt_id: Option<u64>,
    pub overlap: f64,
    pub cat_id: u64,
    pub score: f64,
}

impl OverlapRecord {
    pub fn unmatched(cat_id: u64, score: f64) -> Self {
        Self {
            gt_id: None,
            overlap: 0.0,
            cat_id,
            score,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.gt_id.is_some()
    }

    /// Ground-truth id with `-1` standing for "unmatched", for flat exports.
    pub fn gt_id_or_sentinel(&self) -> i64 {
        self.gt_id.map_or(-1, |id| id as i64)
    }
}

/// Metrics at one IoU threshold (or averaged over several).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    /// Average precision.
    pub ap: f64,
    /// Mean of the precision sequence.
    pub precision: f64,
    /// Mean of the recall sequence.
    pub recall: f64,
}

/// Metrics for a single IoU threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEntry {
    pub iou_threshold: f64,
    pub metrics: ThresholdMetrics,
}

/// Metrics of one report scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMetrics {
    PerThreshold(Vec<ThresholdEntry>),
    Averaged(ThresholdMetrics),
}

impl ScopeMetrics {
    /// Metrics at a given IoU threshold, if reported per threshold.
    pub fn at_threshold(&self, iou_threshold: f64) -> Option<&ThresholdMetrics> {
        match self {
            ScopeMetrics::PerThreshold(entries) => entries
                .iter()
                .find(|e| (e.iou_threshold - iou_threshold).abs() < 1e-9)
                .map(|e| &e.metrics),
            ScopeMetrics::Averaged(_) => None,
        }
    }

    /// The threshold-averaged metrics, if reported averaged.
    pub fn averaged(&self) -> Option<&ThresholdMetrics> {
        match self {
            ScopeMetrics::Averaged(m) => Some(m),
            ScopeMetrics::PerThreshold(_) => None,
        }
    }
}

/// Metrics for a category, or for all categories together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeReport {
    /// `None` for the aggregate over all categories.
    pub category_id: Option<u64>,
    pub metrics: ScopeMetrics,
}

/// Result of a metrics computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub scopes: Vec<ScopeReport>,
}

impl MetricsReport {
    /// The aggregate scope of a non-classwise report.
    pub fn overall(&self) -> Option<&ScopeMetrics> {
        self.scope(None)
    }

    /// The scope of one category in a classwise report.
    pub fn category(&self, category_id: u64) -> Option<&ScopeMetrics> {
        self.scope(Some(category_id))
    }

    fn scope(&self, category_id: Option<u64>) -> Option<&ScopeMetrics> {
        self.scopes
            .iter()
            .find(|s| s.category_id == category_id)
            .map(|s| &s.metrics)
    }

    /// Serialize the report as pretty-printed JSON.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
