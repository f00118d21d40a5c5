//! JSON loading utilities for OBB annotation and proposal files.
//!
//! Annotation files carry the dataset (annotation sets, categories, images,
//! annotations); proposal files carry the detections of one model run for a
//! single annotation set. Ids may be written as JSON numbers or as decimal
//! strings.

use crate::dataset::ObbDataset;
use crate::error::{ObbEvalError, Result};
use crate::types::{Annotation, BoxCoords, BoxKind, Category, Image, Proposal, ProposalSet};
use log::{info, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(u64),
    Str(String),
}

impl RawId {
    fn resolve(&self, what: &str) -> Result<u64> {
        match self {
            RawId::Num(n) => Ok(*n),
            RawId::Str(s) => s.trim().parse().map_err(|_| {
                ObbEvalError::InvalidInput(format!("{} '{}' is not an integer id", what, s))
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAnnotationFile {
    #[serde(default)]
    info: serde_json::Value,
    annotation_sets: Vec<String>,
    categories: BTreeMap<String, RawCategory>,
    images: Vec<RawImage>,
    annotations: BTreeMap<String, RawAnnotation>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: String,
    annotation_set: String,
    #[serde(default)]
    color: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    id: RawId,
    filename: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    ann_ids: Vec<RawId>,
}

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    a_bbox: Vec<f64>,
    o_bbox: Vec<f64>,
    cat_id: Vec<RawId>,
    #[serde(default)]
    area: Option<f64>,
    img_id: RawId,
    #[serde(default)]
    comments: String,
}

#[derive(Debug, Deserialize)]
struct RawProposalFile {
    annotation_set: String,
    proposals: Vec<RawProposal>,
}

#[derive(Debug, Deserialize)]
struct RawProposal {
    bbox: Vec<f64>,
    cat_id: RawId,
    img_id: RawId,
    score: f64,
}

/// Validated contents of an annotation file.
#[derive(Debug, Clone)]
pub struct AnnotationData {
    pub info: serde_json::Value,
    pub annotation_sets: Vec<String>,
    pub categories: BTreeMap<u64, Category>,
    pub images: Vec<Image>,
    pub annotations: BTreeMap<u64, Annotation>,
}

/// Load an annotation file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// annotations are malformed (see [`load_annotations_from_str`]).
pub fn load_annotations_from_file<P: AsRef<Path>>(path: P) -> Result<AnnotationData> {
    info!("loading annotations from {}...", path.as_ref().display());
    let start = Instant::now();

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let raw: RawAnnotationFile = serde_json::from_reader(reader)?;
    let data = validate_annotations(raw)?;

    info!("done! t={:.2}s", start.elapsed().as_secs_f64());
    Ok(data)
}

/// Load annotations from a JSON string.
///
/// # Errors
///
/// `InvalidInput` when an aligned box does not have 4 coordinates, an
/// oriented box does not have 8, an annotation does not carry exactly one
/// category id per annotation set, a category id is unknown, an image lists
/// an unknown annotation or two images share an id.
///
/// # Example
///
/// ```
/// use obb_eval::loader::load_annotations_from_str;
///
/// let json = r#"{
///     "annotation_sets": ["deepscores"],
///     "categories": {"1": {"name": "notehead", "annotation_set": "deepscores"}},
///     "images": [{"id": 1, "filename": "page.png", "ann_ids": ["7"]}],
///     "annotations": {"7": {
///         "a_bbox": [0, 0, 10, 10],
///         "o_bbox": [0, 0, 10, 0, 10, 10, 0, 10],
///         "cat_id": ["1"], "img_id": "1", "comments": ""
///     }}
/// }"#;
/// let data = load_annotations_from_str(json).unwrap();
/// assert_eq!(data.annotations[&7].cat_ids, vec![1]);
/// ```
pub fn load_annotations_from_str(json: &str) -> Result<AnnotationData> {
    let raw: RawAnnotationFile = serde_json::from_str(json)?;
    validate_annotations(raw)
}

/// Load a proposal file for a dataset.
///
/// The dataset resolves the proposal annotation set and image ids.
pub fn load_proposals_from_file<P: AsRef<Path>>(path: P, dataset: &ObbDataset) -> Result<ProposalSet> {
    info!("loading proposals from {}...", path.as_ref().display());
    let start = Instant::now();

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let raw: RawProposalFile = serde_json::from_reader(reader)?;
    let proposals = validate_proposals(raw, dataset)?;

    info!(
        "done! t={:.2}s ({} proposals)",
        start.elapsed().as_secs_f64(),
        proposals.len()
    );
    Ok(proposals)
}

/// Load proposals from a JSON string.
///
/// # Errors
///
/// * `InvalidConfiguration` if the annotation set is not one of the dataset's
/// * `InvalidInput` if a box has neither 4 nor 8 coordinates, if box lengths
///   differ between proposals, or if an image id is unknown
pub fn load_proposals_from_str(json: &str, dataset: &ObbDataset) -> Result<ProposalSet> {
    let raw: RawProposalFile = serde_json::from_str(json)?;
    validate_proposals(raw, dataset)
}

fn validate_annotations(raw: RawAnnotationFile) -> Result<AnnotationData> {
    if raw.annotation_sets.is_empty() {
        return Err(ObbEvalError::InvalidInput(
            "Dataset must declare at least one annotation set".to_string(),
        ));
    }

    let mut categories = BTreeMap::new();
    for (key, cat) in raw.categories {
        let id = RawId::Str(key).resolve("category id")?;
        if !raw.annotation_sets.contains(&cat.annotation_set) {
            warn!(
                "category {} ({}) belongs to undeclared annotation set '{}'",
                id, cat.name, cat.annotation_set
            );
        }
        categories.insert(
            id,
            Category {
                id,
                name: cat.name,
                annotation_set: cat.annotation_set,
                color: cat.color,
            },
        );
    }

    let num_sets = raw.annotation_sets.len();
    let mut annotations = BTreeMap::new();
    for (key, ann) in raw.annotations {
        let id = RawId::Str(key).resolve("annotation id")?;
        annotations.insert(id, validate_annotation(id, ann, num_sets, &categories)?);
    }

    let mut seen_images = HashSet::new();
    let mut images = Vec::with_capacity(raw.images.len());
    for img in raw.images {
        let id = img.id.resolve("image id")?;
        if !seen_images.insert(id) {
            return Err(ObbEvalError::InvalidInput(format!("Duplicate image id {}", id)));
        }
        let ann_ids = img
            .ann_ids
            .iter()
            .map(|a| a.resolve("annotation id"))
            .collect::<Result<Vec<_>>>()?;
        if let Some(missing) = ann_ids.iter().find(|a| !annotations.contains_key(a)) {
            return Err(ObbEvalError::InvalidInput(format!(
                "Image {} references unknown annotation {}",
                id, missing
            )));
        }
        images.push(Image {
            id,
            filename: img.filename,
            width: img.width,
            height: img.height,
            ann_ids,
        });
    }

    let orphans = annotations
        .values()
        .filter(|a| !seen_images.contains(&a.img_id))
        .count();
    if orphans > 0 {
        warn!("{} annotations belong to images that are not listed", orphans);
    }

    Ok(AnnotationData {
        info: raw.info,
        annotation_sets: raw.annotation_sets,
        categories,
        images,
        annotations,
    })
}

fn validate_annotation(
    id: u64,
    ann: RawAnnotation,
    num_sets: usize,
    categories: &BTreeMap<u64, Category>,
) -> Result<Annotation> {
    let a_bbox: [f64; 4] = ann.a_bbox.as_slice().try_into().map_err(|_| {
        ObbEvalError::InvalidInput(format!(
            "Annotation {} has invalid a_bbox length: {}",
            id,
            ann.a_bbox.len()
        ))
    })?;
    let o_bbox: [f64; 8] = ann.o_bbox.as_slice().try_into().map_err(|_| {
        ObbEvalError::InvalidInput(format!(
            "Annotation {} has invalid o_bbox length: {}",
            id,
            ann.o_bbox.len()
        ))
    })?;

    if ann.cat_id.len() != num_sets {
        return Err(ObbEvalError::InvalidInput(format!(
            "Annotation {} has {} category ids for {} annotation sets",
            id,
            ann.cat_id.len(),
            num_sets
        )));
    }
    let cat_ids = ann
        .cat_id
        .iter()
        .map(|c| c.resolve("category id"))
        .collect::<Result<Vec<_>>>()?;
    if let Some(unknown) = cat_ids.iter().find(|c| !categories.contains_key(c)) {
        return Err(ObbEvalError::InvalidInput(format!(
            "Annotation {} references unknown category {}",
            id, unknown
        )));
    }

    Ok(Annotation {
        id,
        a_bbox,
        o_bbox,
        cat_ids,
        area: ann.area,
        img_id: ann.img_id.resolve("image id")?,
        comments: ann.comments,
    })
}

fn validate_proposals(raw: RawProposalFile, dataset: &ObbDataset) -> Result<ProposalSet> {
    let ann_set_idx = dataset.annotation_set_index(&raw.annotation_set)?;

    let kind = match raw.proposals.first() {
        Some(first) => BoxKind::from_arity(first.bbox.len()).ok_or_else(|| {
            ObbEvalError::InvalidInput(format!(
                "bbox proposal is malformed: 'bbox' must have a length of 4 or 8, got {}",
                first.bbox.len()
            ))
        })?,
        None => BoxKind::Aligned,
    };

    let proposals = raw
        .proposals
        .iter()
        .enumerate()
        .map(|(i, prop)| {
            if prop.bbox.len() != kind.arity() {
                return Err(ObbEvalError::InvalidInput(format!(
                    "Proposal {} has {} coordinates but the proposal set uses {}",
                    i,
                    prop.bbox.len(),
                    kind.arity()
                )));
            }
            let bbox = BoxCoords::from_slice(&prop.bbox).ok_or_else(|| {
                ObbEvalError::InvalidInput(format!("Proposal {} has a malformed bbox", i))
            })?;
            let img_id = prop.img_id.resolve("image id")?;
            let img_idx = dataset.image_index(img_id).ok_or_else(|| {
                ObbEvalError::InvalidInput(format!(
                    "Proposal {} references unknown image {}",
                    i, img_id
                ))
            })?;
            Ok(Proposal {
                bbox,
                cat_id: prop.cat_id.resolve("category id")?,
                img_idx,
                score: prop.score,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ProposalSet {
        annotation_set: raw.annotation_set,
        ann_set_idx,
        kind,
        proposals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"{
        "info": {"description": "test"},
        "annotation_sets": ["deepscores", "muscima++"],
        "categories": {
            "1": {"name": "notehead", "annotation_set": "deepscores", "color": 1},
            "2": {"name": "noteheadBlack", "annotation_set": "muscima++", "color": 2}
        },
        "images": [
            {"id": "10", "filename": "a.png", "width": 100, "height": 100, "ann_ids": ["1", "2"]},
            {"id": 11, "filename": "b.png", "ann_ids": []}
        ],
        "annotations": {
            "1": {"a_bbox": [0, 0, 10, 10], "o_bbox": [0, 0, 10, 0, 10, 10, 0, 10],
                  "cat_id": ["1", "2"], "area": 100, "img_id": "10", "comments": "instance:#01;"},
            "2": {"a_bbox": [20, 20, 30, 30], "o_bbox": [20, 20, 30, 20, 30, 30, 20, 30],
                  "cat_id": [1, 2], "img_id": 10}
        }
    }"#;

    fn dataset() -> ObbDataset {
        ObbDataset::from_json_str(DATASET, None).unwrap()
    }

    #[test]
    fn test_load_annotations() {
        let data = load_annotations_from_str(DATASET).unwrap();
        assert_eq!(data.annotation_sets.len(), 2);
        assert_eq!(data.categories.len(), 2);
        assert_eq!(data.images[0].id, 10);
        assert_eq!(data.images[0].ann_ids, vec![1, 2]);
        assert_eq!(data.annotations[&2].cat_ids, vec![1, 2]);
        assert_eq!(data.annotations[&1].area, Some(100.0));
    }

    #[test]
    fn test_invalid_a_bbox() {
        let json = DATASET.replace("\"a_bbox\": [0, 0, 10, 10]", "\"a_bbox\": [0, 0, 10]");
        assert!(matches!(
            load_annotations_from_str(&json),
            Err(ObbEvalError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_category_count_mismatch() {
        let json = DATASET.replace("\"cat_id\": [1, 2]", "\"cat_id\": [1]");
        assert!(matches!(
            load_annotations_from_str(&json),
            Err(ObbEvalError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unknown_category() {
        let json = DATASET.replace("\"cat_id\": [1, 2]", "\"cat_id\": [1, 99]");
        assert!(load_annotations_from_str(&json).is_err());
    }

    #[test]
    fn test_load_aligned_proposals() {
        let ds = dataset();
        let json = r#"{"annotation_set": "muscima++", "proposals": [
            {"bbox": [0, 0, 10, 10], "cat_id": 2, "img_id": 11, "score": 0.4}
        ]}"#;
        let props = load_proposals_from_str(json, &ds).unwrap();
        assert_eq!(props.ann_set_idx, 1);
        assert_eq!(props.kind, BoxKind::Aligned);
        assert_eq!(props.proposals[0].img_idx, 1);
    }

    #[test]
    fn test_load_oriented_proposals() {
        let ds = dataset();
        let json = r#"{"annotation_set": "deepscores", "proposals": [
            {"bbox": [0, 0, 10, 0, 10, 10, 0, 10], "cat_id": "1", "img_id": "10", "score": 0.4}
        ]}"#;
        let props = load_proposals_from_str(json, &ds).unwrap();
        assert!(props.is_oriented());
    }

    #[test]
    fn test_bad_arity() {
        let ds = dataset();
        let json = r#"{"annotation_set": "deepscores", "proposals": [
            {"bbox": [0, 0, 10, 10, 5], "cat_id": 1, "img_id": 10, "score": 0.4}
        ]}"#;
        assert!(matches!(
            load_proposals_from_str(json, &ds),
            Err(ObbEvalError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unknown_annotation_set() {
        let ds = dataset();
        let json = r#"{"annotation_set": "nope", "proposals": []}"#;
        assert!(matches!(
            load_proposals_from_str(json, &ds),
            Err(ObbEvalError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_unknown_image() {
        let ds = dataset();
        let json = r#"{"annotation_set": "deepscores", "proposals": [
            {"bbox": [0, 0, 10, 10], "cat_id": 1, "img_id": 404, "score": 0.4}
        ]}"#;
        assert!(matches!(
            load_proposals_from_str(json, &ds),
            Err(ObbEvalError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_proposals() {
        let ds = dataset();
        let json = r#"{"annotation_set": "deepscores", "proposals": []}"#;
        let props = load_proposals_from_str(json, &ds).unwrap();
        assert!(props.is_empty());
        assert_eq!(props.kind, BoxKind::Aligned);
    }
}
