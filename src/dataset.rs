//! The annotation and proposal store.
//!
//! An [`ObbDataset`] is loaded once and then only read by the evaluation
//! engine. The annotation-set filter and the class blacklist shape what the
//! query methods return; they are set before evaluation, never during it.

use crate::aggregate::collect_overlaps;
use crate::error::{ObbEvalError, Result};
use crate::evaluator::calculate_metrics;
use crate::loader::{
    load_annotations_from_file, load_annotations_from_str, load_proposals_from_file,
    load_proposals_from_str, AnnotationData,
};
use crate::matching::GtCandidate;
use crate::params::EvalParams;
use crate::types::{
    Annotation, Category, FilteredAnnotation, Image, MetricsReport, OverlapRecord, Proposal,
    ProposalSet,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Several images, either by position in the image list or by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSelector {
    Indices(Vec<usize>),
    Ids(Vec<u64>),
}

impl ImageSelector {
    /// Build a selector from two optional arguments of which exactly one must be given.
    ///
    /// ```
    /// use obb_eval::dataset::ImageSelector;
    ///
    /// assert!(ImageSelector::from_args(Some(vec![0]), None).is_ok());
    /// assert!(ImageSelector::from_args(Some(vec![0]), Some(vec![1])).is_err());
    /// assert!(ImageSelector::from_args(None, None).is_err());
    /// ```
    pub fn from_args(idxs: Option<Vec<usize>>, ids: Option<Vec<u64>>) -> Result<Self> {
        match (idxs, ids) {
            (Some(idxs), None) => Ok(ImageSelector::Indices(idxs)),
            (None, Some(ids)) => Ok(ImageSelector::Ids(ids)),
            _ => Err(exclusive_args_error()),
        }
    }
}

/// A single image, either by position in the image list or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRef {
    Index(usize),
    Id(u64),
}

impl ImageRef {
    /// Build a reference from two optional arguments of which exactly one must be given.
    pub fn from_args(idx: Option<usize>, id: Option<u64>) -> Result<Self> {
        match (idx, id) {
            (Some(idx), None) => Ok(ImageRef::Index(idx)),
            (None, Some(id)) => Ok(ImageRef::Id(id)),
            _ => Err(exclusive_args_error()),
        }
    }
}

fn exclusive_args_error() -> ObbEvalError {
    ObbEvalError::InvalidUsage(
        "Exactly one of indices or ids must be given; only one type of request can be done at a time"
            .to_string(),
    )
}

/// Oriented bounding box dataset with optional proposals.
#[derive(Debug, Clone)]
pub struct ObbDataset {
    info: serde_json::Value,
    annotation_sets: Vec<String>,
    categories: BTreeMap<u64, Category>,
    images: Vec<Image>,
    img_idx_lookup: HashMap<u64, usize>,
    annotations: BTreeMap<u64, Annotation>,
    chosen_ann_sets: Vec<String>,
    class_blacklist: Vec<String>,
    blacklist_ids: HashSet<u64>,
    proposals: Option<ProposalSet>,
}

impl ObbDataset {
    /// Build a dataset from validated annotation data.
    ///
    /// `annotation_set_filter` restricts later queries to one annotation set;
    /// `None` keeps all sets.
    pub fn new(data: AnnotationData, annotation_set_filter: Option<&str>) -> Result<Self> {
        let mut dataset = Self {
            info: data.info,
            chosen_ann_sets: data.annotation_sets.clone(),
            annotation_sets: data.annotation_sets,
            categories: data.categories,
            images: Vec::new(),
            img_idx_lookup: HashMap::new(),
            annotations: data.annotations,
            class_blacklist: Vec::new(),
            blacklist_ids: HashSet::new(),
            proposals: None,
        };
        dataset.set_images(data.images);
        if let Some(filter) = annotation_set_filter {
            dataset.set_annotation_set_filter(&[filter])?;
        }
        Ok(dataset)
    }

    /// Load a dataset from an annotation file.
    pub fn from_file<P: AsRef<Path>>(path: P, annotation_set_filter: Option<&str>) -> Result<Self> {
        Self::new(load_annotations_from_file(path)?, annotation_set_filter)
    }

    /// Load a dataset from an annotation JSON string.
    pub fn from_json_str(json: &str, annotation_set_filter: Option<&str>) -> Result<Self> {
        Self::new(load_annotations_from_str(json)?, annotation_set_filter)
    }

    /// Load proposals from a file, replacing any loaded before.
    pub fn load_proposals<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let proposals = load_proposals_from_file(path, self)?;
        self.proposals = Some(proposals);
        Ok(())
    }

    /// Load proposals from a JSON string, replacing any loaded before.
    pub fn load_proposals_str(&mut self, json: &str) -> Result<()> {
        let proposals = load_proposals_from_str(json, self)?;
        self.proposals = Some(proposals);
        Ok(())
    }

    /// Attach an already built proposal set.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if a proposal points past the image list or has a box
    /// of a different kind than the set.
    pub fn set_proposals(&mut self, proposals: ProposalSet) -> Result<()> {
        self.annotation_set_index(&proposals.annotation_set)?;
        if let Some(bad) = proposals
            .proposals
            .iter()
            .find(|p| p.img_idx >= self.images.len() || p.bbox.kind() != proposals.kind)
        {
            return Err(ObbEvalError::InvalidInput(format!(
                "Proposal for image index {} does not fit the dataset or the proposal set box kind",
                bad.img_idx
            )));
        }
        self.proposals = Some(proposals);
        Ok(())
    }

    pub fn proposals(&self) -> Option<&ProposalSet> {
        self.proposals.as_ref()
    }

    fn set_images(&mut self, images: Vec<Image>) {
        self.img_idx_lookup = images
            .iter()
            .enumerate()
            .map(|(idx, img)| (img.id, idx))
            .collect();
        self.images = images;
    }

    pub fn info(&self) -> &serde_json::Value {
        &self.info
    }

    pub fn annotation_sets(&self) -> &[String] {
        &self.annotation_sets
    }

    /// Position of an annotation set in the dataset's annotation sets.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for an unknown name.
    pub fn annotation_set_index(&self, name: &str) -> Result<usize> {
        self.annotation_sets
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| {
                ObbEvalError::InvalidConfiguration(format!(
                    "The annotation set '{}' is not in the available annotation sets {:?}",
                    name, self.annotation_sets
                ))
            })
    }

    /// Annotation sets that queries currently return.
    pub fn annotation_set_filter(&self) -> &[String] {
        &self.chosen_ann_sets
    }

    /// Restrict future queries to the given annotation sets.
    pub fn set_annotation_set_filter<S: AsRef<str>>(&mut self, filter: &[S]) -> Result<()> {
        let chosen = filter
            .iter()
            .map(|name| {
                self.annotation_set_index(name.as_ref())
                    .map(|_| name.as_ref().to_string())
            })
            .collect::<Result<Vec<_>>>()?;
        self.chosen_ann_sets = chosen;
        Ok(())
    }

    /// Ignore every category with one of the given names.
    ///
    /// Blacklisted ground truth is never matched and is left out of the
    /// ground-truth counts. Proposals of a blacklisted class are kept: they
    /// count as false positives in the overall scope and get their own scope,
    /// with AP 0, in classwise mode.
    pub fn set_class_blacklist<S: AsRef<str>>(&mut self, names: &[S]) {
        self.class_blacklist = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.blacklist_ids = self
            .categories
            .values()
            .filter(|c| self.class_blacklist.contains(&c.name))
            .map(|c| c.id)
            .collect();
    }

    pub fn class_blacklist(&self) -> &[String] {
        &self.class_blacklist
    }

    pub fn is_blacklisted(&self, cat_id: u64) -> bool {
        self.blacklist_ids.contains(&cat_id)
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn annotations(&self) -> &BTreeMap<u64, Annotation> {
        &self.annotations
    }

    pub fn categories(&self) -> &BTreeMap<u64, Category> {
        &self.categories
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Position of an image in the image list.
    pub fn image_index(&self, img_id: u64) -> Option<usize> {
        self.img_idx_lookup.get(&img_id).copied()
    }

    fn resolve_image(&self, image: ImageRef) -> Result<usize> {
        match image {
            ImageRef::Index(idx) if idx < self.images.len() => Ok(idx),
            ImageRef::Index(idx) => Err(ObbEvalError::InvalidInput(format!(
                "Image index {} out of range ({} images)",
                idx,
                self.images.len()
            ))),
            ImageRef::Id(id) => self
                .image_index(id)
                .ok_or_else(|| ObbEvalError::InvalidInput(format!("Unknown image id {}", id))),
        }
    }

    fn resolve_images(&self, selector: &ImageSelector) -> Result<Vec<usize>> {
        match selector {
            ImageSelector::Indices(idxs) => idxs
                .iter()
                .map(|&idx| self.resolve_image(ImageRef::Index(idx)))
                .collect(),
            ImageSelector::Ids(ids) => ids
                .iter()
                .map(|&id| self.resolve_image(ImageRef::Id(id)))
                .collect(),
        }
    }

    /// Images at the given positions or with the given ids.
    pub fn get_imgs(&self, selector: &ImageSelector) -> Result<Vec<&Image>> {
        Ok(self
            .resolve_images(selector)?
            .into_iter()
            .map(|idx| &self.images[idx])
            .collect())
    }

    /// Annotations by id, seen through an annotation-set filter and the blacklist.
    ///
    /// Each annotation keeps the category ids of the selected sets (in filter
    /// order) that are not blacklisted. Annotations left without any category
    /// are dropped.
    ///
    /// # Arguments
    ///
    /// * `ann_ids` - Annotation ids, in the order results are returned
    /// * `ann_set_filter` - Annotation sets to use; `None` uses the dataset filter
    pub fn get_ann_ids(
        &self,
        ann_ids: &[u64],
        ann_set_filter: Option<&[String]>,
    ) -> Result<Vec<FilteredAnnotation<'_>>> {
        let filter = ann_set_filter.unwrap_or(self.chosen_ann_sets.as_slice());
        let set_idxs = filter
            .iter()
            .map(|name| self.annotation_set_index(name))
            .collect::<Result<Vec<_>>>()?;

        let mut selected = Vec::with_capacity(ann_ids.len());
        for id in ann_ids {
            let annotation = self
                .annotations
                .get(id)
                .ok_or_else(|| ObbEvalError::InvalidInput(format!("Unknown annotation id {}", id)))?;
            let cat_ids: Vec<u64> = set_idxs
                .iter()
                .filter_map(|&idx| annotation.category_for_set(idx))
                .filter(|cat| !self.is_blacklisted(*cat))
                .collect();
            if !cat_ids.is_empty() {
                selected.push(FilteredAnnotation {
                    annotation,
                    cat_ids,
                });
            }
        }
        Ok(selected)
    }

    /// Filtered annotations of one image.
    pub fn get_anns(
        &self,
        image: ImageRef,
        ann_set_filter: Option<&[String]>,
    ) -> Result<Vec<FilteredAnnotation<'_>>> {
        let idx = self.resolve_image(image)?;
        self.get_ann_ids(&self.images[idx].ann_ids, ann_set_filter)
    }

    /// Images together with their filtered annotations.
    pub fn get_img_ann_pair(
        &self,
        selector: &ImageSelector,
        ann_set_filter: Option<&[String]>,
    ) -> Result<Vec<(&Image, Vec<FilteredAnnotation<'_>>)>> {
        self.resolve_images(selector)?
            .into_iter()
            .map(|idx| {
                let img = &self.images[idx];
                Ok((img, self.get_ann_ids(&img.ann_ids, ann_set_filter)?))
            })
            .collect()
    }

    /// Categories of the filtered annotation sets, minus blacklisted classes.
    pub fn get_cats(&self) -> BTreeMap<u64, &Category> {
        self.categories
            .iter()
            .filter(|(_, c)| {
                self.chosen_ann_sets.contains(&c.annotation_set)
                    && !self.class_blacklist.contains(&c.name)
            })
            .map(|(&id, c)| (id, c))
            .collect()
    }

    /// Proposals of the selected images, in proposal file order.
    ///
    /// # Errors
    ///
    /// `InvalidUsage` if no proposals are loaded.
    pub fn get_img_props(&self, selector: &ImageSelector) -> Result<Vec<&Proposal>> {
        let proposals = self.require_proposals()?;
        let idxs: HashSet<usize> = self.resolve_images(selector)?.into_iter().collect();
        Ok(proposals
            .proposals
            .iter()
            .filter(|p| idxs.contains(&p.img_idx))
            .collect())
    }

    pub(crate) fn require_proposals(&self) -> Result<&ProposalSet> {
        self.proposals.as_ref().ok_or_else(|| {
            ObbEvalError::InvalidUsage("Proposals must be loaded before this operation".to_string())
        })
    }

    /// Number of annotations per category name.
    ///
    /// Categories come from the filtered annotation sets minus the blacklist;
    /// annotations are counted through the first filtered set.
    pub fn class_occurrences(&self) -> BTreeMap<String, usize> {
        let set_idx = self
            .chosen_ann_sets
            .first()
            .and_then(|name| self.annotation_set_index(name).ok());

        let mut counts: HashMap<u64, usize> = HashMap::new();
        if let Some(set_idx) = set_idx {
            for ann in self.annotations.values() {
                if let Some(cat) = ann.category_for_set(set_idx) {
                    *counts.entry(cat).or_insert(0) += 1;
                }
            }
        }

        self.get_cats()
            .into_iter()
            .map(|(id, c)| (c.name.clone(), counts.get(&id).copied().unwrap_or(0)))
            .collect()
    }

    /// Ground truth of one image as matcher candidates.
    ///
    /// Each annotation is resolved to its category in the annotation set at
    /// `ann_set_idx`; blacklisted annotations are left out. Candidates keep
    /// the order of the image's annotation ids.
    pub fn ground_truth_candidates(&self, img_idx: usize, ann_set_idx: usize) -> Result<Vec<GtCandidate>> {
        let idx = self.resolve_image(ImageRef::Index(img_idx))?;
        let mut candidates = Vec::with_capacity(self.images[idx].ann_ids.len());
        for id in &self.images[idx].ann_ids {
            let ann = self
                .annotations
                .get(id)
                .ok_or_else(|| ObbEvalError::InvalidInput(format!("Unknown annotation id {}", id)))?;
            match ann.category_for_set(ann_set_idx) {
                Some(cat_id) if !self.is_blacklisted(cat_id) => candidates.push(GtCandidate {
                    id: ann.id,
                    cat_id,
                    a_bbox: ann.a_bbox,
                    o_bbox: ann.o_bbox,
                }),
                _ => {}
            }
        }
        Ok(candidates)
    }

    /// Number of ground-truth annotations in scope of an evaluation.
    ///
    /// Annotations are resolved through the annotation set at `ann_set_idx`;
    /// blacklisted ones are not counted. With `category`, only annotations of
    /// that category are counted.
    pub fn ground_truth_count(&self, ann_set_idx: usize, category: Option<u64>) -> usize {
        self.annotations
            .values()
            .filter_map(|ann| ann.category_for_set(ann_set_idx))
            .filter(|cat| !self.is_blacklisted(*cat))
            .filter(|cat| category.map_or(true, |c| c == *cat))
            .count()
    }

    /// Raw per-detection overlap records of the loaded proposals.
    pub fn overlaps(&self, parallel: bool) -> Result<Vec<OverlapRecord>> {
        let proposals = self.require_proposals()?;
        let (records, _) = collect_overlaps(self, proposals, parallel)?;
        Ok(records)
    }

    /// Evaluate the loaded proposals.
    pub fn calculate_metrics(&self, params: &EvalParams) -> Result<MetricsReport> {
        calculate_metrics(self, params)
    }
}

impl fmt::Display for ObbDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<Oriented Bounding Box Dataset>")?;
        writeln!(f, "Num images: {}", self.images.len())?;
        writeln!(f, "Num anns: {}", self.annotations.len())?;
        write!(f, "Num cats: {}", self.categories.len())?;
        match &self.proposals {
            Some(p) => write!(f, "\nNum proposals: {} ({})", p.len(), p.annotation_set),
            None => write!(f, "\nNo proposals loaded."),
        }
    }
}
