//! Matching of a whole proposal set, image by image.

use crate::dataset::ObbDataset;
use crate::error::Result;
use crate::matching::match_image;
use crate::stats::MatchStats;
use crate::types::{OverlapRecord, Proposal, ProposalSet};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Group proposals by image index, keeping proposal file order within an image.
pub fn group_by_image(proposals: &ProposalSet) -> BTreeMap<usize, Vec<&Proposal>> {
    let mut groups: BTreeMap<usize, Vec<&Proposal>> = BTreeMap::new();
    for proposal in &proposals.proposals {
        groups.entry(proposal.img_idx).or_default().push(proposal);
    }
    groups
}

/// Match every image that has proposals and collect one record per proposal.
///
/// Images are independent: each gets its own pool of ground-truth candidates,
/// resolved through the proposal set's annotation set. Records are returned
/// in ascending image index order, each image's records in matching order,
/// whether or not `parallel` is set.
pub fn collect_overlaps(
    dataset: &ObbDataset,
    proposals: &ProposalSet,
    parallel: bool,
) -> Result<(Vec<OverlapRecord>, MatchStats)> {
    let groups: Vec<(usize, Vec<&Proposal>)> = group_by_image(proposals).into_iter().collect();
    let ann_set_idx = proposals.ann_set_idx;

    let per_image: Vec<(Vec<OverlapRecord>, MatchStats)> = if parallel {
        groups
            .par_iter()
            .map(|(img_idx, detections)| match_group(dataset, ann_set_idx, *img_idx, detections))
            .collect::<Result<Vec<_>>>()?
    } else {
        groups
            .iter()
            .map(|(img_idx, detections)| match_group(dataset, ann_set_idx, *img_idx, detections))
            .collect::<Result<Vec<_>>>()?
    };

    let mut records = Vec::with_capacity(proposals.len());
    let mut stats = MatchStats::new();
    for (image_records, image_stats) in per_image {
        records.extend(image_records);
        stats += image_stats;
    }

    info!("{}", stats.summary_string());
    Ok((records, stats))
}

fn match_group(
    dataset: &ObbDataset,
    ann_set_idx: usize,
    img_idx: usize,
    detections: &[&Proposal],
) -> Result<(Vec<OverlapRecord>, MatchStats)> {
    let candidates = dataset.ground_truth_candidates(img_idx, ann_set_idx)?;
    let mut stats = MatchStats::new();
    stats.add_image(candidates.len());

    let records = match_image(detections, candidates);
    for record in &records {
        stats.add_detection(record.is_matched());
    }
    debug!(
        "image {}: {} detections, {} matched",
        img_idx,
        records.len(),
        stats.matched
    );
    Ok((records, stats))
}

/// Split records by category id.
pub fn partition_by_category(records: &[OverlapRecord]) -> BTreeMap<u64, Vec<OverlapRecord>> {
    let mut groups: BTreeMap<u64, Vec<OverlapRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.cat_id).or_default().push(*record);
    }
    groups
}
