//! Counters collected while matching a proposal set against ground truth
//!
//! The corpus aggregator fills one `MatchStats` per image and merges them,
//! so per-image counts can be computed on separate threads.

use std::ops::AddAssign;

/// Statistics of one matching pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Number of images that had at least one detection
    pub images_processed: usize,

    /// Number of detections matched
    pub detections: usize,

    /// Number of detections that claimed a ground-truth instance
    pub matched: usize,

    /// Ground-truth candidates offered to the matcher, over all processed images
    pub ground_truth_candidates: usize,
}

impl MatchStats {
    /// Create a new `MatchStats` with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed image with its candidate count
    pub fn add_image(&mut self, candidates: usize) {
        self.images_processed += 1;
        self.ground_truth_candidates += candidates;
    }

    /// Record one matched detection
    pub fn add_detection(&mut self, claimed: bool) {
        self.detections += 1;
        if claimed {
            self.matched += 1;
        }
    }

    /// Number of detections left unmatched
    pub fn unmatched(&self) -> usize {
        self.detections.saturating_sub(self.matched)
    }

    /// Ground-truth candidates that no detection claimed
    pub fn unclaimed_ground_truth(&self) -> usize {
        self.ground_truth_candidates.saturating_sub(self.matched)
    }

    /// Get a formatted string summary of the statistics
    pub fn summary_string(&self) -> String {
        format!(
            "MatchStats {{ images: {}, detections: {}, matched: {}, unmatched: {}, unclaimed_gt: {} }}",
            self.images_processed,
            self.detections,
            self.matched,
            self.unmatched(),
            self.unclaimed_ground_truth()
        )
    }
}

impl AddAssign for MatchStats {
    fn add_assign(&mut self, other: Self) {
        self.images_processed += other.images_processed;
        self.detections += other.detections;
        self.matched += other.matched;
        self.ground_truth_candidates += other.ground_truth_candidates;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = MatchStats::new();
        assert_eq!(stats.detections, 0);
        assert_eq!(stats.unmatched(), 0);
        assert_eq!(stats.unclaimed_ground_truth(), 0);
    }

    #[test]
    fn test_counters() {
        let mut stats = MatchStats::new();
        stats.add_image(3);
        stats.add_detection(true);
        stats.add_detection(false);
        stats.add_detection(false);

        assert_eq!(stats.images_processed, 1);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.unmatched(), 2);
        assert_eq!(stats.unclaimed_ground_truth(), 2);
    }

    #[test]
    fn test_merge() {
        let mut a = MatchStats::new();
        a.add_image(1);
        a.add_detection(true);
        let mut b = MatchStats::new();
        b.add_image(2);
        b.add_detection(false);

        a += b;
        assert_eq!(a.images_processed, 2);
        assert_eq!(a.detections, 2);
        assert_eq!(a.ground_truth_candidates, 3);
    }

    #[test]
    fn test_summary_string() {
        let mut stats = MatchStats::new();
        stats.add_image(4);
        stats.add_detection(true);

        let summary = stats.summary_string();
        assert!(summary.contains("images: 1"));
        assert!(summary.contains("unclaimed_gt: 3"));
    }
}
