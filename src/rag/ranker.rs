//! Hybrid re-ranking of retrieved candidates.
//!
//! The candidate store orders by raw cosine similarity only. Here each
//! candidate gets a secondary boost from how many of the requested tags it
//! carries:
//!
//!   score(c) = similarity(c) + boost(requested, tags(c)) * weight
//!
//! With the default linear strategy the boost is the fraction of requested
//! tags present on the candidate, so full overlap adds exactly `weight`
//! (0.2 by default) and no overlap adds nothing. The boost only reorders an
//! already tag-filtered set; candidates without overlap are never dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::bookmarks::{normalize_tag, Candidate, Match};
use crate::config::{QueryConfig, DEFAULT_TOP_K};

/// Maximum score shift contributed by tag overlap.
pub const BOOST_WEIGHT: f32 = 0.2;

/// How tag overlap is turned into a boost in `[0, 1]` before weighting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostStrategy {
    /// |requested ∩ candidate| / |requested|
    #[default]
    Linear,
    /// |requested ∩ candidate| / |requested ∪ candidate|
    Jaccard,
}

impl BoostStrategy {
    /// Overlap fraction between `requested` (already normalized and
    /// deduplicated) and a candidate's tags.
    pub fn overlap(&self, requested: &[String], candidate_tags: &[String]) -> f32 {
        if requested.is_empty() {
            return 0.0;
        }

        let candidate: HashSet<String> = candidate_tags.iter().map(|t| normalize_tag(t)).collect();
        let shared = requested.iter().filter(|t| candidate.contains(*t)).count();

        match self {
            BoostStrategy::Linear => shared as f32 / requested.len() as f32,
            BoostStrategy::Jaccard => {
                let union = requested.len() + candidate.len() - shared;
                if union == 0 {
                    0.0
                } else {
                    shared as f32 / union as f32
                }
            }
        }
    }
}

/// Scores, sorts and truncates candidates.
#[derive(Clone, Debug, PartialEq)]
pub struct HybridRanker {
    top_k: usize,
    boost_weight: f32,
    strategy: BoostStrategy,
}

impl Default for HybridRanker {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl HybridRanker {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            boost_weight: BOOST_WEIGHT,
            strategy: BoostStrategy::Linear,
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(config.top_k)
            .with_boost_weight(config.boost_weight)
            .with_strategy(config.boost_strategy)
    }

    pub fn with_boost_weight(mut self, boost_weight: f32) -> Self {
        self.boost_weight = boost_weight;
        self
    }

    pub fn with_strategy(mut self, strategy: BoostStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Boost a single candidate would receive for `requested` tags.
    pub fn tag_boost(&self, requested: &[String], candidate_tags: &[String]) -> f32 {
        self.strategy.overlap(requested, candidate_tags) * self.boost_weight
    }

    /// Ranks `candidates` against `requested` tags (normalized, deduplicated).
    ///
    /// Sorting is stable, so equal scores keep the store's order.
    /// Candidates with a NaN similarity are dropped. Returns at most `top_k`
    /// matches.
    pub fn rank(&self, candidates: Vec<Candidate>, requested: &[String]) -> Vec<Match> {
        let mut matches: Vec<Match> = candidates
            .into_iter()
            .filter(|candidate| {
                if candidate.similarity.is_nan() {
                    log::warn!("dropping candidate {} with NaN similarity", candidate.bookmark.id);
                    return false;
                }
                true
            })
            .map(|candidate| {
                let boost = self.tag_boost(requested, &candidate.bookmark.tags);
                Match {
                    score: candidate.similarity + boost,
                    bookmark: candidate.bookmark,
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(self.top_k);

        matches
    }
}
