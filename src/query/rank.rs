//! Deduplication and ranking of pairwise match records per disease.

use indexmap::IndexMap;

use crate::query::classify::{ClassifiedQuery, SetInterpretation};
use crate::query::semsim::MatchRecord;

/// One qualifying disease with its retained best matches.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDiseaseResult {
    /// The disease identifier (aggregation key).
    pub disease_id: String,
    /// Name of the disease, when reported upstream.
    pub disease_name: Option<String>,
    /// Category of the disease.
    pub disease_category: String,
    /// Upstream source of the disease annotation.
    pub provided_by: Option<String>,
    /// Sum of the retained per-term best scores.
    pub aggregate_score: f64,
    /// Retained matches, at most one per distinct query term, in
    /// first-seen order.
    pub matches: Vec<MatchRecord>,
}

/// Deduplicate, qualify, and rank `records` against the classified query.
///
/// Per disease, only the highest-scoring match per distinct query term is
/// retained (ties keep the first-seen record).  Under ALL interpretation a
/// disease qualifies only when every normalized member term has a retained
/// match; under MANY one suffices.  Results are ordered by descending
/// aggregate score, ties by ascending disease id, and truncated to `limit`
/// only after ordering.
pub fn rank(
    records: Vec<MatchRecord>,
    query: &ClassifiedQuery,
    limit: usize,
) -> Vec<RankedDiseaseResult> {
    let mut by_disease: IndexMap<String, IndexMap<String, MatchRecord>> = IndexMap::new();
    for record in records {
        // Matches for terms outside the normalized member list cannot
        // contribute to qualification; drop them up front.
        if !query.members.contains(&record.query_term_id) {
            continue;
        }
        let per_term = by_disease.entry(record.disease_id.clone()).or_default();
        match per_term.entry(record.query_term_id.clone()) {
            indexmap::map::Entry::Occupied(mut occupied) => {
                if record.score > occupied.get().score {
                    occupied.insert(record);
                }
            }
            indexmap::map::Entry::Vacant(vacant) => {
                vacant.insert(record);
            }
        }
    }

    let mut results = Vec::new();
    for (disease_id, per_term) in by_disease {
        let qualifies = match query.interpretation {
            SetInterpretation::All => query
                .members
                .iter()
                .all(|member| per_term.contains_key(member)),
            SetInterpretation::Many => query
                .members
                .iter()
                .any(|member| per_term.contains_key(member)),
        };
        if !qualifies {
            continue;
        }

        let matches: Vec<MatchRecord> = per_term.into_values().collect();
        let Some(first) = matches.first() else {
            continue;
        };
        let aggregate_score = matches.iter().map(|record| record.score).sum();
        results.push(RankedDiseaseResult {
            disease_name: first.disease_name.clone(),
            disease_category: first.disease_category.clone(),
            provided_by: first.provided_by.clone(),
            disease_id,
            aggregate_score,
            matches,
        });
    }

    results.sort_by(|a, b| {
        b.aggregate_score
            .partial_cmp(&a.aggregate_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.disease_id.cmp(&b.disease_id))
    });
    results.truncate(limit);
    results
}
