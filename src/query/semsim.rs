//! Client adapter for the external semantic similarity search service.
//!
//! The outbound call carries the normalized input term list; the response is
//! a list of per-disease entries, each with pairwise term-to-term best
//! matches.  Parsing normalizes those into flat [`MatchRecord`] values that
//! the ranking step consumes.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::query::logs::RequestLog;
use crate::query::{UpstreamError, ValidationError};

/// Default number of disease results when the request does not specify one.
pub const DEFAULT_RESULT_LIMIT: i64 = 5;
/// Upper bound on the requestable number of disease results.
pub const MAX_RESULT_LIMIT: i64 = 50;

/// Directionality parameter of the outbound similarity request.  Input terms
/// are the "object" side of the computation, candidate diseases the
/// "subject" side.
pub const DIRECTIONALITY: &str = "object_to_subject";

/// Validate the request-level result limit before any network I/O.
pub fn validate_limit(limit: Option<i64>) -> Result<usize, ValidationError> {
    let limit = limit.unwrap_or(DEFAULT_RESULT_LIMIT);
    if (1..=MAX_RESULT_LIMIT).contains(&limit) {
        Ok(limit as usize)
    } else {
        Err(ValidationError::LimitOutOfRange(limit))
    }
}

/// One pairwise term match reported by the similarity service, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    /// The input query term that matched.
    pub query_term_id: String,
    /// Name of the query term, when reported.
    pub query_term_name: Option<String>,
    /// The disease-associated term the query term was matched to.
    pub matched_term_id: String,
    /// Name of the matched term, when reported.
    pub matched_term_name: Option<String>,
    /// The candidate disease this match contributes to.
    pub disease_id: String,
    /// Name of the disease, when reported.
    pub disease_name: Option<String>,
    /// Category of the disease.
    pub disease_category: String,
    /// Pairwise similarity score.
    pub score: f64,
    /// Common subsumer justifying the match; equals the term itself for a
    /// perfect match.
    pub subsumer_id: String,
    /// Upstream source of the disease annotation, as an `infores` CURIE.
    pub provided_by: Option<String>,
}

/// Outbound search request body.
#[derive(Serialize, Debug, Clone)]
struct SearchRequest<'a> {
    termset: &'a [String],
    group: &'a str,
    directionality: &'a str,
    limit: usize,
}

/// Raw per-disease entry of the similarity search response.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawSearchEntry {
    /// The matched disease.
    #[serde(default)]
    pub subject: RawSubject,
    /// Per-term best matches against this disease.
    #[serde(default)]
    pub similarity: RawSimilarity,
}

/// Raw disease annotation of one search entry.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawSubject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub provided_by: Option<String>,
}

/// Raw similarity block of one search entry.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawSimilarity {
    /// Best match per input query term, keyed by query term id.
    #[serde(default)]
    pub object_best_matches: IndexMap<String, RawBestMatch>,
}

/// Raw pairwise best match.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawBestMatch {
    /// The input query term.
    #[serde(default)]
    pub match_source: Option<String>,
    #[serde(default)]
    pub match_source_label: Option<String>,
    /// The disease-associated term matched against.
    #[serde(default)]
    pub match_target: Option<String>,
    #[serde(default)]
    pub match_target_label: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub similarity: RawPairSimilarity,
}

/// Raw similarity detail carrying the common subsumer.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawPairSimilarity {
    #[serde(default)]
    pub ancestor_id: Option<String>,
}

/// Map a raw upstream `provided_by` value onto an `infores` CURIE.
pub fn normalize_infores(raw: &str) -> String {
    match raw {
        "phenio_nodes" => "infores:upheno".to_string(),
        value if value.starts_with("infores:") => value.to_string(),
        value => format!("infores:{value}"),
    }
}

/// Normalize a raw search response into flat [`MatchRecord`] values.
///
/// A single malformed record (missing required fields, negative score) is
/// skipped with a WARNING entry; the rest of the batch is kept.
pub fn parse_search_response(
    entries: &[RawSearchEntry],
    default_category: &str,
    log: &mut RequestLog,
) -> Vec<MatchRecord> {
    let mut records = Vec::new();
    for entry in entries {
        let Some(disease_id) = entry.subject.id.as_deref().filter(|id| !id.is_empty()) else {
            log.warning(
                None,
                "similarity result entry lacks a subject id, skipping entry",
            );
            continue;
        };
        let disease_category = entry
            .subject
            .category
            .clone()
            .unwrap_or_else(|| default_category.to_string());
        let provided_by = entry
            .subject
            .provided_by
            .as_deref()
            .map(normalize_infores);

        for best_match in entry.similarity.object_best_matches.values() {
            let (Some(query_term_id), Some(matched_term_id), Some(score)) = (
                best_match.match_source.as_deref(),
                best_match.match_target.as_deref(),
                best_match.score,
            ) else {
                log.warning(
                    None,
                    format!(
                        "incomplete best match for disease '{disease_id}' \
                         (source, target, or score missing), skipping record"
                    ),
                );
                continue;
            };
            if score < 0.0 {
                log.warning(
                    None,
                    format!(
                        "negative similarity score {score} for disease '{disease_id}', \
                         skipping record"
                    ),
                );
                continue;
            }

            // A term matching itself is its own subsumer; otherwise use the
            // reported common ancestor, falling back to the matched term.
            let subsumer_id = if query_term_id == matched_term_id {
                query_term_id.to_string()
            } else {
                best_match
                    .similarity
                    .ancestor_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .unwrap_or(matched_term_id)
                    .to_string()
            };

            records.push(MatchRecord {
                query_term_id: query_term_id.to_string(),
                query_term_name: best_match.match_source_label.clone(),
                matched_term_id: matched_term_id.to_string(),
                matched_term_name: best_match.match_target_label.clone(),
                disease_id: disease_id.to_string(),
                disease_name: entry.subject.name.clone(),
                disease_category: disease_category.clone(),
                score,
                subsumer_id,
                provided_by: provided_by.clone(),
            });
        }
    }
    records
}

/// HTTP client for the similarity search endpoint.
///
/// Built once at startup; shared read-only across requests.
#[derive(Debug, Clone)]
pub struct SemsimClient {
    client: reqwest::Client,
    endpoint: String,
    group: String,
}

impl SemsimClient {
    /// Construct a client for `endpoint`, searching within `group`.
    pub fn new(endpoint: String, group: String, timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            group,
        })
    }

    /// The configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one similarity search for `termset`, returning raw entries.
    ///
    /// Transport failures and non-2xx statuses are fatal for the calling
    /// request; no retries are attempted here.
    pub async fn search(
        &self,
        termset: &[String],
        limit: usize,
    ) -> Result<Vec<RawSearchEntry>, UpstreamError> {
        let body = SearchRequest {
            termset,
            group: &self.group,
            directionality: DIRECTIONALITY,
            limit,
        };
        tracing::debug!("similarity search request: {:?}", &body);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Vec<RawSearchEntry>>()
            .await
            .map_err(|source| UpstreamError::Payload {
                url: self.endpoint.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::query::logs::RequestLog;
    use crate::query::ValidationError;
    use crate::trapi::LogLevel;

    use super::{parse_search_response, validate_limit, RawSearchEntry};

    fn raw_entries(json: serde_json::Value) -> Vec<RawSearchEntry> {
        serde_json::from_value(json).expect("valid raw search JSON")
    }

    #[rstest]
    #[case(None, Ok(5))]
    #[case(Some(1), Ok(1))]
    #[case(Some(50), Ok(50))]
    #[case(Some(0), Err(0))]
    #[case(Some(51), Err(51))]
    #[case(Some(-3), Err(-3))]
    fn limit_validation(#[case] limit: Option<i64>, #[case] expected: Result<usize, i64>) {
        match (validate_limit(limit), expected) {
            (Ok(effective), Ok(expected)) => assert_eq!(effective, expected),
            (Err(ValidationError::LimitOutOfRange(seen)), Err(expected)) => {
                assert_eq!(seen, expected)
            }
            (actual, expected) => panic!("unexpected: {actual:?} vs {expected:?}"),
        }
    }

    #[test]
    fn limit_error_has_stable_code() {
        let err = validate_limit(Some(51)).expect_err("must fail");
        assert_eq!(err.code(), "LIMIT_OUT_OF_RANGE");
    }

    #[test]
    fn parses_complete_entries() {
        let entries = raw_entries(serde_json::json!([{
            "subject": {
                "id": "MONDO:0015317",
                "name": "pleural effusion syndrome",
                "category": "biolink:Disease",
                "provided_by": "phenio_nodes",
            },
            "score": 11.26,
            "similarity": {
                "object_best_matches": {
                    "HP:0002104": {
                        "match_source": "HP:0002104",
                        "match_source_label": "Apnea (HPO)",
                        "match_target": "HP:0001699",
                        "match_target_label": "Sudden death (HPO)",
                        "score": 11.26,
                        "similarity": {"ancestor_id": "HP:0025142"},
                    },
                },
            },
        }]));
        let mut log = RequestLog::new();
        let records = parse_search_response(&entries, "biolink:Disease", &mut log);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.query_term_id, "HP:0002104");
        assert_eq!(record.matched_term_id, "HP:0001699");
        assert_eq!(record.disease_id, "MONDO:0015317");
        assert_eq!(record.subsumer_id, "HP:0025142");
        assert_eq!(record.provided_by.as_deref(), Some("infores:upheno"));
        assert!(log.entries().is_empty());
    }

    #[test]
    fn malformed_record_is_skipped_with_warning() {
        let entries = raw_entries(serde_json::json!([{
            "subject": {"id": "MONDO:0015317", "category": "biolink:Disease"},
            "similarity": {
                "object_best_matches": {
                    "HP:0002104": {
                        "match_source": "HP:0002104",
                        // match_target missing
                        "score": 4.2,
                    },
                    "HP:0001063": {
                        "match_source": "HP:0001063",
                        "match_target": "HP:0001063",
                        "score": 7.59,
                    },
                },
            },
        }]));
        let mut log = RequestLog::new();
        let records = parse_search_response(&entries, "biolink:Disease", &mut log);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query_term_id, "HP:0001063");
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].level, LogLevel::Warning);
        assert!(!log.halted());
    }

    #[test]
    fn entry_without_subject_id_is_skipped() {
        let entries = raw_entries(serde_json::json!([
            {"similarity": {"object_best_matches": {}}},
            {
                "subject": {"id": "MONDO:0008807"},
                "similarity": {
                    "object_best_matches": {
                        "HP:0012378": {
                            "match_source": "HP:0012378",
                            "match_target": "HP:0012378",
                            "score": 1.0,
                        },
                    },
                },
            },
        ]));
        let mut log = RequestLog::new();
        let records = parse_search_response(&entries, "biolink:Disease", &mut log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].disease_id, "MONDO:0008807");
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn perfect_match_subsumes_itself() {
        let entries = raw_entries(serde_json::json!([{
            "subject": {"id": "MONDO:0015317"},
            "similarity": {
                "object_best_matches": {
                    "HP:0001063": {
                        "match_source": "HP:0001063",
                        "match_target": "HP:0001063",
                        "score": 7.59,
                        "similarity": {"ancestor_id": "HP:0000001"},
                    },
                },
            },
        }]));
        let mut log = RequestLog::new();
        let records = parse_search_response(&entries, "biolink:Disease", &mut log);
        assert_eq!(records[0].subsumer_id, "HP:0001063");
    }

    #[test]
    fn empty_ancestor_falls_back_to_matched_term() {
        let entries = raw_entries(serde_json::json!([{
            "subject": {"id": "MONDO:0015317"},
            "similarity": {
                "object_best_matches": {
                    "HP:0002104": {
                        "match_source": "HP:0002104",
                        "match_target": "HP:0001699",
                        "score": 3.1,
                        "similarity": {"ancestor_id": ""},
                    },
                },
            },
        }]));
        let mut log = RequestLog::new();
        let records = parse_search_response(&entries, "biolink:Disease", &mut log);
        assert_eq!(records[0].subsumer_id, "HP:0001699");
    }

    #[test]
    fn negative_score_is_skipped_with_warning() {
        let entries = raw_entries(serde_json::json!([{
            "subject": {"id": "MONDO:0015317"},
            "similarity": {
                "object_best_matches": {
                    "HP:0002104": {
                        "match_source": "HP:0002104",
                        "match_target": "HP:0001699",
                        "score": -1.0,
                    },
                },
            },
        }]));
        let mut log = RequestLog::new();
        let records = parse_search_response(&entries, "biolink:Disease", &mut log);
        assert!(records.is_empty());
        assert_eq!(log.entries()[0].level, LogLevel::Warning);
    }

    #[rstest]
    #[case("phenio_nodes", "infores:upheno")]
    #[case("hpoa", "infores:hpoa")]
    #[case("infores:upheno", "infores:upheno")]
    fn infores_normalization(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(super::normalize_infores(raw), expected);
    }
}
