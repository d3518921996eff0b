//! Answering multi-CURIE term-set queries.
//!
//! The pipeline is: classify the query graph, validate the result limit,
//! fetch pairwise matches from the similarity service, deduplicate and rank
//! per disease, then assemble the knowledge graph, auxiliary graphs, and
//! results.  Validation failures are recovered into ERROR log entries on an
//! otherwise well-formed, empty response.

pub mod assemble;
pub mod classify;
pub mod logs;
pub mod rank;
pub mod semsim;

use crate::query::assemble::{assemble, AssembledResponse, Provenance};
use crate::query::classify::classify;
use crate::query::logs::RequestLog;
use crate::query::semsim::{parse_search_response, validate_limit, SemsimClient};
use crate::trapi::{Message, ReasonerRequest, Response};

/// Rejection of a request before any network I/O.
///
/// Each variant carries a stable code surfaced in the response logs.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// The query graph does not describe a well-formed term-set query.
    #[error("malformed term-set query node: {0}")]
    MalformedSetNode(String),
    /// The requested result limit falls outside the accepted range.
    #[error(
        "result limit {0} is out of range, must be between 1 and {max}",
        max = semsim::MAX_RESULT_LIMIT
    )]
    LimitOutOfRange(i64),
}

impl ValidationError {
    /// The stable code identifying this rejection in response logs.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MalformedSetNode(_) => "MALFORMED_SET_NODE",
            ValidationError::LimitOutOfRange(_) => "LIMIT_OUT_OF_RANGE",
        }
    }
}

/// Failure of the outbound similarity search call.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    /// The service could not be reached.
    #[error("similarity service at {url} unreachable: {source}")]
    Transport {
        /// The endpoint URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The service answered with a non-success status.
    #[error("similarity service at {url} answered {status}: {message}")]
    Status {
        /// The endpoint URL.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The response body, when readable.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("similarity service at {url} returned an undecodable payload: {source}")]
    Payload {
        /// The endpoint URL.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

/// Answer `request`, returning a complete TRAPI response.
///
/// Validation failures never surface as transport faults; they are recorded
/// as ERROR log entries and the response carries an empty knowledge graph
/// and results list.  Upstream failures are returned to the caller.
pub async fn answer(
    request: &ReasonerRequest,
    client: &SemsimClient,
    provenance: &Provenance,
) -> Result<Response, UpstreamError> {
    let mut log = RequestLog::new();

    let classified = match &request.message.query_graph {
        Some(query_graph) => match classify(query_graph) {
            Ok(classified) => Some(classified),
            Err(err) => {
                log.error(Some(err.code()), err.to_string());
                None
            }
        },
        None => {
            log.error(
                Some("MALFORMED_SET_NODE"),
                "request message lacks a query graph",
            );
            None
        }
    };

    let limit = match validate_limit(request.limit) {
        Ok(limit) => Some(limit),
        Err(err) => {
            log.error(Some(err.code()), err.to_string());
            None
        }
    };

    let mut assembled = AssembledResponse::default();
    if let (Some(classified), Some(limit), false) = (&classified, limit, log.halted()) {
        log.info(format!(
            "searching {} member terms with {} interpretation, limit {limit}",
            classified.members.len(),
            classified.interpretation
        ));
        let raw = client.search(&classified.members, limit).await?;
        let records = parse_search_response(&raw, &classified.object_category, &mut log);
        log.debug(format!(
            "{} pairwise match records from {} result entries",
            records.len(),
            raw.len()
        ));
        let ranked = rank::rank(records, classified, limit);
        log.info(format!("{} qualifying disease results", ranked.len()));
        assembled = assemble(&ranked, classified, provenance);
    }

    // Any recorded ERROR discards the assembled output; the response shape
    // stays well-formed either way.
    if log.halted() {
        assembled = AssembledResponse::default();
    }

    let description = log
        .entries()
        .iter()
        .find(|entry| entry.level == crate::trapi::LogLevel::Error)
        .map(|entry| entry.message.clone());
    let status = if log.halted() {
        Some("Error".to_string())
    } else {
        Some("Success".to_string())
    };

    Ok(Response {
        message: Message {
            query_graph: request.message.query_graph.clone(),
            knowledge_graph: Some(assembled.knowledge_graph),
            auxiliary_graphs: Some(assembled.auxiliary_graphs),
            results: Some(assembled.results),
        },
        logs: log.into_entries(),
        status,
        description,
        workflow: request.workflow.clone(),
    })
}
