//! Classification of incoming multi-CURIE query graphs.

use crate::common::is_curie;
use crate::query::ValidationError;
use crate::trapi::QueryGraph;

/// Default category for the input term members when the query declares none.
const DEFAULT_MEMBER_CATEGORY: &str = "biolink:NamedThing";
/// Default category for the matched object node when the query declares none.
const DEFAULT_OBJECT_CATEGORY: &str = "biolink:Disease";

/// How the members of the input term set must contribute to a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SetInterpretation {
    /// A candidate qualifies if at least one member term matched.
    #[strum(serialize = "MANY")]
    Many,
    /// A candidate qualifies only if every member term matched.
    #[strum(serialize = "ALL")]
    All,
}

/// Immutable outcome of classifying a query graph.
#[derive(Debug, Clone)]
pub struct ClassifiedQuery {
    /// The declared set interpretation.
    pub interpretation: SetInterpretation,
    /// The normalized (deduplicated, order-preserving) member identifiers.
    pub members: Vec<String>,
    /// Category of the member terms.
    pub member_category: String,
    /// Category expected for matched objects.
    pub object_category: String,
    /// Query graph key of the term-set node.
    pub subject_key: String,
    /// Query graph key of the unbound object node.
    pub object_key: String,
    /// Query graph key of the similarity edge.
    pub edge_key: String,
}

/// Classify `query_graph` as a multi-CURIE term-set query.
///
/// Locates the term-set node (the one carrying a set declaration), checks the
/// declaration for well-formedness, and normalizes the member list.  Exactly
/// two query nodes and one connecting edge are required.
pub fn classify(query_graph: &QueryGraph) -> Result<ClassifiedQuery, ValidationError> {
    if query_graph.nodes.len() != 2 {
        return Err(ValidationError::MalformedSetNode(format!(
            "exactly two query nodes are required, found {}",
            query_graph.nodes.len()
        )));
    }

    let mut subject: Option<(&String, &crate::trapi::QNode)> = None;
    for (key, qnode) in &query_graph.nodes {
        let declares_set =
            qnode.is_set || qnode.set_interpretation.is_some() || qnode.member_ids.is_some();
        if declares_set {
            if subject.is_some() {
                return Err(ValidationError::MalformedSetNode(
                    "more than one query node declares a term set".into(),
                ));
            }
            subject = Some((key, qnode));
        }
    }
    let (subject_key, subject_node) = subject.ok_or_else(|| {
        ValidationError::MalformedSetNode(
            "no query node declares a multi-CURIE term set ('set_interpretation' plus 'member_ids')"
                .into(),
        )
    })?;

    let interpretation = match subject_node.set_interpretation.as_deref() {
        Some("MANY") => SetInterpretation::Many,
        Some("ALL") => SetInterpretation::All,
        Some(other) => {
            return Err(ValidationError::MalformedSetNode(format!(
                "'set_interpretation' must be 'MANY' or 'ALL', found '{other}'"
            )))
        }
        None => {
            return Err(ValidationError::MalformedSetNode(
                "term-set query node lacks a 'set_interpretation' value".into(),
            ))
        }
    };

    let member_ids = subject_node
        .member_ids
        .as_deref()
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| {
            ValidationError::MalformedSetNode(
                "term-set query node needs a non-empty 'member_ids' list".into(),
            )
        })?;

    // Deduplicate while preserving first-occurrence order; duplicate
    // submissions are tolerated, malformed identifiers are not.
    let mut members: Vec<String> = Vec::with_capacity(member_ids.len());
    for member in member_ids {
        if !is_curie(member) {
            return Err(ValidationError::MalformedSetNode(format!(
                "member identifier '{member}' is not CURIE-shaped"
            )));
        }
        if !members.contains(member) {
            members.push(member.clone());
        }
    }

    let object_key = query_graph
        .nodes
        .keys()
        .find(|key| *key != subject_key)
        .cloned()
        .ok_or_else(|| {
            ValidationError::MalformedSetNode("query graph lacks an unbound object node".into())
        })?;

    let edge_key = query_graph
        .edges
        .iter()
        .find(|(_, qedge)| {
            (qedge.subject == *subject_key && qedge.object == object_key)
                || (qedge.subject == object_key && qedge.object == *subject_key)
        })
        .map(|(key, _)| key.clone())
        .ok_or_else(|| {
            ValidationError::MalformedSetNode(
                "query graph lacks an edge connecting the term-set node to the object node".into(),
            )
        })?;

    let member_category = first_category(subject_node, DEFAULT_MEMBER_CATEGORY);
    let object_category = first_category(&query_graph.nodes[&object_key], DEFAULT_OBJECT_CATEGORY);

    Ok(ClassifiedQuery {
        interpretation,
        members,
        member_category,
        object_category,
        subject_key: subject_key.clone(),
        object_key,
        edge_key,
    })
}

fn first_category(qnode: &crate::trapi::QNode, default: &str) -> String {
    qnode
        .categories
        .as_ref()
        .and_then(|categories| categories.first().cloned())
        .unwrap_or_else(|| default.to_string())
}
