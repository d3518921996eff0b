//! TRAPI 1.5 wire model.
//!
//! Serde data structures for the subset of the Translator Reasoner API that
//! this service consumes and produces.  Map-valued members use `IndexMap` so
//! that insertion order survives serialization, which keeps responses
//! deterministic and reproducible in tests.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Predicate for (aggregate and pairwise) similarity edges.
pub const BIOLINK_SIMILAR_TO: &str = "biolink:similar_to";
/// Predicate linking a disease to one of its annotated phenotypes.
pub const BIOLINK_HAS_PHENOTYPE: &str = "biolink:has_phenotype";
/// Predicate linking an input term to the query term-set node.
pub const BIOLINK_MEMBER_OF: &str = "biolink:member_of";

/// TRAPI Query as accepted on `POST /query`.
///
/// `limit` is an application-specific "additionalProperties" extension
/// bounding the number of disease results returned.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ReasonerRequest {
    /// The query message.
    pub message: Message,
    /// Optional limit on the number of results; default 5, valid range [1, 50].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// Optional TRAPI workflow steps; echoed back unmodified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<serde_json::Value>,
    /// Optional submitter tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter: Option<String>,
}

/// TRAPI Response as returned from `POST /query`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Response {
    /// The response message with knowledge graph and results.
    pub message: Message,
    /// Per-request log entries, in the order they were recorded.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Optional response status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Workflow steps echoed from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<serde_json::Value>,
}

/// TRAPI Message, shared between request and response.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Message {
    /// The query graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_graph: Option<QueryGraph>,
    /// The assembled knowledge graph (response only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<KnowledgeGraph>,
    /// Auxiliary support graphs referenced from edge attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_graphs: Option<IndexMap<String, AuxiliaryGraph>>,
    /// The ranked results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultEntry>>,
}

/// TRAPI query graph.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct QueryGraph {
    /// Query nodes by local key.
    pub nodes: IndexMap<String, QNode>,
    /// Query edges by local key.
    pub edges: IndexMap<String, QEdge>,
}

/// TRAPI query graph node.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct QNode {
    /// Bound identifiers (for the set node, the set identifier).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    /// Identifiers of the set members (multi-CURIE queries only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_ids: Option<Vec<String>>,
    /// Biolink categories of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Whether the node represents a set.
    #[serde(default)]
    pub is_set: bool,
    /// Multi-CURIE set interpretation, `"MANY"` or `"ALL"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_interpretation: Option<String>,
    /// Attribute constraints (accepted but not interpreted).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<serde_json::Value>,
}

/// TRAPI query graph edge.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct QEdge {
    /// Key of the subject query node.
    pub subject: String,
    /// Key of the object query node.
    pub object: String,
    /// Requested predicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicates: Option<Vec<String>>,
    /// Attribute constraints (accepted but not interpreted).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_constraints: Vec<serde_json::Value>,
    /// Qualifier constraints (accepted but not interpreted).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifier_constraints: Vec<serde_json::Value>,
}

/// TRAPI knowledge graph.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct KnowledgeGraph {
    /// Nodes by CURIE.
    pub nodes: IndexMap<String, Node>,
    /// Edges by response-scoped synthetic identifier.
    pub edges: IndexMap<String, Edge>,
}

/// TRAPI knowledge graph node.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Node {
    /// Human-readable name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Biolink categories.
    pub categories: Vec<String>,
    /// Whether the node represents a set.
    #[serde(default)]
    pub is_set: bool,
    /// Member identifiers (set nodes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
    /// Sources that provided this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provided_by: Option<Vec<String>>,
    /// Node attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

/// TRAPI knowledge graph edge.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Edge {
    /// Subject CURIE.
    pub subject: String,
    /// Biolink predicate.
    pub predicate: String,
    /// Object CURIE.
    pub object: String,
    /// Provenance chain of the edge assertion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<RetrievalSource>,
    /// Edge attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

/// One entry in an edge's provenance chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RetrievalSource {
    /// The `infores` identifier of the resource.
    pub resource_id: String,
    /// Role of the resource with respect to the edge assertion.
    pub resource_role: ResourceRole,
    /// URLs of the source records, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_record_urls: Option<Vec<String>>,
    /// Identifiers of the resources upstream of this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_resource_ids: Option<Vec<String>>,
}

/// Role of a resource in an edge's provenance chain (closed enumeration).
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRole {
    /// The resource that originally asserted the edge.
    #[strum(serialize = "primary_knowledge_source")]
    PrimaryKnowledgeSource,
    /// A resource providing data supporting the assertion.
    #[strum(serialize = "supporting_data_source")]
    SupportingDataSource,
    /// A resource aggregating the assertion from upstream sources.
    #[strum(serialize = "aggregator_knowledge_source")]
    AggregatorKnowledgeSource,
}

/// TRAPI attribute on a node or edge.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Attribute {
    /// Biolink attribute type.
    pub attribute_type_id: String,
    /// The attribute name used by the originating system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_attribute_name: Option<String>,
    /// The attribute value.
    pub value: serde_json::Value,
    /// The value type, e.g. `linkml:Float`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type_id: Option<String>,
    /// The resource that provided the attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_source: Option<String>,
}

/// A named bundle of supporting edges justifying one meta-edge.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AuxiliaryGraph {
    /// Identifiers of the supporting edges, in assembly order.
    pub edges: Vec<String>,
}

/// One ranked result with bindings back to the query graph.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResultEntry {
    /// Bindings from query node keys to knowledge graph nodes.
    pub node_bindings: IndexMap<String, Vec<Binding>>,
    /// Analyses that produced this result.
    pub analyses: Vec<Analysis>,
}

/// One analysis within a result.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    /// The resource that performed the analysis.
    pub resource_id: String,
    /// Bindings from query edge keys to knowledge graph edges.
    pub edge_bindings: IndexMap<String, Vec<Binding>>,
}

/// Binding of a query graph key to a knowledge graph identifier.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Binding {
    /// The bound knowledge graph identifier.
    pub id: String,
}

/// Severity of a [`LogEntry`].
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Fatal for the request; results are discarded.
    #[strum(serialize = "ERROR")]
    Error,
    /// Recoverable anomaly; processing continued.
    #[strum(serialize = "WARNING")]
    Warning,
    /// Informational.
    #[strum(serialize = "INFO")]
    Info,
    /// Diagnostic detail.
    #[strum(serialize = "DEBUG")]
    Debug,
}

/// One structured log entry of a TRAPI response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Time the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity level.
    pub level: LogLevel,
    /// Stable discriminating code, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Log message.
    pub message: String,
}

/// Node metadata of the `/meta_knowledge_graph` document.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetaNode {
    /// CURIE prefixes used for identifiers of this category.
    pub id_prefixes: Vec<String>,
}

/// Edge metadata of the `/meta_knowledge_graph` document.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetaEdge {
    /// Subject category.
    pub subject: String,
    /// Predicate.
    pub predicate: String,
    /// Object category.
    pub object: String,
}

/// Static description of the knowledge this service can answer about.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetaKnowledgeGraph {
    /// Node categories by Biolink category CURIE.
    pub nodes: IndexMap<String, MetaNode>,
    /// Supported meta-edges.
    pub edges: Vec<MetaEdge>,
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn resource_role_serialization() {
        assert_eq!(
            serde_json::to_string(&ResourceRole::PrimaryKnowledgeSource).unwrap(),
            "\"primary_knowledge_source\""
        );
        assert_eq!(
            serde_json::from_str::<ResourceRole>("\"aggregator_knowledge_source\"").unwrap(),
            ResourceRole::AggregatorKnowledgeSource
        );
    }

    #[test]
    fn log_level_serialization() {
        assert_eq!(serde_json::to_string(&LogLevel::Error).unwrap(), "\"ERROR\"");
        assert_eq!(
            serde_json::from_str::<LogLevel>("\"WARNING\"").unwrap(),
            LogLevel::Warning
        );
    }

    #[test]
    fn qnode_deserialization_defaults() {
        let qnode: QNode = serde_json::from_str(
            r#"{"categories": ["biolink:Disease"]}"#,
        )
        .unwrap();
        assert!(qnode.ids.is_none());
        assert!(qnode.member_ids.is_none());
        assert!(!qnode.is_set);
        assert!(qnode.set_interpretation.is_none());
    }

    #[test]
    fn request_roundtrip_preserves_limit() {
        let request: ReasonerRequest = serde_json::from_str(
            r#"{"message": {"query_graph": {"nodes": {}, "edges": {}}}, "limit": 7}"#,
        )
        .unwrap();
        assert_eq!(request.limit, Some(7));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["limit"], 7);
    }
}
