//! Assembly of the response knowledge graph, auxiliary graphs, and results.

use indexmap::IndexMap;

use crate::query::classify::ClassifiedQuery;
use crate::query::rank::RankedDiseaseResult;
use crate::trapi::{
    Analysis, Attribute, AuxiliaryGraph, Binding, Edge, KnowledgeGraph, Node, ResourceRole,
    ResultEntry, RetrievalSource, BIOLINK_HAS_PHENOTYPE, BIOLINK_MEMBER_OF, BIOLINK_SIMILAR_TO,
};

/// Synthetic `original_attribute_name` for the aggregate similarity score.
const AGGREGATE_SIMILARITY_SCORE: &str = "semsimian:score";
/// Synthetic `original_attribute_name` for a pairwise match score.
const MATCH_TERM_SCORE: &str = "semsimian:object_best_matches.*.score";
/// Synthetic `original_attribute_name` for a pairwise common subsumer.
const MATCH_TERM: &str = "semsimian:object_best_matches.*.similarity.ancestor_id";

/// ECO code for 'author statement supported by traceable reference used in
/// manual assertion'.
const EVIDENCE_CODE: &str = "ECO:0000304";

/// Source of the user-submitted input term set.
const USER_INTERFACE_SOURCE: &str = "infores:user-interface";

/// Provenance configuration for assembled edges, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Provenance {
    /// The `infores` tag of this service (analysis resource id).
    pub trapi_source: String,
    /// The similarity service asserting the matches.
    pub primary_knowledge_source: String,
    /// The phenotype-annotation ingest behind the similarity data.
    pub ingest_knowledge_source: String,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            trapi_source: "infores:monarch-mcq".into(),
            primary_knowledge_source: "infores:semsimian-kp".into(),
            ingest_knowledge_source: "infores:hpo-annotations".into(),
        }
    }
}

/// Output of [`assemble`]: the response message parts owned by one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledResponse {
    /// The knowledge graph nodes and edges.
    pub knowledge_graph: KnowledgeGraph,
    /// Auxiliary support graphs keyed by their synthetic identifier.
    pub auxiliary_graphs: IndexMap<String, AuxiliaryGraph>,
    /// Ranked results with bindings back to the query graph.
    pub results: Vec<ResultEntry>,
}

/// Generator for response-scoped synthetic edge identifiers (`e0001`, ...).
#[derive(Debug, Default)]
struct EdgeIdGen(usize);

impl EdgeIdGen {
    fn next_id(&mut self) -> String {
        self.0 += 1;
        format!("e{:0>4}", self.0)
    }
}

/// Assemble the knowledge graph, auxiliary graphs, and results for the
/// qualifying `ranked` diseases.
///
/// The input term-set node is created once per response under a freshly
/// generated `uuid:` identifier; it is the object of every meta-edge.  Edge
/// identifiers are deterministic given identical ranked input.
pub fn assemble(
    ranked: &[RankedDiseaseResult],
    query: &ClassifiedQuery,
    provenance: &Provenance,
) -> AssembledResponse {
    let mut response = AssembledResponse::default();
    let mut edge_ids = EdgeIdGen::default();

    let set_node_id = format!("uuid:{}", uuid::Uuid::new_v4());
    response.knowledge_graph.nodes.insert(
        set_node_id.clone(),
        Node {
            name: None,
            categories: vec![query.member_category.clone()],
            is_set: true,
            members: Some(query.members.clone()),
            provided_by: Some(vec![USER_INTERFACE_SOURCE.to_string()]),
            attributes: vec![],
        },
    );

    // One node and one set-membership edge per normalized member term,
    // shared by all disease results.
    let mut membership_edges: IndexMap<String, String> = IndexMap::new();
    for member in &query.members {
        response.knowledge_graph.nodes.insert(
            member.clone(),
            Node {
                name: None,
                categories: vec![query.member_category.clone()],
                is_set: false,
                members: None,
                provided_by: Some(vec![USER_INTERFACE_SOURCE.to_string()]),
                attributes: vec![],
            },
        );
        let member_edge_id = edge_ids.next_id();
        response.knowledge_graph.edges.insert(
            member_edge_id.clone(),
            Edge {
                subject: member.clone(),
                predicate: BIOLINK_MEMBER_OF.to_string(),
                object: set_node_id.clone(),
                sources: vec![RetrievalSource {
                    resource_id: USER_INTERFACE_SOURCE.to_string(),
                    resource_role: ResourceRole::PrimaryKnowledgeSource,
                    source_record_urls: None,
                    upstream_resource_ids: None,
                }],
                attributes: vec![
                    plain_attribute("biolink:agent_type", "manual_agent"),
                    plain_attribute("biolink:knowledge_level", "knowledge_assertion"),
                ],
            },
        );
        membership_edges.insert(member.clone(), member_edge_id);
    }

    for result in ranked {
        // The upstream data sources behind this answer, undifferentiated by
        // role when folded into the primary source's upstream ids.
        let mut upstream_ids = vec![provenance.ingest_knowledge_source.clone()];
        if let Some(provided_by) = &result.provided_by {
            if !upstream_ids.contains(provided_by) {
                upstream_ids.push(provided_by.clone());
            }
        }
        let mut answer_sources = vec![RetrievalSource {
            resource_id: provenance.primary_knowledge_source.clone(),
            resource_role: ResourceRole::PrimaryKnowledgeSource,
            source_record_urls: None,
            upstream_resource_ids: Some(upstream_ids.clone()),
        }];
        for upstream_id in &upstream_ids {
            answer_sources.push(RetrievalSource {
                resource_id: upstream_id.clone(),
                resource_role: ResourceRole::SupportingDataSource,
                source_record_urls: None,
                upstream_resource_ids: None,
            });
        }

        if !response
            .knowledge_graph
            .nodes
            .contains_key(&result.disease_id)
        {
            response.knowledge_graph.nodes.insert(
                result.disease_id.clone(),
                Node {
                    name: result.disease_name.clone(),
                    categories: vec![result.disease_category.clone()],
                    is_set: false,
                    members: None,
                    provided_by: result.provided_by.clone().map(|source| vec![source]),
                    attributes: vec![],
                },
            );
        }

        let meta_edge_id = edge_ids.next_id();
        let support_graph_id = format!("sg-{meta_edge_id}");
        response.knowledge_graph.edges.insert(
            meta_edge_id.clone(),
            Edge {
                subject: result.disease_id.clone(),
                predicate: BIOLINK_SIMILAR_TO.to_string(),
                object: set_node_id.clone(),
                sources: answer_sources.clone(),
                attributes: vec![
                    Attribute {
                        attribute_type_id: "biolink:score".into(),
                        original_attribute_name: Some(AGGREGATE_SIMILARITY_SCORE.into()),
                        value: serde_json::json!(result.aggregate_score),
                        value_type_id: Some("linkml:Float".into()),
                        attribute_source: Some(provenance.primary_knowledge_source.clone()),
                    },
                    Attribute {
                        attribute_type_id: "biolink:support_graphs".into(),
                        original_attribute_name: None,
                        value: serde_json::json!([support_graph_id.clone()]),
                        value_type_id: Some("linkml:String".into()),
                        attribute_source: Some(provenance.primary_knowledge_source.clone()),
                    },
                    plain_attribute("biolink:agent_type", "automated_agent"),
                    plain_attribute("biolink:knowledge_level", "knowledge_assertion"),
                ],
            },
        );

        let mut support_edges = Vec::new();
        for record in &result.matches {
            if !response
                .knowledge_graph
                .nodes
                .contains_key(&record.matched_term_id)
            {
                response.knowledge_graph.nodes.insert(
                    record.matched_term_id.clone(),
                    Node {
                        name: record.matched_term_name.clone(),
                        categories: vec![query.member_category.clone()],
                        is_set: false,
                        members: None,
                        provided_by: None,
                        attributes: vec![],
                    },
                );
            }
            if let Some(query_term_name) = &record.query_term_name {
                if let Some(node) = response.knowledge_graph.nodes.get_mut(&record.query_term_id)
                {
                    node.name.get_or_insert_with(|| query_term_name.clone());
                }
            }

            // Pairwise "Input_Query_Term--[similar_to]->Matched_Term" edge.
            let similarity_edge_id = edge_ids.next_id();
            response.knowledge_graph.edges.insert(
                similarity_edge_id.clone(),
                Edge {
                    subject: record.query_term_id.clone(),
                    predicate: BIOLINK_SIMILAR_TO.to_string(),
                    object: record.matched_term_id.clone(),
                    sources: answer_sources.clone(),
                    attributes: vec![
                        Attribute {
                            attribute_type_id: "biolink:score".into(),
                            original_attribute_name: Some(MATCH_TERM_SCORE.into()),
                            value: serde_json::json!(record.score),
                            value_type_id: Some("linkml:Float".into()),
                            attribute_source: Some(provenance.primary_knowledge_source.clone()),
                        },
                        Attribute {
                            attribute_type_id: "biolink:match".into(),
                            original_attribute_name: Some(MATCH_TERM.into()),
                            value: serde_json::json!(record.subsumer_id),
                            value_type_id: Some("linkml:Uriorcurie".into()),
                            attribute_source: Some(provenance.primary_knowledge_source.clone()),
                        },
                        plain_attribute("biolink:agent_type", "automated_agent"),
                        plain_attribute("biolink:knowledge_level", "knowledge_assertion"),
                    ],
                },
            );

            // "Disease--[has_phenotype]->Matched_Term" association edge.
            let phenotype_edge_id = edge_ids.next_id();
            response.knowledge_graph.edges.insert(
                phenotype_edge_id.clone(),
                Edge {
                    subject: result.disease_id.clone(),
                    predicate: BIOLINK_HAS_PHENOTYPE.to_string(),
                    object: record.matched_term_id.clone(),
                    sources: vec![RetrievalSource {
                        resource_id: provenance.ingest_knowledge_source.clone(),
                        resource_role: ResourceRole::PrimaryKnowledgeSource,
                        source_record_urls: None,
                        upstream_resource_ids: None,
                    }],
                    attributes: vec![
                        Attribute {
                            attribute_type_id: "biolink:has_evidence".into(),
                            original_attribute_name: None,
                            value: serde_json::json!(EVIDENCE_CODE),
                            value_type_id: Some("linkml:Uriorcurie".into()),
                            attribute_source: Some(provenance.ingest_knowledge_source.clone()),
                        },
                        plain_attribute("biolink:agent_type", "automated_agent"),
                        plain_attribute("biolink:knowledge_level", "knowledge_assertion"),
                    ],
                },
            );

            support_edges.push(similarity_edge_id);
            support_edges.push(phenotype_edge_id);
            if let Some(membership_edge_id) = membership_edges.get(&record.query_term_id) {
                support_edges.push(membership_edge_id.clone());
            }
        }

        response
            .auxiliary_graphs
            .insert(support_graph_id, AuxiliaryGraph {
                edges: support_edges,
            });

        let mut node_bindings = IndexMap::new();
        node_bindings.insert(
            query.subject_key.clone(),
            vec![Binding {
                id: set_node_id.clone(),
            }],
        );
        node_bindings.insert(
            query.object_key.clone(),
            vec![Binding {
                id: result.disease_id.clone(),
            }],
        );
        let mut edge_bindings = IndexMap::new();
        edge_bindings.insert(
            query.edge_key.clone(),
            vec![Binding {
                id: meta_edge_id.clone(),
            }],
        );
        response.results.push(ResultEntry {
            node_bindings,
            analyses: vec![Analysis {
                resource_id: provenance.trapi_source.clone(),
                edge_bindings,
            }],
        });
    }

    response
}

fn plain_attribute(attribute_type_id: &str, value: &str) -> Attribute {
    Attribute {
        attribute_type_id: attribute_type_id.to_string(),
        original_attribute_name: None,
        value: serde_json::json!(value),
        value_type_id: None,
        attribute_source: None,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::query::classify::{ClassifiedQuery, SetInterpretation};
    use crate::query::rank::RankedDiseaseResult;
    use crate::query::semsim::MatchRecord;
    use crate::trapi::{ResourceRole, BIOLINK_SIMILAR_TO};

    use super::{assemble, Provenance};

    fn classified() -> ClassifiedQuery {
        ClassifiedQuery {
            interpretation: SetInterpretation::All,
            members: vec!["HP:0001063".into(), "HP:0002104".into()],
            member_category: "biolink:PhenotypicFeature".into(),
            object_category: "biolink:Disease".into(),
            subject_key: "phenotypes".into(),
            object_key: "diseases".into(),
            edge_key: "e01".into(),
        }
    }

    fn match_record(query_term_id: &str, matched_term_id: &str, score: f64) -> MatchRecord {
        MatchRecord {
            query_term_id: query_term_id.into(),
            query_term_name: None,
            matched_term_id: matched_term_id.into(),
            matched_term_name: Some(format!("{matched_term_id} (HPO)")),
            disease_id: "MONDO:0015317".into(),
            disease_name: Some("pleural effusion syndrome".into()),
            disease_category: "biolink:Disease".into(),
            score,
            subsumer_id: format!("{matched_term_id}-subsumer"),
            provided_by: Some("infores:upheno".into()),
        }
    }

    fn ranked_result() -> RankedDiseaseResult {
        RankedDiseaseResult {
            disease_id: "MONDO:0015317".into(),
            disease_name: Some("pleural effusion syndrome".into()),
            disease_category: "biolink:Disease".into(),
            provided_by: Some("infores:upheno".into()),
            aggregate_score: 22.48,
            matches: vec![
                match_record("HP:0001063", "HP:0000011", 7.59),
                match_record("HP:0002104", "HP:0000022", 14.89),
            ],
        }
    }

    #[test]
    fn two_term_result_yields_expected_shape() {
        let response = assemble(&[ranked_result()], &classified(), &Provenance::default());

        // set node + 2 member nodes + disease + 2 matched terms
        assert_eq!(response.knowledge_graph.nodes.len(), 6);
        // 2 member_of + 1 meta + 2 similarity + 2 has_phenotype
        assert_eq!(response.knowledge_graph.edges.len(), 7);
        assert_eq!(response.auxiliary_graphs.len(), 1);
        assert_eq!(response.results.len(), 1);

        let aux = response.auxiliary_graphs.values().next().unwrap();
        assert_eq!(aux.edges.len(), 6);
    }

    #[test]
    fn meta_edge_carries_score_and_support_graph_reference() {
        let response = assemble(&[ranked_result()], &classified(), &Provenance::default());
        let (support_graph_id, _) = response.auxiliary_graphs.iter().next().unwrap();

        let meta_edge = response
            .knowledge_graph
            .edges
            .values()
            .find(|edge| {
                edge.predicate == BIOLINK_SIMILAR_TO && edge.subject == "MONDO:0015317"
            })
            .expect("meta edge present");
        let score = meta_edge
            .attributes
            .iter()
            .find(|a| a.attribute_type_id == "biolink:score")
            .expect("score attribute");
        assert_eq!(score.value, serde_json::json!(22.48));
        let support = meta_edge
            .attributes
            .iter()
            .find(|a| a.attribute_type_id == "biolink:support_graphs")
            .expect("support graph attribute");
        assert_eq!(support.value, serde_json::json!([support_graph_id]));

        let primary = meta_edge
            .sources
            .iter()
            .find(|s| s.resource_role == ResourceRole::PrimaryKnowledgeSource)
            .expect("primary source");
        assert_eq!(primary.resource_id, "infores:semsimian-kp");
        assert_eq!(
            primary.upstream_resource_ids,
            Some(vec![
                "infores:hpo-annotations".to_string(),
                "infores:upheno".to_string()
            ])
        );
        let supporting: Vec<_> = meta_edge
            .sources
            .iter()
            .filter(|s| s.resource_role == ResourceRole::SupportingDataSource)
            .map(|s| s.resource_id.clone())
            .collect();
        assert_eq!(supporting, vec!["infores:hpo-annotations", "infores:upheno"]);
    }

    #[test]
    fn every_referenced_identifier_exists() {
        let response = assemble(&[ranked_result()], &classified(), &Provenance::default());

        for aux in response.auxiliary_graphs.values() {
            for edge_id in &aux.edges {
                assert!(
                    response.knowledge_graph.edges.contains_key(edge_id),
                    "auxiliary graph references missing edge {edge_id}"
                );
            }
        }
        for edge in response.knowledge_graph.edges.values() {
            assert!(response.knowledge_graph.nodes.contains_key(&edge.subject));
            assert!(response.knowledge_graph.nodes.contains_key(&edge.object));
        }
        for result in &response.results {
            for bindings in result.node_bindings.values() {
                for binding in bindings {
                    assert!(response.knowledge_graph.nodes.contains_key(&binding.id));
                }
            }
            for analysis in &result.analyses {
                for bindings in analysis.edge_bindings.values() {
                    for binding in bindings {
                        assert!(response.knowledge_graph.edges.contains_key(&binding.id));
                    }
                }
            }
        }
    }

    #[test]
    fn assembly_is_deterministic_up_to_the_set_identifier() {
        let first = assemble(&[ranked_result()], &classified(), &Provenance::default());
        let second = assemble(&[ranked_result()], &classified(), &Provenance::default());

        let edge_ids_first: Vec<_> = first.knowledge_graph.edges.keys().cloned().collect();
        let edge_ids_second: Vec<_> = second.knowledge_graph.edges.keys().cloned().collect();
        assert_eq!(edge_ids_first, edge_ids_second);
        assert_eq!(
            edge_ids_first,
            vec!["e0001", "e0002", "e0003", "e0004", "e0005", "e0006", "e0007"]
        );
        assert_eq!(
            first.auxiliary_graphs.keys().collect::<Vec<_>>(),
            second.auxiliary_graphs.keys().collect::<Vec<_>>()
        );
        // The set node identifiers differ (freshly generated per response).
        let set_id_first = first.results[0].node_bindings["phenotypes"][0].id.clone();
        let set_id_second = second.results[0].node_bindings["phenotypes"][0].id.clone();
        assert_ne!(set_id_first, set_id_second);
        assert!(set_id_first.starts_with("uuid:"));
    }

    #[test]
    fn bindings_reference_query_graph_keys() {
        let response = assemble(&[ranked_result()], &classified(), &Provenance::default());
        let result = &response.results[0];
        assert!(result.node_bindings.contains_key("phenotypes"));
        assert!(result.node_bindings.contains_key("diseases"));
        assert_eq!(result.node_bindings["diseases"][0].id, "MONDO:0015317");
        assert_eq!(result.analyses.len(), 1);
        assert_eq!(result.analyses[0].resource_id, "infores:monarch-mcq");
        assert!(result.analyses[0].edge_bindings.contains_key("e01"));
    }

    #[test]
    fn empty_ranking_still_emits_the_input_set() {
        let response = assemble(&[], &classified(), &Provenance::default());
        // set node + 2 member nodes, 2 member_of edges, nothing else
        assert_eq!(response.knowledge_graph.nodes.len(), 3);
        assert_eq!(response.knowledge_graph.edges.len(), 2);
        assert!(response.auxiliary_graphs.is_empty());
        assert!(response.results.is_empty());
    }

    #[test]
    fn pairwise_edge_orientation_and_attributes() {
        let response = assemble(&[ranked_result()], &classified(), &Provenance::default());
        let similarity_edge = response
            .knowledge_graph
            .edges
            .values()
            .find(|edge| {
                edge.predicate == BIOLINK_SIMILAR_TO && edge.subject == "HP:0001063"
            })
            .expect("pairwise similarity edge present");
        assert_eq!(similarity_edge.object, "HP:0000011");
        let subsumer = similarity_edge
            .attributes
            .iter()
            .find(|a| a.attribute_type_id == "biolink:match")
            .expect("subsumer attribute");
        assert_eq!(subsumer.value, serde_json::json!("HP:0000011-subsumer"));

        let phenotype_edge = response
            .knowledge_graph
            .edges
            .values()
            .find(|edge| edge.predicate == "biolink:has_phenotype" && edge.object == "HP:0000011")
            .expect("has_phenotype edge present");
        assert_eq!(phenotype_edge.subject, "MONDO:0015317");
        assert_eq!(
            phenotype_edge.sources[0].resource_id,
            "infores:hpo-annotations"
        );
    }
}
