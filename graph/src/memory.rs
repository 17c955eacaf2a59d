//! In-process constraint graph
//!
//! Holds the same typed fact set the SPARQL store would hold after applying
//! the same statements, and answers every gateway query natively. Intended
//! for tests and offline runs; it is not a general graph database.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use taxon_types::{Class, ClassId, Parameter, ParameterCode, ProposedClass, Service, ServiceId};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::statement::{Description, Node, NodeKind, Predicate, Statement};
use crate::{ConstraintGraph, ParameterConstraints};

type Triple = (Node, Predicate, Node);

#[derive(Debug, Default)]
struct Facts {
    /// Nodes with an `a :<Kind>` assertion.
    typed: BTreeSet<Node>,
    triples: BTreeSet<Triple>,
}

impl Facts {
    fn apply(&mut self, statement: Statement) {
        match statement {
            Statement::InsertData(desc) => self.insert(desc),
            Statement::Replace(desc) => {
                self.remove_subject(&desc.subject);
                self.insert(desc);
            }
            Statement::DeleteSubject(node) => self.remove_subject(&node),
        }
    }

    fn insert(&mut self, desc: Description) {
        self.triples.extend(desc.triples());
        self.typed.insert(desc.subject);
    }

    fn remove_subject(&mut self, subject: &Node) {
        self.typed.remove(subject);
        self.triples.retain(|(s, _, _)| s != subject);
    }

    fn has(&self, subject: &Node, predicate: Predicate, object: &Node) -> bool {
        self.triples
            .contains(&(subject.clone(), predicate, object.clone()))
    }

    fn objects(&self, subject: &Node, predicate: Predicate) -> impl Iterator<Item = &Node> {
        self.triples
            .iter()
            .filter(move |(s, p, _)| s == subject && *p == predicate)
            .map(|(_, _, o)| o)
    }

    fn subjects(&self, predicate: Predicate, object: &Node) -> impl Iterator<Item = &Node> {
        self.triples
            .iter()
            .filter(move |(_, p, o)| o == object && *p == predicate)
            .map(|(s, _, _)| s)
    }

    /// Allow edge between a class and a parameter, declared from either side.
    fn allows(&self, class: &Node, param: &Node) -> bool {
        self.has(class, Predicate::HasAllowedParameter, param)
            || self.has(param, Predicate::AllowedClass, class)
    }

    fn contradicts(&self, a: &Node, b: &Node) -> bool {
        self.has(a, Predicate::HasContradictionParameter, b)
            || self.has(b, Predicate::HasContradictionParameter, a)
    }
}

fn parameter_codes<'a>(nodes: impl Iterator<Item = &'a Node>) -> BTreeSet<ParameterCode> {
    nodes
        .filter_map(|node| match node {
            Node::Parameter(code) => Some(code.clone()),
            _ => None,
        })
        .collect()
}

fn param_nodes(codes: &[ParameterCode]) -> BTreeSet<Node> {
    codes.iter().map(Node::from).collect()
}

/// [`ConstraintGraph`] over an in-memory fact set.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    facts: RwLock<Facts>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a statement exactly as the store would.
    pub async fn apply(&self, statement: Statement) {
        self.facts.write().await.apply(statement);
    }

    pub async fn contains(&self, node: &Node) -> bool {
        self.facts.read().await.typed.contains(node)
    }

    /// Outgoing edges of `node`, in canonical order.
    pub async fn edges_of(&self, node: &Node) -> Vec<(Predicate, Node)> {
        self.facts
            .read()
            .await
            .triples
            .iter()
            .filter(|(s, _, _)| s == node)
            .map(|(_, p, o)| (*p, o.clone()))
            .collect()
    }
}

#[async_trait]
impl ConstraintGraph for MemoryGraph {
    async fn add_parameter(&self, parameter: &Parameter) -> Result<()> {
        self.apply(Statement::InsertData(Description::parameter(parameter)))
            .await;
        Ok(())
    }

    async fn update_parameter(&self, parameter: &Parameter) -> Result<()> {
        self.apply(Statement::Replace(Description::parameter(parameter)))
            .await;
        Ok(())
    }

    async fn delete_parameter(&self, code: &ParameterCode) -> Result<()> {
        self.apply(Statement::DeleteSubject(Node::from(code))).await;
        Ok(())
    }

    async fn parameter_constraints(&self, code: &ParameterCode) -> Result<ParameterConstraints> {
        let facts = self.facts.read().await;
        let param = Node::from(code);

        let contradiction_parameters = parameter_codes(
            facts
                .objects(&param, Predicate::HasContradictionParameter)
                .chain(facts.subjects(Predicate::HasContradictionParameter, &param)),
        );
        let allowed_classes: BTreeSet<ClassId> = facts
            .subjects(Predicate::HasAllowedParameter, &param)
            .chain(facts.objects(&param, Predicate::AllowedClass))
            .filter_map(|node| match node {
                Node::Class(id) => Some(*id),
                _ => None,
            })
            .collect();

        Ok(ParameterConstraints {
            allowed_classes: allowed_classes.into_iter().collect(),
            contradiction_parameters: contradiction_parameters.into_iter().collect(),
        })
    }

    async fn add_class(&self, class: &Class) -> Result<()> {
        self.apply(Statement::InsertData(Description::class(class)))
            .await;
        Ok(())
    }

    async fn update_class(&self, class: &Class) -> Result<()> {
        self.apply(Statement::Replace(Description::class(class))).await;
        Ok(())
    }

    async fn delete_class(&self, class_id: ClassId) -> Result<()> {
        self.apply(Statement::DeleteSubject(Node::from(class_id)))
            .await;
        Ok(())
    }

    async fn class_constraints(&self, class_id: ClassId) -> Result<Vec<ParameterCode>> {
        let facts = self.facts.read().await;
        let class = Node::from(class_id);
        let codes = parameter_codes(
            facts
                .objects(&class, Predicate::HasAllowedParameter)
                .chain(facts.subjects(Predicate::AllowedClass, &class)),
        );
        Ok(codes.into_iter().collect())
    }

    async fn add_service(&self, service: &Service) -> Result<()> {
        self.apply(Statement::InsertData(Description::service(service)))
            .await;
        Ok(())
    }

    async fn contradicting_parameters(&self, codes: &[ParameterCode]) -> Result<Vec<ParameterCode>> {
        let facts = self.facts.read().await;
        let pool = param_nodes(codes);
        let hits = parameter_codes(pool.iter().filter(|p1| {
            pool.iter()
                .any(|p2| p1 != &p2 && facts.contradicts(p1, p2))
        }));
        Ok(hits.into_iter().collect())
    }

    async fn allowed_parameter_count(
        &self,
        class_id: ClassId,
        codes: &[ParameterCode],
    ) -> Result<usize> {
        let facts = self.facts.read().await;
        let class = Node::from(class_id);
        Ok(param_nodes(codes)
            .iter()
            .filter(|param| facts.allows(&class, param))
            .count())
    }

    async fn candidate_classes(
        &self,
        service_id: ServiceId,
        codes: &[ParameterCode],
    ) -> Result<Vec<ProposedClass>> {
        let facts = self.facts.read().await;
        let pool = param_nodes(codes);
        let current = Node::from(service_id);

        let mut matches: BTreeMap<ClassId, (usize, BTreeSet<ServiceId>)> = BTreeMap::new();
        for node in facts.typed.iter().filter(|n| n.kind() == NodeKind::Class) {
            let Node::Class(class_id) = node else {
                continue;
            };
            let common: Vec<&Node> = pool.iter().filter(|p| facts.allows(node, p)).collect();
            if common.is_empty() {
                continue;
            }
            let similar = facts
                .typed
                .iter()
                .filter(|s| s.kind() == NodeKind::Service && **s != current)
                .filter(|s| facts.has(s, Predicate::HasClass, node))
                .filter(|s| common.iter().any(|p| facts.has(s, Predicate::HasParameter, p)))
                .filter_map(|s| match s {
                    Node::Service(id) => Some(*id),
                    _ => None,
                })
                .collect();
            matches.insert(*class_id, (common.len(), similar));
        }

        let mut proposed: Vec<ProposedClass> = matches
            .into_iter()
            .map(|(class_id, (matching_parameters, similar))| ProposedClass {
                class_id,
                matching_parameters,
                similar_services: similar.into_iter().collect(),
            })
            .collect();
        proposed.sort_by(|a, b| b.matching_parameters.cmp(&a.matching_parameters));
        Ok(proposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn codes(raw: &[&str]) -> Vec<ParameterCode> {
        raw.iter().map(|c| ParameterCode::from(*c)).collect()
    }

    fn service(id: u64, class: u64, params: &[&str]) -> Service {
        Service {
            id: ServiceId(id),
            title: String::new(),
            parameters: codes(params),
            class_id: Some(ClassId(class)),
            created_at: Default::default(),
            approved_at: None,
        }
    }

    #[tokio::test]
    async fn contradiction_detected_from_either_side() {
        let graph = MemoryGraph::new();
        graph
            .add_parameter(&Parameter::new("voice_mob").with_contradictions(["fix_ctv"]))
            .await
            .unwrap();
        graph.add_parameter(&Parameter::new("fix_ctv")).await.unwrap();

        let hits = graph
            .contradicting_parameters(&codes(&["fix_ctv", "voice_mob", "sms"]))
            .await
            .unwrap();
        assert_eq!(hits, codes(&["fix_ctv", "voice_mob"]));

        let constraints = graph
            .parameter_constraints(&"fix_ctv".into())
            .await
            .unwrap();
        assert_eq!(constraints.contradiction_parameters, codes(&["voice_mob"]));
    }

    #[tokio::test]
    async fn allow_edges_count_once_across_directions() {
        let graph = MemoryGraph::new();
        graph
            .add_class(&Class::new(3311).with_allowed_parameters(["fix_ctv"]))
            .await
            .unwrap();
        graph
            .add_parameter(&Parameter::new("fix_ctv").with_allowed_classes([ClassId(3311)]))
            .await
            .unwrap();
        graph
            .add_parameter(&Parameter::new("voice_fix").with_allowed_classes([ClassId(3311)]))
            .await
            .unwrap();

        let count = graph
            .allowed_parameter_count(ClassId(3311), &codes(&["fix_ctv", "voice_fix", "sms"]))
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            graph.class_constraints(ClassId(3311)).await.unwrap(),
            codes(&["fix_ctv", "voice_fix"])
        );
    }

    #[tokio::test]
    async fn inserted_parameter_reads_back_and_reads_are_idempotent() {
        let graph = MemoryGraph::new();
        graph
            .add_parameter(
                &Parameter::new("equipment rent")
                    .with_allowed_classes([ClassId(7), ClassId(3)])
                    .with_contradictions(["iot"]),
            )
            .await
            .unwrap();

        let first = graph
            .parameter_constraints(&"equipment rent".into())
            .await
            .unwrap();
        let second = graph
            .parameter_constraints(&"equipment rent".into())
            .await
            .unwrap();
        assert_eq!(first.allowed_classes, vec![ClassId(3), ClassId(7)]);
        assert_eq!(first.contradiction_parameters, codes(&["iot"]));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn replace_drops_stale_edges() {
        let graph = MemoryGraph::new();
        graph
            .add_class(&Class::new(1).with_allowed_parameters(["sms", "mms"]))
            .await
            .unwrap();
        graph
            .update_class(&Class::new(1).with_allowed_parameters(["sms"]))
            .await
            .unwrap();
        assert_eq!(graph.class_constraints(ClassId(1)).await.unwrap(), codes(&["sms"]));
        assert!(graph.contains(&Node::Class(ClassId(1))).await);

        graph.delete_class(ClassId(1)).await.unwrap();
        assert!(!graph.contains(&Node::Class(ClassId(1))).await);
        assert!(graph.class_constraints(ClassId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn candidates_collect_similar_services_excluding_self() {
        let graph = MemoryGraph::new();
        graph
            .add_class(&Class::new(10).with_allowed_parameters(["sms", "mms"]))
            .await
            .unwrap();
        graph
            .add_class(&Class::new(20).with_allowed_parameters(["sms"]))
            .await
            .unwrap();
        graph.add_service(&service(1, 10, &["sms"])).await.unwrap();
        graph.add_service(&service(2, 10, &["geo"])).await.unwrap();
        graph.add_service(&service(3, 10, &["mms"])).await.unwrap();

        let proposed = graph
            .candidate_classes(ServiceId(3), &codes(&["sms", "mms"]))
            .await
            .unwrap();
        assert_eq!(
            proposed,
            vec![
                ProposedClass {
                    class_id: ClassId(10),
                    matching_parameters: 2,
                    similar_services: vec![ServiceId(1)],
                },
                ProposedClass {
                    class_id: ClassId(20),
                    matching_parameters: 1,
                    similar_services: vec![],
                },
            ]
        );
    }
}
