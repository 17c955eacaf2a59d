//! Typed update statements for the constraint graph
//!
//! A [`Description`] is a node plus its outgoing edges; a [`Statement`]
//! wraps descriptions or nodes into one SPARQL update. Serialisation is
//! canonical so the exact statement text can be asserted in tests:
//!
//! ```text
//! PREFIX : <ns>
//! INSERT DATA {
//! 	:param_sms a :Parameter ;
//! 	:allowedClass :class_7 ;
//! 	:hasContradictionParameter :param_mms .
//! }
//! ```

use std::fmt;

use taxon_types::{Class, ClassId, Parameter, ParameterCode, Service, ServiceId};

/// Node type as asserted with `a :<Type>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Class,
    Parameter,
    Service,
}

impl NodeKind {
    /// Local-name prefix of nodes of this kind (`class_`, `param_`, `service_`).
    pub fn local_prefix(self) -> &'static str {
        match self {
            Self::Class => "class_",
            Self::Parameter => "param_",
            Self::Service => "service_",
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Class => "Class",
            Self::Parameter => "Parameter",
            Self::Service => "Service",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.type_name())
    }
}

/// A typed graph node. Displays as a prefixed name, e.g. `:class_3311`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    Class(ClassId),
    Parameter(ParameterCode),
    Service(ServiceId),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Class(_) => NodeKind::Class,
            Self::Parameter(_) => NodeKind::Parameter,
            Self::Service(_) => NodeKind::Service,
        }
    }

    /// Local name without the leading `:`.
    pub fn local_name(&self) -> String {
        let raw = match self {
            Self::Class(id) => id.to_string(),
            Self::Parameter(code) => escape_local(code.as_str()),
            Self::Service(id) => id.to_string(),
        };
        format!("{}{raw}", self.kind().local_prefix())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.local_name())
    }
}

impl From<ClassId> for Node {
    fn from(id: ClassId) -> Self {
        Self::Class(id)
    }
}

impl From<ParameterCode> for Node {
    fn from(code: ParameterCode) -> Self {
        Self::Parameter(code)
    }
}

impl From<&ParameterCode> for Node {
    fn from(code: &ParameterCode) -> Self {
        Self::Parameter(code.clone())
    }
}

impl From<ServiceId> for Node {
    fn from(id: ServiceId) -> Self {
        Self::Service(id)
    }
}

/// The fixed relation vocabulary of the constraint graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predicate {
    /// Class -> Parameter
    HasAllowedParameter,
    /// Parameter -> Class
    AllowedClass,
    /// Parameter -> Parameter, validated symmetrically
    HasContradictionParameter,
    /// Service -> Parameter
    HasParameter,
    /// Service -> Class
    HasClass,
}

impl Predicate {
    pub fn name(self) -> &'static str {
        match self {
            Self::HasAllowedParameter => "hasAllowedParameter",
            Self::AllowedClass => "allowedClass",
            Self::HasContradictionParameter => "hasContradictionParameter",
            Self::HasParameter => "hasParameter",
            Self::HasClass => "hasClass",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.name())
    }
}

/// One predicate with one or more objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub predicate: Predicate,
    pub objects: Vec<Node>,
}

/// A node and its outgoing edges, emitted in iteration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    pub subject: Node,
    pub edges: Vec<Edge>,
    /// Service blocks indent their edges one level deeper.
    nested: bool,
}

impl Description {
    pub fn new(subject: Node) -> Self {
        Self {
            subject,
            edges: Vec::new(),
            nested: false,
        }
    }

    /// Add one edge line per object.
    pub fn edge(mut self, predicate: Predicate, object: impl Into<Node>) -> Self {
        self.edges.push(Edge {
            predicate,
            objects: vec![object.into()],
        });
        self
    }

    /// Parameter node with its `allowedClass` and `hasContradictionParameter` edges.
    pub fn parameter(parameter: &Parameter) -> Self {
        let mut desc = Self::new(Node::Parameter(parameter.code.clone()));
        for class in &parameter.allowed_classes {
            desc = desc.edge(Predicate::AllowedClass, *class);
        }
        for other in &parameter.contradiction_parameters {
            desc = desc.edge(Predicate::HasContradictionParameter, other);
        }
        desc
    }

    /// Class node with its `hasAllowedParameter` edges.
    pub fn class(class: &Class) -> Self {
        let mut desc = Self::new(Node::Class(class.id));
        for code in &class.allowed_parameters {
            desc = desc.edge(Predicate::HasAllowedParameter, code);
        }
        desc
    }

    /// Service node with its class (if assigned) and parameter membership.
    pub fn service(service: &Service) -> Self {
        let mut desc = Self::new(Node::Service(service.id));
        desc.nested = true;
        if let Some(class_id) = service.class_id {
            desc.edges.push(Edge {
                predicate: Predicate::HasClass,
                objects: vec![Node::Class(class_id)],
            });
        }
        if !service.parameters.is_empty() {
            desc.edges.push(Edge {
                predicate: Predicate::HasParameter,
                objects: service.parameters.iter().map(Node::from).collect(),
            });
        }
        desc
    }

    /// Flatten into `(subject, predicate, object)` triples, type assertion excluded.
    pub fn triples(&self) -> Vec<(Node, Predicate, Node)> {
        self.edges
            .iter()
            .flat_map(|edge| {
                edge.objects
                    .iter()
                    .map(move |object| (self.subject.clone(), edge.predicate, object.clone()))
            })
            .collect()
    }

    fn write_block(&self, out: &mut String) {
        out.push('\t');
        out.push_str(&format!("{} a {}", self.subject, self.subject.kind()));
        let indent = if self.nested { "\t\t" } else { "\t" };
        for edge in &self.edges {
            let objects = edge
                .objects
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" , ");
            out.push_str(" ;\n");
            out.push_str(&format!("{indent}{} {objects}", edge.predicate));
        }
        out.push_str(" .\n");
    }
}

/// A complete update statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Declare a node and its edges.
    InsertData(Description),
    /// Replace every triple of the subject with the given description.
    Replace(Description),
    /// Remove every triple with the node as subject.
    DeleteSubject(Node),
}

impl Statement {
    pub fn subject(&self) -> &Node {
        match self {
            Self::InsertData(desc) | Self::Replace(desc) => &desc.subject,
            Self::DeleteSubject(node) => node,
        }
    }

    /// Serialise under the given namespace prefix.
    pub fn render(&self, prefix: &str) -> String {
        let mut out = format!("PREFIX : <{prefix}>\n");
        match self {
            Self::InsertData(desc) => {
                out.push_str("INSERT DATA {\n");
                desc.write_block(&mut out);
                out.push('}');
            }
            Self::Replace(desc) => {
                let subject = &desc.subject;
                out.push_str(&format!("DELETE {{\n\t{subject} ?p ?o .\n}}\n"));
                out.push_str("INSERT {\n");
                desc.write_block(&mut out);
                out.push_str("}\n");
                out.push_str(&format!("WHERE {{\n\tOPTIONAL {{ {subject} ?p ?o . }}\n}}"));
            }
            Self::DeleteSubject(node) => {
                out.push_str(&format!("DELETE {{\n\t{node} ?p ?o .\n}}\n"));
                out.push_str(&format!("WHERE {{\n\t{node} ?p ?o .\n}}"));
            }
        }
        out
    }
}

/// Percent-encode a code so values such as `equipment rent` stay valid
/// prefixed names. `.` and `~` pass `urlencoding` untouched but may not
/// appear bare in a local name.
pub(crate) fn escape_local(raw: &str) -> String {
    urlencoding::encode(raw)
        .replace('.', "%2E")
        .replace('~', "%7E")
}

/// Inverse of [`escape_local`].
pub(crate) fn unescape_local(escaped: &str) -> Result<String, std::string::FromUtf8Error> {
    urlencoding::decode(escaped).map(std::borrow::Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NS: &str = "http://example.org/taxon#";

    fn service(id: u64, class: Option<u64>, params: &[&str]) -> Service {
        Service {
            id: ServiceId(id),
            title: String::new(),
            parameters: params.iter().map(|p| ParameterCode::from(*p)).collect(),
            class_id: class.map(ClassId),
            created_at: Default::default(),
            approved_at: None,
        }
    }

    #[test]
    fn bare_parameter_is_terminated_with_full_stop() {
        let stmt = Statement::InsertData(Description::parameter(&Parameter::new("sms")));
        assert_eq!(
            stmt.render(NS),
            "PREFIX : <http://example.org/taxon#>\nINSERT DATA {\n\t:param_sms a :Parameter .\n}"
        );
    }

    #[test]
    fn parameter_edges_follow_iteration_order() {
        let parameter = Parameter::new("fix_ctv")
            .with_allowed_classes([ClassId(3311), ClassId(12)])
            .with_contradictions(["voice_mob"]);
        let stmt = Statement::InsertData(Description::parameter(&parameter));
        assert_eq!(
            stmt.render(NS),
            "PREFIX : <http://example.org/taxon#>\n\
             INSERT DATA {\n\
             \t:param_fix_ctv a :Parameter ;\n\
             \t:allowedClass :class_3311 ;\n\
             \t:allowedClass :class_12 ;\n\
             \t:hasContradictionParameter :param_voice_mob .\n\
             }"
        );
    }

    #[test]
    fn class_with_allowed_parameters() {
        let class = Class::new(3311).with_allowed_parameters(["fix_ctv", "voice_fix"]);
        let stmt = Statement::InsertData(Description::class(&class));
        assert_eq!(
            stmt.render(NS),
            "PREFIX : <http://example.org/taxon#>\n\
             INSERT DATA {\n\
             \t:class_3311 a :Class ;\n\
             \t:hasAllowedParameter :param_fix_ctv ;\n\
             \t:hasAllowedParameter :param_voice_fix .\n\
             }"
        );
    }

    #[test]
    fn service_groups_parameters_on_one_edge() {
        let stmt = Statement::InsertData(Description::service(&service(
            5,
            Some(3311),
            &["fix_ctv", "voice_fix"],
        )));
        assert_eq!(
            stmt.render(NS),
            "PREFIX : <http://example.org/taxon#>\n\
             INSERT DATA {\n\
             \t:service_5 a :Service ;\n\
             \t\t:hasClass :class_3311 ;\n\
             \t\t:hasParameter :param_fix_ctv , :param_voice_fix .\n\
             }"
        );
    }

    #[test]
    fn unclassified_service_without_parameters_is_bare() {
        let stmt = Statement::InsertData(Description::service(&service(9, None, &[])));
        assert!(stmt.render(NS).contains("\t:service_9 a :Service .\n"));
    }

    #[test]
    fn replace_deletes_then_reinserts_in_one_statement() {
        let class = Class::new(7).with_allowed_parameters(["sms"]);
        let text = Statement::Replace(Description::class(&class)).render(NS);
        assert_eq!(
            text,
            "PREFIX : <http://example.org/taxon#>\n\
             DELETE {\n\t:class_7 ?p ?o .\n}\n\
             INSERT {\n\t:class_7 a :Class ;\n\t:hasAllowedParameter :param_sms .\n}\n\
             WHERE {\n\tOPTIONAL { :class_7 ?p ?o . }\n}"
        );
    }

    #[test]
    fn delete_subject_scopes_to_node() {
        let text = Statement::DeleteSubject(Node::Parameter("mms".into())).render(NS);
        assert_eq!(
            text,
            "PREFIX : <http://example.org/taxon#>\n\
             DELETE {\n\t:param_mms ?p ?o .\n}\n\
             WHERE {\n\t:param_mms ?p ?o .\n}"
        );
    }

    #[test]
    fn codes_with_spaces_are_escaped() {
        let node = Node::Parameter("equipment rent".into());
        assert_eq!(node.to_string(), ":param_equipment%20rent");
        assert_eq!(unescape_local("equipment%20rent").unwrap(), "equipment rent");
        assert!(unescape_local("bad%FF").is_err());

        let dotted = Node::Parameter("v1.2~beta".into());
        assert_eq!(dotted.to_string(), ":param_v1%2E2%7Ebeta");
        assert_eq!(unescape_local("v1%2E2%7Ebeta").unwrap(), "v1.2~beta");
    }

    #[test]
    fn triples_flatten_grouped_edges() {
        let desc = Description::service(&service(1, Some(2), &["a", "b"]));
        let triples = desc.triples();
        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0].1, Predicate::HasClass);
        assert_eq!(triples[2].2, Node::Parameter("b".into()));
    }
}
