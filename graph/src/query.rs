//! SELECT queries issued by the gateway
//!
//! Allow edges are declared from either side (`Class hasAllowedParameter P`
//! or `P allowedClass Class`), so every query that reads them unions both
//! directions. Contradiction edges are likewise read symmetrically.

use taxon_types::{ClassId, ParameterCode, ServiceId};

use crate::statement::Node;

/// Variable names bound by the queries below.
pub mod vars {
    pub const CONTRADICTION: &str = "contradictionParam";
    pub const CLASS: &str = "class";
    pub const ALLOWED_PARAM: &str = "allowedParam";
    pub const P1: &str = "p1";
    pub const MATCHING: &str = "matching";
    pub const MATCHING_PARAMETERS: &str = "matching_parameter_numbers";
    pub const SIMILAR_SERVICES: &str = "similar_services";
}

fn header(prefix: &str) -> String {
    format!("PREFIX : <{prefix}>\n")
}

fn values(codes: &[ParameterCode]) -> String {
    codes
        .iter()
        .map(|code| Node::from(code).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parameter_contradictions(prefix: &str, code: &ParameterCode) -> String {
    let param = Node::from(code);
    format!(
        "{}SELECT DISTINCT ?{var}\nWHERE {{\n\
         \t{{ {param} :hasContradictionParameter ?{var} . }}\n\
         \tUNION\n\
         \t{{ ?{var} :hasContradictionParameter {param} . }}\n\
         }}",
        header(prefix),
        var = vars::CONTRADICTION,
    )
}

pub fn parameter_allowed_classes(prefix: &str, code: &ParameterCode) -> String {
    let param = Node::from(code);
    format!(
        "{}SELECT DISTINCT ?{var}\nWHERE {{\n\
         \t{{ ?{var} :hasAllowedParameter {param} . }}\n\
         \tUNION\n\
         \t{{ {param} :allowedClass ?{var} . }}\n\
         }}",
        header(prefix),
        var = vars::CLASS,
    )
}

pub fn class_allowed_parameters(prefix: &str, class_id: ClassId) -> String {
    let class = Node::from(class_id);
    format!(
        "{}SELECT DISTINCT ?{var}\nWHERE {{\n\
         \t{{ {class} :hasAllowedParameter ?{var} . }}\n\
         \tUNION\n\
         \t{{ ?{var} :allowedClass {class} . }}\n\
         }}",
        header(prefix),
        var = vars::ALLOWED_PARAM,
    )
}

/// Every code in `codes` that participates in a contradiction with another
/// code of the same set, whichever side declared the edge.
pub fn contradicting_parameters(prefix: &str, codes: &[ParameterCode]) -> String {
    let pool = values(codes);
    format!(
        "{}SELECT DISTINCT ?p1\nWHERE {{\n\
         \tVALUES ?p1 {{ {pool} }}\n\
         \tVALUES ?p2 {{ {pool} }}\n\
         \tFILTER(?p1 != ?p2)\n\
         \t{{ ?p1 :hasContradictionParameter ?p2 . }}\n\
         \tUNION\n\
         \t{{ ?p2 :hasContradictionParameter ?p1 . }}\n\
         }}",
        header(prefix),
    )
}

/// Number of distinct parameters from `codes` the class allows.
pub fn allowed_parameter_count(prefix: &str, class_id: ClassId, codes: &[ParameterCode]) -> String {
    let class = Node::from(class_id);
    let pool = values(codes);
    format!(
        "{}SELECT (COUNT(DISTINCT ?allowedParam) AS ?{matching})\nWHERE {{\n\
         \tVALUES ?allowedParam {{ {pool} }}\n\
         \t{{ {class} :hasAllowedParameter ?allowedParam . }}\n\
         \tUNION\n\
         \t{{ ?allowedParam :allowedClass {class} . }}\n\
         }}",
        header(prefix),
        matching = vars::MATCHING,
    )
}

/// Classes sharing at least one allowed parameter with `codes`, with the
/// overlap size and the other services already assigned that class which
/// carry one of the overlapping parameters.
pub fn candidate_classes(prefix: &str, service_id: ServiceId, codes: &[ParameterCode]) -> String {
    let pool = values(codes);
    let service = Node::from(service_id);
    format!(
        "{header}SELECT ?class (COUNT(DISTINCT ?commonParam) AS ?{matching}) \
         (GROUP_CONCAT(DISTINCT STR(?similarService); SEPARATOR=\",\") AS ?{similar})\n\
         WHERE {{\n\
         \tVALUES ?commonParam {{ {pool} }}\n\
         \t?class a :Class .\n\
         \t{{ ?class :hasAllowedParameter ?commonParam . }}\n\
         \tUNION\n\
         \t{{ ?commonParam :allowedClass ?class . }}\n\
         \tOPTIONAL {{\n\
         \t\t?similarService a :Service ;\n\
         \t\t\t:hasParameter ?commonParam ;\n\
         \t\t\t:hasClass ?class .\n\
         \t\tFILTER(?similarService != {service})\n\
         \t}}\n\
         }}\n\
         GROUP BY ?class\n\
         ORDER BY DESC(?{matching})",
        header = header(prefix),
        matching = vars::MATCHING_PARAMETERS,
        similar = vars::SIMILAR_SERVICES,
    )
}
