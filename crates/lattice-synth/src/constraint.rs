//! Constraint definitions for the cluster resource manager.
//!
//! An edge renders in two forms: the attribute map handed to the
//! resource manager's update call, and a one-line shell definition:
//!
//! ```text
//! order ord_db_web INFINITY: db:start web:promote symmetrical=false
//! colocation col_web_db -100: web:Started db:Master
//! ```
//!
//! In both forms an attribute equal to its declared default is left out.

use std::collections::BTreeMap;

use lattice_core::{ConstraintKind, ParamProvider, Score};
use lattice_graph::{ConstraintEdge, ResourceGraph, attr};

use crate::error::{SynthError, SynthResult};

/// Non-default attributes of `edge`, including its score.
pub(crate) fn attribute_map(
    edge: &ConstraintEdge,
    catalog: &dyn ParamProvider,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let score = edge.score.to_string();
    if !is_default(catalog, attr::SCORE, &score) {
        out.insert(attr::SCORE.to_string(), score);
    }
    for (name, value) in &edge.attributes {
        if name == attr::SCORE {
            continue;
        }
        if !is_default(catalog, name, value) {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}

fn is_default(catalog: &dyn ParamProvider, name: &str, value: &str) -> bool {
    match catalog.param(name) {
        Some(meta) => meta.is_default(value),
        None => value.trim().is_empty(),
    }
}

/// Id used for an edge, generating one for pending edges.
pub fn edge_id(edge: &ConstraintEdge, first: &str, second: &str) -> String {
    match &edge.id {
        Some(id) => id.clone(),
        None => match edge.kind {
            ConstraintKind::Order => format!("ord_{first}_{second}"),
            ConstraintKind::Colocation => format!("col_{first}_{second}"),
        },
    }
}

/// One-line shell definition of `edge`.
pub(crate) fn render_line(
    edge: &ConstraintEdge,
    graph: &ResourceGraph,
    catalog: &dyn ParamProvider,
) -> SynthResult<String> {
    let (Some(a), Some(b)) = (graph.name_of(edge.a), graph.name_of(edge.b)) else {
        return Err(SynthError::UnknownEndpoint { edge: edge.label() });
    };
    if edge.score == Score::Conflict {
        return Err(SynthError::ConflictingScore { edge: edge.label() });
    }

    let mut attrs = attribute_map(edge, catalog);
    let (a_suffix, b_suffix) = match edge.kind {
        ConstraintKind::Order => (attr::FIRST_ACTION, attr::THEN_ACTION),
        ConstraintKind::Colocation => (attr::RSC_ROLE, attr::WITH_RSC_ROLE),
    };
    let endpoint = |name: &str, suffix: Option<String>| match suffix {
        Some(s) => format!("{name}:{s}"),
        None => name.to_string(),
    };
    let first = endpoint(&a, attrs.remove(a_suffix));
    let second = endpoint(&b, attrs.remove(b_suffix));
    let score = attrs.remove(attr::SCORE);

    let mut line = format!("{} {}", edge.kind, edge_id(edge, &a, &b));
    match score {
        Some(score) => line.push_str(&format!(" {score}: {first} {second}")),
        None => line.push_str(&format!(": {first} {second}")),
    }
    for (name, value) in attrs {
        line.push_str(&format!(" {name}={value}"));
    }
    Ok(line)
}
