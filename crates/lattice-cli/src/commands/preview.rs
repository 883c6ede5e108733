use std::path::Path;

use anyhow::anyhow;
use lattice_core::{ConstraintKind, Score};
use lattice_graph::ConstraintEdge;

use super::load;

/// Dry-run a new constraint between two resources and print the report.
pub async fn preview(
    file: &Path,
    config: Option<&Path>,
    kind: ConstraintKind,
    first: &str,
    then: &str,
    score: &str,
) -> anyhow::Result<()> {
    let (_, cluster) = load(file, config)?;
    let graph = cluster.graph();
    let a = graph.key_of(first).ok_or_else(|| anyhow!("unknown resource {first}"))?;
    let b = graph.key_of(then).ok_or_else(|| anyhow!("unknown resource {then}"))?;
    let score = Score::parse(score)?;

    let edge = match kind {
        ConstraintKind::Order => ConstraintEdge::order(a, b, score),
        ConstraintKind::Colocation => ConstraintEdge::colocation(a, b, score),
    };
    let report = cluster.preview_constraint(edge).await;
    print!("{report}");
    Ok(())
}
