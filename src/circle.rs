//! Circle-packing layout derived from a cluster tree.

use std::path::Path;

use log::info;
use serde::Serialize;

use crate::tree::{self, ClusterTree, TreeError};

const MIN_SIZE: f64 = 100.0;
const SIZE_SPAN: f64 = 1900.0;

/// Root of a circle-packing tree: `root` → clusters → sized leaves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CirclePacking {
    pub name: String,
    pub children: Vec<CircleCluster>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleCluster {
    pub name: String,
    pub children: Vec<CircleLeaf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleLeaf {
    pub name: String,
    pub size: i64,
}

/// Map a similarity score onto a circle size, `floor(100 + score * 1900)`.
///
/// Scores outside `[0, 1]` are not clamped. Returns `None` when the result
/// is not a finite number.
pub fn circle_size(score: f64) -> Option<i64> {
    let size = (MIN_SIZE + score * SIZE_SPAN).floor();
    size.is_finite().then_some(size as i64)
}

/// Build the circle-packing tree. Only the first two levels are walked.
pub fn build(tree: &ClusterTree) -> Result<CirclePacking, TreeError> {
    let mut children = Vec::with_capacity(tree.children.len());
    for (i, cluster) in tree.children.iter().enumerate() {
        let mut leaves = Vec::with_capacity(cluster.children.len());
        for (j, item) in cluster.children.iter().enumerate() {
            let name = item.name_or("Item", j);
            let size = circle_size(item.score).ok_or_else(|| TreeError::InvalidSize {
                name: name.clone(),
                score: item.score,
            })?;
            leaves.push(CircleLeaf { name, size });
        }
        // Cluster labels are positional even when the tool named them.
        children.push(CircleCluster {
            name: format!("Cluster {}", i + 1),
            children: leaves,
        });
    }
    Ok(CirclePacking {
        name: "root".to_string(),
        children,
    })
}

/// Read the cluster tree at `clusters` and write its circle packing to `output`.
pub fn write_circle(clusters: &Path, output: &Path) -> Result<CirclePacking, TreeError> {
    let packing = build(&tree::load(clusters)?)?;
    tree::write_json(&packing, output)?;
    info!("Created circle packing: {}", output.display());
    Ok(packing)
}
