//! Force-directed node/link graph derived from a cluster tree.
//!
//! The graph is a star of stars: a synthetic root at index 0, one node per
//! cluster linked to the root, and one node per item linked to its cluster.

use std::path::Path;

use log::info;
use serde::Serialize;

use crate::tree::{self, ClusterTree, TreeError};

pub const ROOT_GROUP: u8 = 1;
pub const CLUSTER_GROUP: u8 = 2;
pub const ITEM_GROUP: u8 = 3;

const CLUSTER_LINK: u8 = 2;
const ITEM_LINK: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub name: String,
    pub group: u8,
}

/// Link between two node indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphLink {
    pub source: usize,
    pub target: usize,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForceGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl ForceGraph {
    fn with_root() -> Self {
        ForceGraph {
            nodes: vec![GraphNode {
                name: "Root".to_string(),
                group: ROOT_GROUP,
            }],
            links: Vec::new(),
        }
    }

    /// Append a node and link it from `parent`, returning the new node's index.
    fn attach(&mut self, parent: usize, name: String, group: u8, value: u8) -> usize {
        let index = self.nodes.len();
        self.nodes.push(GraphNode { name, group });
        self.links.push(GraphLink {
            source: parent,
            target: index,
            value,
        });
        index
    }
}

/// Build the node/link graph for the first two levels of `tree`.
pub fn build(tree: &ClusterTree) -> ForceGraph {
    let mut graph = ForceGraph::with_root();
    for (i, cluster) in tree.children.iter().enumerate() {
        let cluster_index =
            graph.attach(0, cluster.name_or("Cluster", i), CLUSTER_GROUP, CLUSTER_LINK);
        for (j, item) in cluster.children.iter().enumerate() {
            graph.attach(cluster_index, item.name_or("Item", j), ITEM_GROUP, ITEM_LINK);
        }
    }
    graph
}

/// Read the cluster tree at `clusters` and write its graph to `output`.
pub fn write_graph(clusters: &Path, output: &Path) -> Result<ForceGraph, TreeError> {
    let graph = build(&tree::load(clusters)?);
    tree::write_json(&graph, output)?;
    info!("Created force graph: {}", output.display());
    Ok(graph)
}
