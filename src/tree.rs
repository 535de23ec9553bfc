//! Cluster tree model as emitted by the external clustering tool.
//!
//! The tool's output is loosely shaped: any node may omit `name`, `score`
//! or `children`, and scores sometimes arrive as strings. Defaults are
//! substituted here, while deserializing, so the transforms only ever see a
//! fully populated tree.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Score used for items that carry no usable score.
pub const DEFAULT_SCORE: f64 = 0.5;

/// Root of a cluster tree. The root's own name is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClusterTree {
    #[serde(default, deserialize_with = "children_or_empty")]
    pub children: Vec<ClusterNode>,
}

/// A cluster or an item. Items are the second level below the root.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_score", deserialize_with = "lenient_score")]
    pub score: f64,
    #[serde(default, deserialize_with = "children_or_empty")]
    pub children: Vec<ClusterNode>,
}

impl ClusterNode {
    /// Name of this node, or `"<kind> <index + 1>"` when it has none.
    pub fn name_or(&self, kind: &str, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} {}", kind, index + 1),
        }
    }
}

/// Errors raised while reading a cluster tree or writing a derived tree.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("clusters file not found: {}", .0.display())]
    MissingTree(PathBuf),
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed cluster tree in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("item {name:?} has score {score}, which gives no circle size")]
    InvalidSize { name: String, score: f64 },
}

fn default_score() -> f64 {
    DEFAULT_SCORE
}

fn children_or_empty<'de, D>(deserializer: D) -> Result<Vec<ClusterNode>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<ClusterNode>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(score_from_value(&value))
}

/// Interpret a raw `score` field, falling back to [`DEFAULT_SCORE`].
pub fn score_from_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(DEFAULT_SCORE),
        Value::String(s) => s.trim().parse().unwrap_or(DEFAULT_SCORE),
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        _ => DEFAULT_SCORE,
    }
}

/// Load a cluster tree from a JSON file.
pub fn load(path: &Path) -> Result<ClusterTree, TreeError> {
    if !path.exists() {
        return Err(TreeError::MissingTree(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| TreeError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a derived tree as two-space indented JSON.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), TreeError> {
    let io_err = |source: io::Error| TreeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| TreeError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)
}
