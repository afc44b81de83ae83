//! Machine-readable contracts of the celltrack file formats.
//!
//! These types mirror the JSON layout one-to-one; the `celltrack` crate converts
//! them into its graph model. Graphs use the node-link layout (`nodes` plus
//! `links`, each node carrying its position as `id`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DATA_FILE_VERSION: &str = "v1";

/// Project-specific extension of data files; loaded exactly like `.json`.
pub const FILE_EXTENSION: &str = "aut";

pub const KEY_VERSION: &str = "version";
pub const KEY_DIRECTED: &str = "directed";
pub const KEY_LINKS: &str = "links";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(
        rename = "_time_point_number",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub time_point_number: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedNode {
    pub id: SavedPosition,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLink {
    pub source: SavedPosition,
    pub target: SavedPosition,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkGraph {
    #[serde(default)]
    pub directed: bool,
    #[serde(default)]
    pub multigraph: bool,
    #[serde(default)]
    pub graph: Map<String, Value>,
    pub nodes: Vec<SavedNode>,
    #[serde(alias = "edges")]
    pub links: Vec<SavedLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFamilyScore {
    pub scores: BTreeMap<String, f64>,
    pub mother: SavedPosition,
    pub daughter1: SavedPosition,
    pub daughter2: SavedPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPath {
    pub points: Vec<[f64; 3]>,
    #[serde(default)]
    pub offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResolution {
    pub x_um: f64,
    pub y_um: f64,
    pub z_um: f64,
    pub t_m: f64,
}

/// Raw particle rows per time point: `[x, y, z, ...shape fields]`.
pub type SavedShapes = BTreeMap<String, Vec<Vec<Value>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFileV1 {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub shapes: SavedShapes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_scratch: Option<NodeLinkGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_baseline: Option<NodeLinkGraph>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub family_scores: Vec<SavedFamilyScore>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<(SavedPosition, SavedPosition)>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, Vec<SavedPath>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_resolution: Option<SavedResolution>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_offsets: Vec<SavedPosition>,
}

impl DataFileV1 {
    pub fn new() -> Self {
        Self {
            version: DATA_FILE_VERSION.to_string(),
            name: None,
            shapes: SavedShapes::new(),
            links_scratch: None,
            links_baseline: None,
            family_scores: vec![],
            connections: vec![],
            paths: BTreeMap::new(),
            image_resolution: None,
            image_offsets: vec![],
        }
    }
}

impl Default for DataFileV1 {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of an external linking run: links plus the family scores it computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkingResultFile {
    pub links: NodeLinkGraph,
    #[serde(default)]
    pub family_scores: Vec<SavedFamilyScore>,
}

/// What kind of document a parsed JSON value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    DataFile,
    LinkingResult,
    BareGraph,
    PositionsOnly,
}

impl DocumentKind {
    pub fn detect(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::PositionsOnly;
        };
        if object.contains_key(KEY_VERSION) {
            Self::DataFile
        } else if object.contains_key(KEY_DIRECTED) {
            Self::BareGraph
        } else if object.contains_key(KEY_LINKS) {
            Self::LinkingResult
        } else {
            Self::PositionsOnly
        }
    }
}

pub fn time_point_key(time_point_number: i32) -> String {
    time_point_number.to_string()
}

pub fn parse_time_point_key(key: &str) -> Option<i32> {
    key.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_link_graph_accepts_edges_alias() {
        let value = json!({
            "directed": false,
            "multigraph": false,
            "graph": {},
            "nodes": [{"id": {"x": 1.0, "y": 2.0, "z": 3.0, "_time_point_number": 4}, "ending": "dead"}],
            "edges": []
        });
        let graph: NodeLinkGraph = serde_json::from_value(value).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id.time_point_number, Some(4));
        assert_eq!(graph.nodes[0].attributes.get("ending"), Some(&json!("dead")));
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_node_link_graph_requires_nodes() {
        let value = json!({"directed": false, "links": []});
        assert!(serde_json::from_value::<NodeLinkGraph>(value).is_err());
    }

    #[test]
    fn test_detect_document_kind() {
        assert_eq!(
            DocumentKind::detect(&json!({"version": "v1"})),
            DocumentKind::DataFile
        );
        assert_eq!(
            DocumentKind::detect(&json!({"directed": false, "nodes": [], "links": []})),
            DocumentKind::BareGraph
        );
        assert_eq!(
            DocumentKind::detect(&json!({"links": {}, "family_scores": []})),
            DocumentKind::LinkingResult
        );
        assert_eq!(
            DocumentKind::detect(&json!({"1": [[1.0, 2.0, 3.0]]})),
            DocumentKind::PositionsOnly
        );
    }

    #[test]
    fn test_saved_position_omits_missing_time_point() {
        let position = SavedPosition {
            x: 1.0,
            y: 2.0,
            z: 3.0,
            time_point_number: None,
        };
        let text = serde_json::to_string(&position).unwrap();
        assert!(!text.contains("_time_point_number"));
    }
}
