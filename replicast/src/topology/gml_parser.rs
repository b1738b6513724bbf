// Replicast: Simulating Service-Anycast Routing
// Copyright (C) 2022  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Parses GML-style topology files

use crate::types::LinkWeight;

use petgraph::prelude::*;
use std::collections::HashMap;
use std::fs::read_to_string;
use thiserror::Error;

/// Node data parsed from a GML file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    /// The node label
    pub name: String,
}

/// Parses a GML file and returns the resulting graph. Node and edge sections
/// may appear in any order; edge weights default to 1 when absent. Labels
/// occurring twice get a `_N` suffix appended, where N is a number starting
/// from 1 (`_1` is appended to the second occurrence, and so on).
pub fn parse_gml_file(
    filename: impl AsRef<str>,
) -> Result<Graph<NodeData, LinkWeight, Undirected, u32>, GmlError> {
    parse_gml(&read_to_string(filename.as_ref())?)
}

/// Parses GML content from a string. See [`parse_gml_file`].
pub fn parse_gml(
    gml_str: &str,
) -> Result<Graph<NodeData, LinkWeight, Undirected, u32>, GmlError> {
    let mut g: Graph<NodeData, LinkWeight, Undirected, u32> =
        Graph::<NodeData, LinkWeight, Undirected, u32>::new_undirected();

    let mut current_state = CurrentState::NotStarted;

    let mut used_labels: HashMap<String, usize> = HashMap::new();
    let mut node_lookup: HashMap<usize, NodeIndex<u32>> = HashMap::new();

    for (i, line) in gml_str.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        current_state = match current_state {
            CurrentState::NotStarted => {
                if line == "graph [" {
                    CurrentState::None
                } else {
                    return Err(GmlError::UnexpectedToken { line: i, content: String::from(line) });
                }
            }
            CurrentState::None => {
                if line == "node [" {
                    CurrentState::Node { id: None, name: None }
                } else if line == "edge [" {
                    CurrentState::Edge { source: None, target: None, weight: None }
                } else {
                    CurrentState::None
                }
            }
            CurrentState::Node { id, name } => {
                if let Some(number) = line.strip_prefix("id ") {
                    let id: Option<usize> = Some(number.trim().parse()?);
                    CurrentState::Node { id, name }
                } else if let Some(label) = line.strip_prefix("label ") {
                    let mut name: String =
                        label.trim().trim_matches('"').replace(' ', "_");
                    // increment the number of uses in the hashmap
                    let num_used = *used_labels.get(&name).unwrap_or(&0);
                    used_labels.insert(name.clone(), num_used + 1);
                    if num_used > 0 {
                        name.push_str(&format!("_{}", num_used));
                    }
                    let name = Some(name);
                    CurrentState::Node { id, name }
                } else if line == "]" {
                    let name = name.ok_or(GmlError::NodeMissingLabel(i))?;
                    let node_idx = g.add_node(NodeData { name });
                    let id = id.ok_or(GmlError::NodeMissingId(i))?;
                    if node_lookup.contains_key(&id) {
                        return Err(GmlError::NodeIdNotUnique(i));
                    }
                    node_lookup.insert(id, node_idx);
                    CurrentState::None
                } else {
                    CurrentState::Node { id, name }
                }
            }
            CurrentState::Edge { source, target, weight } => {
                if let Some(number) = line.strip_prefix("source ") {
                    let source: Option<usize> = Some(number.trim().parse()?);
                    CurrentState::Edge { source, target, weight }
                } else if let Some(number) = line.strip_prefix("target ") {
                    let target: Option<usize> = Some(number.trim().parse()?);
                    CurrentState::Edge { source, target, weight }
                } else if let Some(number) = line
                    .strip_prefix("weight ")
                    .or_else(|| line.strip_prefix("value "))
                {
                    let weight: Option<LinkWeight> = Some(
                        number
                            .trim()
                            .parse()
                            .map_err(|_| GmlError::UnexpectedToken {
                                line: i,
                                content: String::from(line),
                            })?,
                    );
                    CurrentState::Edge { source, target, weight }
                } else if line == "]" {
                    let source = source.ok_or(GmlError::EdgeMissingSource(i))?;
                    let source_idx =
                        node_lookup.get(&source).ok_or(GmlError::UnknownNodeId(source))?;
                    let target = target.ok_or(GmlError::EdgeMissingTarget(i))?;
                    let target_idx =
                        node_lookup.get(&target).ok_or(GmlError::UnknownNodeId(target))?;
                    // check if the edge already exists
                    if g.contains_edge(*source_idx, *target_idx) {
                        // ignoring the duplicate link
                    } else {
                        g.add_edge(*source_idx, *target_idx, weight.unwrap_or(1.0));
                    }
                    CurrentState::None
                } else {
                    CurrentState::Edge { source, target, weight }
                }
            }
        };
    }

    Ok(g)
}

enum CurrentState {
    NotStarted,
    None,
    Node { id: Option<usize>, name: Option<String> },
    Edge { source: Option<usize>, target: Option<usize>, weight: Option<LinkWeight> },
}

/// Errors while parsing a GML file.
#[derive(Debug, Error)]
pub enum GmlError {
    /// Io Error
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    /// Unexpected Token
    #[error("Unexpected Token on line {line}: {content}")]
    UnexpectedToken {
        /// Line number of the token
        line: usize,
        /// Content of the line
        content: String,
    },
    /// ParseIntError
    #[error("Cannot parse an integer! {0}")]
    ParseIntError(#[from] std::num::ParseIntError),
    /// Unknown Node Id
    #[error("Unknown node id: {0}")]
    UnknownNodeId(usize),
    /// Node is missing an ID field
    #[error("Node is missing an ID field before line {0}!")]
    NodeMissingId(usize),
    /// Node is missing a label field
    #[error("Node is missing a label field before line {0}!")]
    NodeMissingLabel(usize),
    /// Duplicate Node Id
    #[error("Node ID is not unique on line {0}!")]
    NodeIdNotUnique(usize),
    /// Edge is missing the source field
    #[error("Edge is missing the source field before line {0}!")]
    EdgeMissingSource(usize),
    /// Edge is missing the target field
    #[error("Edge is missing the target field before line {0}!")]
    EdgeMissingTarget(usize),
}

#[cfg(test)]
mod test {
    use super::*;

    static SMALL_GML: &str = "\
graph [
  node [
    id 0
    label \"a\"
  ]
  node [
    id 1
    label \"b\"
  ]
  edge [
    source 0
    target 1
  ]
  node [
    id 2
    label \"c\"
  ]
  edge [
    source 1
    target 2
    weight 4
  ]
]
";

    #[test]
    fn test_small_gml() {
        let g = parse_gml(SMALL_GML).unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.node_weight(0.into()).unwrap().name, "a");
        assert_eq!(g.node_weight(1.into()).unwrap().name, "b");
        assert_eq!(g.node_weight(2.into()).unwrap().name, "c");
        // the default weight is 1, explicit weights are honored
        assert_eq!(g.edge_weight(0.into()).copied(), Some(1.0));
        assert_eq!(g.edge_weight(1.into()).copied(), Some(4.0));
    }

    #[test]
    fn test_duplicate_labels() {
        let gml = "\
graph [
  node [
    id 0
    label \"x\"
  ]
  node [
    id 1
    label \"x\"
  ]
]
";
        let g = parse_gml(gml).unwrap();
        assert_eq!(g.node_weight(0.into()).unwrap().name, "x");
        assert_eq!(g.node_weight(1.into()).unwrap().name, "x_1");
    }

    #[test]
    fn test_missing_label() {
        let gml = "graph [\n  node [\n    id 0\n  ]\n]\n";
        assert!(matches!(parse_gml(gml), Err(GmlError::NodeMissingLabel(_))));
    }

    #[test]
    fn test_unknown_edge_endpoint() {
        let gml = "\
graph [
  node [
    id 0
    label \"a\"
  ]
  edge [
    source 0
    target 7
  ]
]
";
        assert!(matches!(parse_gml(gml), Err(GmlError::UnknownNodeId(7))));
    }
}
