//! Read-only structural description of the pipeline graphs.

use std::fmt::Write as _;

use colloquy_core::DomainId;
use serde::{Deserialize, Serialize};

use crate::builder::{GraphNode, GraphScope, PipelineGraph};

/// Kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A processing stage.
    Service,
    /// A data slot in the envelope.
    Topic,
}

/// Kind of a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// service -> topic
    Publishes,
    /// topic -> service, within one pass
    Subscribes,
    /// topic -> service, read from the previous turn
    Feedback,
}

/// One node of a rendered graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Unique within its scope: `service:<name>` or `topic:<name>`.
    pub id: String,
    /// Display label (the bare name).
    pub label: String,
    /// Node kind.
    pub kind: NodeKind,
    /// Domain affinity of a service node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainId>,
}

/// One edge of a rendered graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescription {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Edge kind.
    pub kind: EdgeKind,
}

/// The rendered graph of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedGraph {
    /// Which graph this is.
    pub scope: GraphScope,
    /// Services first (dependency order), then topics (name order).
    pub nodes: Vec<NodeDescription>,
    /// Publish, subscribe and feedback relations.
    pub edges: Vec<EdgeDescription>,
}

impl ScopedGraph {
    fn from_graph(graph: &PipelineGraph) -> Self {
        let mut nodes = Vec::new();
        for idx in graph.order() {
            if let Some(desc) = graph.descriptor(*idx) {
                nodes.push(NodeDescription {
                    id: service_node_id(desc.id.as_str()),
                    label: desc.id.to_string(),
                    kind: NodeKind::Service,
                    domain: desc.domain.clone(),
                });
            }
        }

        let mut topics: Vec<String> = graph
            .graph
            .node_weights()
            .filter_map(|n| match n {
                GraphNode::Topic(t) => Some(t.to_string()),
                GraphNode::Service(_) => None,
            })
            .chain(graph.feedback_topics().map(|t| t.to_string()))
            .collect();
        topics.sort();
        topics.dedup();
        for topic in &topics {
            nodes.push(NodeDescription {
                id: topic_node_id(topic),
                label: topic.clone(),
                kind: NodeKind::Topic,
                domain: None,
            });
        }

        let mut edges = Vec::new();
        for idx in graph.order() {
            let Some(desc) = graph.descriptor(*idx) else {
                continue;
            };
            let service = service_node_id(desc.id.as_str());
            for topic in &desc.subscribes {
                edges.push(EdgeDescription {
                    from: topic_node_id(topic.as_str()),
                    to: service.clone(),
                    kind: EdgeKind::Subscribes,
                });
            }
            for topic in &desc.feedback {
                edges.push(EdgeDescription {
                    from: topic_node_id(topic.as_str()),
                    to: service.clone(),
                    kind: EdgeKind::Feedback,
                });
            }
            for topic in &desc.publishes {
                edges.push(EdgeDescription {
                    from: service.clone(),
                    to: topic_node_id(topic.as_str()),
                    kind: EdgeKind::Publishes,
                });
            }
        }

        Self {
            scope: graph.scope().clone(),
            nodes,
            edges,
        }
    }
}

/// Structural description of the system graph, suitable for visual
/// rendering. Building it has no effect on scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescription {
    /// One entry per rendered scope.
    pub scopes: Vec<ScopedGraph>,
}

impl GraphDescription {
    pub(crate) fn from_graphs<'a>(graphs: impl IntoIterator<Item = &'a PipelineGraph>) -> Self {
        Self {
            scopes: graphs.into_iter().map(ScopedGraph::from_graph).collect(),
        }
    }

    /// The rendered graph of a scope.
    pub fn scope(&self, scope: &GraphScope) -> Option<&ScopedGraph> {
        self.scopes.iter().find(|s| &s.scope == scope)
    }

    /// Render as Graphviz DOT: one cluster per scope, services as boxes,
    /// topics as ellipses, feedback edges dashed.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n  rankdir=LR;\n");
        for (i, scoped) in self.scopes.iter().enumerate() {
            let prefix = scoped.scope.to_string();
            let _ = writeln!(out, "  subgraph cluster_{i} {{");
            let _ = writeln!(out, "    label=\"{}\";", escape(&prefix));
            for node in &scoped.nodes {
                let shape = match node.kind {
                    NodeKind::Service => "box",
                    NodeKind::Topic => "ellipse",
                };
                let _ = writeln!(
                    out,
                    "    \"{}\" [label=\"{}\", shape={shape}];",
                    escape(&format!("{prefix}/{}", node.id)),
                    escape(&node.label)
                );
            }
            for edge in &scoped.edges {
                let style = match edge.kind {
                    EdgeKind::Feedback => " [style=dashed]",
                    EdgeKind::Publishes | EdgeKind::Subscribes => "",
                };
                let _ = writeln!(
                    out,
                    "    \"{}\" -> \"{}\"{style};",
                    escape(&format!("{prefix}/{}", edge.from)),
                    escape(&format!("{prefix}/{}", edge.to))
                );
            }
            out.push_str("  }\n");
        }
        out.push_str("}\n");
        out
    }
}

fn service_node_id(name: &str) -> String {
    format!("service:{name}")
}

fn topic_node_id(name: &str) -> String {
    format!("topic:{name}")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
