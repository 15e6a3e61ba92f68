use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, VecDeque};
use std::fmt;

use colloquy_core::{DomainId, ServiceDescriptor, ServiceId, Topic};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::render::{EdgeKind, GraphDescription};
use crate::report::{ConsistencyReport, Defect, Note};

/// Which service subset a graph covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphScope {
    /// Domain-agnostic services only (the fallback path).
    Shared,
    /// One domain's services plus every domain-agnostic service.
    Domain(DomainId),
}

impl fmt::Display for GraphScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Domain(d) => write!(f, "{d}"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum GraphNode {
    Service(usize),
    Topic(Topic),
}

/// The data-flow graph of one domain-scoped service subset.
///
/// Services are referred to by their registration index. Nodes of the
/// underlying graph are services and topics; edges are "service publishes
/// topic" and "topic consumed by service". Feedback subscriptions are kept
/// beside the graph because they never create an edge inside one pass.
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    scope: GraphScope,
    members: BTreeMap<usize, ServiceDescriptor>,
    order: Vec<usize>,
    producers: BTreeMap<Topic, Vec<usize>>,
    consumers: BTreeMap<Topic, Vec<usize>>,
    feedback: BTreeMap<Topic, Vec<usize>>,
    pub(crate) graph: DiGraph<GraphNode, EdgeKind>,
    topic_nodes: HashMap<Topic, NodeIndex>,
    service_nodes: BTreeMap<usize, NodeIndex>,
}

impl PipelineGraph {
    fn new(scope: GraphScope, members: Vec<(usize, &ServiceDescriptor)>) -> Self {
        let mut graph = DiGraph::new();
        let mut topic_nodes: HashMap<Topic, NodeIndex> = HashMap::new();
        let mut service_nodes = BTreeMap::new();
        let mut producers: BTreeMap<Topic, Vec<usize>> = BTreeMap::new();
        let mut consumers: BTreeMap<Topic, Vec<usize>> = BTreeMap::new();
        let mut feedback: BTreeMap<Topic, Vec<usize>> = BTreeMap::new();

        for (idx, desc) in &members {
            let node = graph.add_node(GraphNode::Service(*idx));
            service_nodes.insert(*idx, node);

            for topic in &desc.publishes {
                let t = topic_node(&mut graph, &mut topic_nodes, topic);
                graph.add_edge(node, t, EdgeKind::Publishes);
                producers.entry(topic.clone()).or_default().push(*idx);
            }
            for topic in &desc.subscribes {
                let t = topic_node(&mut graph, &mut topic_nodes, topic);
                graph.add_edge(t, node, EdgeKind::Subscribes);
                consumers.entry(topic.clone()).or_default().push(*idx);
            }
            for topic in &desc.feedback {
                feedback.entry(topic.clone()).or_default().push(*idx);
            }
        }

        let members: BTreeMap<usize, ServiceDescriptor> = members
            .into_iter()
            .map(|(idx, desc)| (idx, desc.clone()))
            .collect();
        let order = topological_order(&members, &producers);

        Self {
            scope,
            members,
            order,
            producers,
            consumers,
            feedback,
            graph,
            topic_nodes,
            service_nodes,
        }
    }

    /// Which subset this graph covers.
    pub fn scope(&self) -> &GraphScope {
        &self.scope
    }

    /// Registration indices of member services, in registration order.
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.keys().copied()
    }

    /// Whether the service at `index` belongs to this graph.
    pub fn contains(&self, index: usize) -> bool {
        self.members.contains_key(&index)
    }

    /// Descriptor of a member service.
    pub fn descriptor(&self, index: usize) -> Option<&ServiceDescriptor> {
        self.members.get(&index)
    }

    /// Member services in dependency order. Ties are broken by
    /// registration order; services caught in a cycle come last.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Member service ids in dependency order.
    pub fn ordered_ids(&self) -> Vec<ServiceId> {
        self.order
            .iter()
            .filter_map(|idx| self.members.get(idx))
            .map(|d| d.id.clone())
            .collect()
    }

    /// Services publishing `topic`.
    pub fn producers(&self, topic: &str) -> &[usize] {
        self.producers.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Services subscribing to `topic` within a pass.
    pub fn consumers(&self, topic: &str) -> &[usize] {
        self.consumers.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every topic some member reads from the previous turn.
    pub fn feedback_topics(&self) -> impl Iterator<Item = &Topic> {
        self.feedback.keys()
    }

    /// Services reading `topic` from the previous turn.
    pub(crate) fn feedback_consumers(&self, topic: &str) -> &[usize] {
        self.feedback.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    fn ids(&self, indices: &[usize]) -> Vec<ServiceId> {
        indices
            .iter()
            .filter_map(|idx| self.members.get(idx))
            .map(|d| d.id.clone())
            .collect()
    }

    /// Services reachable within one pass from the seed topics, or from
    /// services that need nothing to fire.
    fn reachable_services(&self, seeds: &BTreeSet<Topic>) -> BTreeSet<usize> {
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        for seed in seeds {
            if let Some(node) = self.topic_nodes.get(seed) {
                queue.push_back(*node);
            }
        }
        for (idx, desc) in &self.members {
            if !desc.subscribes.is_empty() {
                continue;
            }
            if let Some(node) = self.service_nodes.get(idx) {
                queue.push_back(*node);
            }
        }

        let mut seen = vec![false; self.graph.node_count()];
        let mut reached = BTreeSet::new();
        while let Some(node) = queue.pop_front() {
            if std::mem::replace(&mut seen[node.index()], true) {
                continue;
            }
            if let GraphNode::Service(idx) = &self.graph[node] {
                reached.insert(*idx);
            }
            queue.extend(self.graph.neighbors_directed(node, Direction::Outgoing));
        }
        reached
    }

    fn check(
        &self,
        seeds: &BTreeSet<Topic>,
        session_topics: &BTreeSet<Topic>,
        report: &mut ConsistencyReport,
    ) {
        // Unreachable dependencies: consumed here, produced nowhere here.
        let consumed: BTreeSet<&Topic> = self.consumers.keys().chain(self.feedback.keys()).collect();
        for topic in consumed {
            if seeds.contains(topic) || !self.producers(topic.as_str()).is_empty() {
                continue;
            }
            let mut readers = self.consumers(topic.as_str()).to_vec();
            readers.extend_from_slice(self.feedback_consumers(topic.as_str()));
            readers.sort_unstable();
            readers.dedup();
            report.push_defect(Defect::UnreachableDependency {
                scope: self.scope.clone(),
                topic: topic.clone(),
                consumers: self.ids(&readers),
            });
        }

        for (topic, producers) in &self.producers {
            if producers.len() > 1 {
                report.push_defect(Defect::AmbiguousProducer {
                    scope: self.scope.clone(),
                    topic: topic.clone(),
                    producers: self.ids(producers),
                });
            }
        }

        for component in petgraph::algo::tarjan_scc(&self.graph) {
            if component.len() < 2 {
                continue;
            }
            let mut services: Vec<usize> = component
                .iter()
                .filter_map(|n| match &self.graph[*n] {
                    GraphNode::Service(idx) => Some(*idx),
                    GraphNode::Topic(_) => None,
                })
                .collect();
            services.sort_unstable();
            report.push_defect(Defect::Cycle {
                scope: self.scope.clone(),
                services: self.ids(&services),
            });
        }

        let reachable = self.reachable_services(seeds);
        for (idx, desc) in &self.members {
            let feeds_something = desc.publishes.iter().any(|t| {
                session_topics.contains(t)
                    || self.consumers(t.as_str()).iter().any(|c| c != idx)
                    || self.feedback_consumers(t.as_str()).iter().any(|c| c != idx)
            });
            if !reachable.contains(idx) && !feeds_something {
                report.push_defect(Defect::DanglingService {
                    scope: self.scope.clone(),
                    service: desc.id.clone(),
                });
            }
        }

        for (topic, producers) in &self.producers {
            let unread = self.consumers(topic.as_str()).is_empty()
                && self.feedback_consumers(topic.as_str()).is_empty()
                && !session_topics.contains(topic);
            if unread {
                report.push_note(Note::UnconsumedTopic {
                    scope: self.scope.clone(),
                    topic: topic.clone(),
                    producers: self.ids(producers),
                });
            }
        }
    }
}

fn topic_node(
    graph: &mut DiGraph<GraphNode, EdgeKind>,
    nodes: &mut HashMap<Topic, NodeIndex>,
    topic: &Topic,
) -> NodeIndex {
    *nodes
        .entry(topic.clone())
        .or_insert_with(|| graph.add_node(GraphNode::Topic(topic.clone())))
}

/// Kahn's algorithm over service -> service dependencies, always taking
/// the ready service with the lowest registration index.
fn topological_order(
    members: &BTreeMap<usize, ServiceDescriptor>,
    producers: &BTreeMap<Topic, Vec<usize>>,
) -> Vec<usize> {
    let mut successors: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    let mut in_degree: BTreeMap<usize, usize> = members.keys().map(|idx| (*idx, 0)).collect();

    for (idx, desc) in members {
        let predecessors: BTreeSet<usize> = desc
            .subscribes
            .iter()
            .flat_map(|t| producers.get(t).into_iter().flatten().copied())
            .filter(|p| p != idx)
            .collect();
        for p in predecessors {
            if successors.entry(p).or_default().insert(*idx) {
                *in_degree.entry(*idx).or_default() += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(idx, _)| Reverse(*idx))
        .collect();
    let mut order = Vec::with_capacity(members.len());
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for next in successors.get(&idx).into_iter().flatten() {
            if let Some(d) = in_degree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(*next));
                }
            }
        }
    }

    // Whatever is left sits on a cycle and can never become ready.
    for idx in members.keys() {
        if !order.contains(idx) {
            order.push(*idx);
        }
    }
    order
}

/// Every graph built at start-up: the shared fallback graph plus one graph
/// per domain, in domain registration order.
#[derive(Debug, Clone)]
pub struct PipelineGraphs {
    shared: PipelineGraph,
    domains: Vec<PipelineGraph>,
}

impl PipelineGraphs {
    /// The domain-agnostic graph.
    pub fn shared(&self) -> &PipelineGraph {
        &self.shared
    }

    /// A domain's graph.
    pub fn get(&self, domain: &DomainId) -> Option<&PipelineGraph> {
        self.domains
            .iter()
            .find(|g| matches!(g.scope(), GraphScope::Domain(d) if d == domain))
    }

    /// The graph for a scope.
    pub fn scoped(&self, scope: &GraphScope) -> Option<&PipelineGraph> {
        match scope {
            GraphScope::Shared => Some(&self.shared),
            GraphScope::Domain(d) => self.get(d),
        }
    }

    /// Domain graphs in registration order.
    pub fn domains(&self) -> impl Iterator<Item = &PipelineGraph> {
        self.domains.iter()
    }

    /// Whether any domain graph exists.
    pub fn has_domains(&self) -> bool {
        !self.domains.is_empty()
    }

    /// Structural description for rendering: the domain graphs, or the
    /// shared graph when no domain is registered.
    pub fn describe(&self) -> GraphDescription {
        if self.domains.is_empty() {
            GraphDescription::from_graphs([&self.shared])
        } else {
            GraphDescription::from_graphs(self.domains.iter())
        }
    }
}

/// Derives pipeline graphs from service descriptors.
///
/// Seed topics are supplied from outside each turn (the external input and
/// anything carried over), so they need no producer. Session topics are
/// read by the session itself (the end-of-conversation signal, the domain
/// classification topic), so publishing them counts as being consumed.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    seed_topics: BTreeSet<Topic>,
    session_topics: BTreeSet<Topic>,
}

impl GraphBuilder {
    /// Create a builder for pipelines seeded with `seed_topic`.
    pub fn new(seed_topic: impl Into<Topic>) -> Self {
        Self {
            seed_topics: BTreeSet::from([seed_topic.into()]),
            session_topics: BTreeSet::new(),
        }
    }

    /// Another topic supplied from outside the pass.
    pub fn with_seed_topic(mut self, topic: impl Into<Topic>) -> Self {
        self.seed_topics.insert(topic.into());
        self
    }

    /// A topic read by the session driver.
    pub fn with_session_topic(mut self, topic: impl Into<Topic>) -> Self {
        self.session_topics.insert(topic.into());
        self
    }

    /// Build one graph per domain plus the shared graph, and check them.
    ///
    /// Domain graphs are checked individually. The shared graph is only
    /// checked when there are no domains, because as a fallback path it is
    /// expected to be incomplete.
    pub fn build(
        &self,
        domains: &[DomainId],
        services: &[ServiceDescriptor],
    ) -> (PipelineGraphs, ConsistencyReport) {
        let mut report = ConsistencyReport::new();

        for desc in services {
            if let Some(domain) = &desc.domain {
                if !domains.contains(domain) {
                    report.push_defect(Defect::UnknownDomain {
                        service: desc.id.clone(),
                        domain: domain.clone(),
                    });
                }
            }
        }

        let shared_members: Vec<(usize, &ServiceDescriptor)> = services
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_shared())
            .collect();
        let shared = PipelineGraph::new(GraphScope::Shared, shared_members);

        let mut graphs = Vec::with_capacity(domains.len());
        for domain in domains {
            let members: Vec<(usize, &ServiceDescriptor)> = services
                .iter()
                .enumerate()
                .filter(|(_, d)| d.domain.as_ref().is_none_or(|own| own == domain))
                .collect();
            let graph = PipelineGraph::new(GraphScope::Domain(domain.clone()), members);
            graph.check(&self.seed_topics, &self.session_topics, &mut report);
            tracing::debug!(
                domain = %domain,
                services = graph.members.len(),
                order = ?graph.ordered_ids(),
                "colloquy.graph.built"
            );
            graphs.push(graph);
        }

        if domains.is_empty() {
            shared.check(&self.seed_topics, &self.session_topics, &mut report);
        }

        (
            PipelineGraphs {
                shared,
                domains: graphs,
            },
            report,
        )
    }
}
