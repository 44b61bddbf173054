//! Incremental reconciliation of the rendered connectivity graph.
//!
//! The reconciler derives the expected node and edge sets from a workspace
//! snapshot and a fetched connection list, then diffs them against what the
//! surface currently shows. Elements that are already correct are left alone.

use crate::edge::EdgeDescriptor;
use crate::node::NodeDescriptor;
use crate::split_join::SplitJoinState;
use connectome_core::{
    ColoringOption, Connection, GraphConfig, GroupId, NeuronGroup, NeuronId, Workspace,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

static NO_IDS: BTreeSet<String> = BTreeSet::new();
static NO_OVERRIDES: SplitJoinState = SplitJoinState::new();

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOptions {
    pub include_neighboring_cells_as_individual_cells: bool,
    pub include_annotations: bool,
    pub include_post_embryonic: bool,
    pub coloring: ColoringOption,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self::from(&GraphConfig::default())
    }
}

impl From<&GraphConfig> for ReconcileOptions {
    fn from(config: &GraphConfig) -> Self {
        Self {
            include_neighboring_cells_as_individual_cells: config
                .include_neighboring_cells_as_individual_cells,
            include_annotations: config.include_annotations,
            include_post_embryonic: config.include_post_embryonic,
            coloring: config.coloring,
        }
    }
}

/// Read-only view of everything one reconciliation pass looks at.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    pub workspace: &'a Workspace,
    pub connections: &'a [Connection],
    pub current_nodes: &'a BTreeSet<String>,
    pub current_edges: &'a BTreeSet<String>,
    pub split_join: &'a SplitJoinState,
    pub hidden: &'a BTreeSet<NeuronId>,
    pub open_groups: &'a BTreeSet<GroupId>,
}

impl<'a> ReconcileInput<'a> {
    /// Input for an empty surface with no overrides.
    pub fn new(workspace: &'a Workspace, connections: &'a [Connection]) -> Self {
        Self {
            workspace,
            connections,
            current_nodes: &NO_IDS,
            current_edges: &NO_IDS,
            split_join: &NO_OVERRIDES,
            hidden: &NO_IDS,
            open_groups: &NO_IDS,
        }
    }

    pub fn with_current(mut self, nodes: &'a BTreeSet<String>, edges: &'a BTreeSet<String>) -> Self {
        self.current_nodes = nodes;
        self.current_edges = edges;
        self
    }

    pub fn with_split_join(mut self, state: &'a SplitJoinState) -> Self {
        self.split_join = state;
        self
    }

    pub fn with_hidden(mut self, hidden: &'a BTreeSet<NeuronId>) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_open_groups(mut self, open_groups: &'a BTreeSet<GroupId>) -> Self {
        self.open_groups = open_groups;
        self
    }
}

/// Changes that bring a rendered graph to the expected state. Every list is
/// sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDiff {
    pub nodes_to_add: Vec<NodeDescriptor>,
    pub nodes_to_remove: Vec<String>,
    pub edges_to_add: Vec<EdgeDescriptor>,
    pub edges_to_remove: Vec<String>,
}

impl GraphDiff {
    pub fn is_empty(&self) -> bool {
        self.nodes_to_add.is_empty()
            && self.nodes_to_remove.is_empty()
            && self.edges_to_add.is_empty()
            && self.edges_to_remove.is_empty()
    }
}

/// Adapter over whatever draws the graph. `apply` must perform the diff as a
/// single batched mutation.
pub trait RenderSurface {
    fn node_ids(&self) -> BTreeSet<String>;
    fn edge_ids(&self) -> BTreeSet<String>;
    fn apply(&mut self, diff: &GraphDiff);
}

/// In-memory surface, used headless and in tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedGraph {
    pub nodes: BTreeMap<String, NodeDescriptor>,
    pub edges: BTreeMap<String, EdgeDescriptor>,
}

impl RenderedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&NodeDescriptor> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeDescriptor> {
        self.edges.get(id)
    }
}

impl RenderSurface for RenderedGraph {
    fn node_ids(&self) -> BTreeSet<String> {
        self.nodes.keys().cloned().collect()
    }

    fn edge_ids(&self) -> BTreeSet<String> {
        self.edges.keys().cloned().collect()
    }

    fn apply(&mut self, diff: &GraphDiff) {
        for id in &diff.edges_to_remove {
            self.edges.remove(id);
        }
        for id in &diff.nodes_to_remove {
            self.nodes.remove(id);
        }
        // edges cannot outlive their endpoints
        let nodes = &self.nodes;
        self.edges
            .retain(|_, edge| nodes.contains_key(&edge.source) && nodes.contains_key(&edge.target));

        for node in &diff.nodes_to_add {
            self.nodes.insert(node.id.clone(), node.clone());
        }
        for edge in &diff.edges_to_add {
            self.edges.insert(edge.id.clone(), edge.clone());
        }
    }
}

/// A connection that survived filtering, with endpoints re-keyed for
/// join and group projections.
struct Routed<'c> {
    connection: &'c Connection,
    source: NeuronId,
    target: NeuronId,
}

#[derive(Debug, Clone, Default)]
pub struct GraphReconciler {
    options: ReconcileOptions,
}

impl GraphReconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn reconcile(&self, input: &ReconcileInput<'_>) -> GraphDiff {
        let ws = input.workspace;
        let opts = &self.options;
        let class_index = ws.class_index();

        let passes_filter = |id: &str| match ws.neuron(id) {
            Some(neuron) => opts.include_post_embryonic || neuron.embryonic,
            None => true,
        };
        let is_redundant_class = |id: &str| {
            ws.is_class(id)
                && class_index
                    .get(id)
                    .map(|cells| cells.iter().all(|cell| ws.active_neurons.contains(cell)))
                    .unwrap_or(false)
        };

        // Step 1: active neurons plus the endpoints of surviving connections.
        let mut nodes: BTreeSet<NeuronId> = ws
            .active_neurons
            .iter()
            .filter(|id| !input.hidden.contains(*id))
            .filter(|id| passes_filter(id))
            .filter(|id| !is_redundant_class(id))
            .cloned()
            .collect();

        let mut routed: Vec<Routed<'_>> = Vec::new();
        for connection in input.connections {
            let visible = !input.hidden.contains(&connection.pre)
                && !input.hidden.contains(&connection.post)
                && passes_filter(&connection.pre)
                && passes_filter(&connection.post);
            if !visible {
                continue;
            }
            nodes.insert(connection.pre.clone());
            nodes.insert(connection.post.clone());
            routed.push(Routed {
                connection,
                source: connection.pre.clone(),
                target: connection.post.clone(),
            });
        }

        // Step 3: split/join projection.
        let split = input.split_join.split();
        let join = input.split_join.join();
        let mut split_exceptions: BTreeSet<NeuronId> = BTreeSet::new();
        let mut join_exceptions: BTreeSet<NeuronId> = BTreeSet::new();

        for class in split {
            if nodes.remove(class) {
                if let Some(cells) = class_index.get(class) {
                    split_exceptions.extend(cells.iter().cloned());
                }
            }
        }
        for cell in join {
            if nodes.remove(cell) {
                if let Some(class) = ws.class_of(cell) {
                    join_exceptions.insert(class.clone());
                }
            }
        }
        // Exceptions still obey the hidden and post-embryonic filters.
        let admissible = |id: &NeuronId| !input.hidden.contains(id) && passes_filter(id.as_str());
        split_exceptions.retain(|id| admissible(id));
        join_exceptions.retain(|id| admissible(id));
        nodes.extend(split_exceptions.iter().cloned());
        nodes.extend(join_exceptions.iter().cloned());

        let as_individuals = opts.include_neighboring_cells_as_individual_cells;
        nodes.retain(|id| {
            if ws.active_neurons.contains(id) {
                return true;
            }
            if as_individuals {
                !(class_index.contains_key(id) && ws.is_class(id)) || join_exceptions.contains(id)
            } else {
                !ws.is_cell(id) || split_exceptions.contains(id)
            }
        });

        for route in routed.iter_mut() {
            for endpoint in [&mut route.source, &mut route.target] {
                if join.contains(endpoint.as_str()) {
                    if let Some(class) = ws.class_of(endpoint.as_str()) {
                        *endpoint = class.clone();
                    }
                }
            }
        }
        routed.retain(|route| nodes.contains(&route.source) && nodes.contains(&route.target));

        // Step 4: group projection.
        let mut membership: BTreeMap<&str, &NeuronGroup> = BTreeMap::new();
        for group in ws.neuron_groups.values() {
            for member in &group.neurons {
                membership.entry(member.as_str()).or_insert(group);
            }
        }

        let mut expected_nodes: BTreeMap<String, NodeDescriptor> = BTreeMap::new();
        for id in &nodes {
            match membership.get(id.as_str()) {
                Some(group) if !input.open_groups.contains(&group.id) => {
                    expected_nodes
                        .entry(group.id.clone())
                        .or_insert_with(|| NodeDescriptor::for_group(group, ws));
                }
                Some(group) => {
                    expected_nodes
                        .entry(group.id.clone())
                        .or_insert_with(|| NodeDescriptor::for_group(group, ws));
                    expected_nodes.insert(
                        id.clone(),
                        NodeDescriptor::for_neuron(id, ws, opts.coloring, Some(group.id.clone())),
                    );
                }
                None => {
                    expected_nodes.insert(
                        id.clone(),
                        NodeDescriptor::for_neuron(id, ws, opts.coloring, None),
                    );
                }
            }
        }

        let mut expected_edges: BTreeMap<String, EdgeDescriptor> = BTreeMap::new();
        for route in routed {
            let rekey = |id: NeuronId| match membership.get(id.as_str()) {
                Some(group) if !input.open_groups.contains(&group.id) => group.id.clone(),
                _ => id,
            };
            let edge = EdgeDescriptor::from_connection(
                route.connection,
                rekey(route.source),
                rekey(route.target),
                opts.include_annotations,
            );
            match expected_edges.get_mut(&edge.id) {
                Some(existing) => existing.merge(edge),
                None => {
                    expected_edges.insert(edge.id.clone(), edge);
                }
            }
        }

        // Step 5: diff against the rendered state.
        let expected_ids: BTreeSet<&String> = expected_nodes.keys().collect();
        let nodes_to_remove: Vec<String> = input
            .current_nodes
            .iter()
            .filter(|id| !expected_ids.contains(id))
            .cloned()
            .collect();
        let diff = GraphDiff {
            nodes_to_remove,
            nodes_to_add: expected_nodes
                .into_iter()
                .filter(|(id, _)| !input.current_nodes.contains(id))
                .map(|(_, node)| node)
                .collect(),
            edges_to_remove: input
                .current_edges
                .iter()
                .filter(|id| !expected_edges.contains_key(*id))
                .cloned()
                .collect(),
            edges_to_add: expected_edges
                .into_iter()
                .filter(|(id, _)| !input.current_edges.contains(id))
                .map(|(_, edge)| edge)
                .collect(),
        };

        counter!("graph_reconciliations_total").increment(1);
        counter!("graph_nodes_added_total").increment(diff.nodes_to_add.len() as u64);
        counter!("graph_nodes_removed_total").increment(diff.nodes_to_remove.len() as u64);
        debug!(
            nodes_added = diff.nodes_to_add.len(),
            nodes_removed = diff.nodes_to_remove.len(),
            edges_added = diff.edges_to_add.len(),
            edges_removed = diff.edges_to_remove.len(),
            "graph reconciled"
        );
        trace!(split = split.len(), join = join.len(), "split/join overrides applied");
        diff
    }

    /// Reconcile against what `surface` currently shows and apply the result.
    pub fn sync_surface<S: RenderSurface>(&self, surface: &mut S, input: &ReconcileInput<'_>) -> GraphDiff {
        let nodes = surface.node_ids();
        let edges = surface.edge_ids();
        let current = ReconcileInput {
            current_nodes: &nodes,
            current_edges: &edges,
            ..*input
        };
        let diff = self.reconcile(&current);
        if !diff.is_empty() {
            surface.apply(&diff);
        }
        diff
    }
}
