use crate::sets;
use crate::{GroupId, Neuron, NeuronId, Position, ViewerType, Visibility};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const DEFAULT_GROUP_COLOR: &str = "#9FEE9A";

/// A user-defined merge of neurons rendered as a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronGroup {
    pub id: GroupId,
    pub name: String,
    pub color: String,
    pub neurons: BTreeSet<NeuronId>,
}

impl NeuronGroup {
    pub fn new(id: impl Into<GroupId>, neurons: BTreeSet<NeuronId>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            color: DEFAULT_GROUP_COLOR.to_string(),
            neurons,
        }
    }
}

/// Per-viewer presentation state of a neuron.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerData {
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub default_position: Option<Position>,
}

/// Shared workspace state. Snapshots are never mutated by the engines; an
/// owner applies [`WorkspaceUpdate`]s to obtain the next snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active_neurons: BTreeSet<NeuronId>,
    #[serde(default)]
    pub selected_neurons: BTreeSet<NeuronId>,
    #[serde(default)]
    pub available_neurons: BTreeMap<NeuronId, Neuron>,
    #[serde(default)]
    pub neuron_groups: BTreeMap<GroupId, NeuronGroup>,
    #[serde(default)]
    pub visibilities: BTreeMap<NeuronId, BTreeMap<ViewerType, ViewerData>>,
}

impl Workspace {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_active<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NeuronId>,
    {
        self.active_neurons = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_selected<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NeuronId>,
    {
        self.selected_neurons = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_group(mut self, group: NeuronGroup) -> Self {
        self.neuron_groups.insert(group.id.clone(), group);
        self
    }

    pub fn with_graph_position(mut self, id: impl Into<NeuronId>, position: Position) -> Self {
        self.visibilities
            .entry(id.into())
            .or_default()
            .entry(ViewerType::Graph)
            .or_default()
            .default_position = Some(position);
        self
    }

    /// Replace the available neurons with a freshly fetched dataset listing.
    /// A class representative (`name == nclass`) is synthesized for every
    /// class seen. Viewer state of previously known neurons is preserved; new
    /// neurons start `Visible` in the graph when active, `Unset` otherwise.
    pub fn load_neurons<I>(&self, neurons: I) -> Workspace
    where
        I: IntoIterator<Item = Neuron>,
    {
        let mut next = self.clone();
        let mut available: BTreeMap<NeuronId, Neuron> = BTreeMap::new();

        for neuron in neurons {
            let merged = match available.get_mut(&neuron.nclass) {
                Some(class) if class.is_class() => {
                    for dataset in &neuron.dataset_ids {
                        if !class.dataset_ids.contains(dataset) {
                            class.dataset_ids.push(dataset.clone());
                        }
                    }
                    true
                }
                _ => false,
            };
            if !merged {
                let mut class = neuron.clone();
                class.name = neuron.nclass.clone();
                available.insert(class.name.clone(), class);
            }
            available.insert(neuron.name.clone(), neuron);
        }

        for id in available.keys() {
            let viewers = next.visibilities.entry(id.clone()).or_default();
            viewers.entry(ViewerType::Graph).or_insert_with(|| ViewerData {
                visibility: if self.active_neurons.contains(id) {
                    Visibility::Visible
                } else {
                    Visibility::Unset
                },
                default_position: None,
            });
        }

        debug!(
            workspace = %self.id,
            neurons = available.len(),
            "loaded available neurons"
        );
        next.available_neurons = available;
        next
    }

    pub fn neuron(&self, id: &str) -> Option<&Neuron> {
        self.available_neurons.get(id)
    }

    pub fn is_class(&self, id: &str) -> bool {
        self.neuron(id).map(Neuron::is_class).unwrap_or(false)
    }

    pub fn is_cell(&self, id: &str) -> bool {
        self.neuron(id).map(|n| !n.is_class()).unwrap_or(false)
    }

    pub fn class_of(&self, id: &str) -> Option<&NeuronId> {
        self.neuron(id).map(|n| &n.nclass)
    }

    /// Individual cells of a class, sorted by name.
    pub fn cells_of_class(&self, class: &str) -> Vec<NeuronId> {
        self.available_neurons
            .values()
            .filter(|n| n.nclass == class && n.name != class)
            .map(|n| n.name.clone())
            .collect()
    }

    /// Class id to individual cells, for every class with at least one cell.
    pub fn class_index(&self) -> BTreeMap<NeuronId, Vec<NeuronId>> {
        let mut index: BTreeMap<NeuronId, Vec<NeuronId>> = BTreeMap::new();
        for neuron in self.available_neurons.values() {
            if !neuron.is_class() {
                index
                    .entry(neuron.nclass.clone())
                    .or_default()
                    .push(neuron.name.clone());
            }
        }
        index
    }

    pub fn viewer_data(&self, id: &str, viewer: ViewerType) -> Option<&ViewerData> {
        self.visibilities.get(id).and_then(|v| v.get(&viewer))
    }

    pub fn graph_position(&self, id: &str) -> Option<Position> {
        self.viewer_data(id, ViewerType::Graph)
            .and_then(|d| d.default_position)
    }

    pub fn graph_visibility(&self, id: &str) -> Visibility {
        self.viewer_data(id, ViewerType::Graph)
            .map(|d| d.visibility)
            .unwrap_or_default()
    }

    /// Active neurons hidden in the graph viewer.
    pub fn hidden_neurons(&self) -> BTreeSet<NeuronId> {
        self.active_neurons
            .iter()
            .filter(|id| self.graph_visibility(id) == Visibility::Hidden)
            .cloned()
            .collect()
    }

    pub fn group_of(&self, id: &str) -> Option<&GroupId> {
        self.neuron_groups
            .values()
            .find(|g| g.neurons.contains(id))
            .map(|g| &g.id)
    }

    pub fn activate(&self, id: &str) -> WorkspaceUpdate {
        WorkspaceUpdate {
            active_neurons: Some(sets::with(&self.active_neurons, id.to_string())),
            ..Default::default()
        }
    }

    pub fn deactivate(&self, id: &str) -> WorkspaceUpdate {
        let id = id.to_string();
        WorkspaceUpdate {
            active_neurons: Some(sets::without(&self.active_neurons, &id)),
            selected_neurons: Some(sets::without(&self.selected_neurons, &id)),
            ..Default::default()
        }
    }

    pub fn hide(&self, id: &str) -> WorkspaceUpdate {
        let mut update = WorkspaceUpdate::default();
        if self.neuron(id).is_none() {
            return update;
        }
        update.selected_neurons = Some(sets::without(&self.selected_neurons, &id.to_string()));
        update.graph_viewer_mut(id).visibility = Some(Visibility::Hidden);
        update
    }

    pub fn show(&self, id: &str) -> WorkspaceUpdate {
        let mut update = WorkspaceUpdate::default();
        if self.neuron(id).is_some() {
            update.graph_viewer_mut(id).visibility = Some(Visibility::Visible);
        }
        update
    }

    pub fn toggle_selected(&self, id: &str) -> WorkspaceUpdate {
        let id = id.to_string();
        let selected = if self.selected_neurons.contains(&id) {
            sets::without(&self.selected_neurons, &id)
        } else {
            sets::with(&self.selected_neurons, id)
        };
        WorkspaceUpdate {
            selected_neurons: Some(selected),
            ..Default::default()
        }
    }

    pub fn clear_selection(&self) -> WorkspaceUpdate {
        WorkspaceUpdate {
            selected_neurons: Some(BTreeSet::new()),
            ..Default::default()
        }
    }

    /// Produce the next snapshot with `update` applied. `self` is unchanged.
    pub fn apply(&self, update: &WorkspaceUpdate) -> Workspace {
        let mut next = self.clone();

        if let Some(active) = &update.active_neurons {
            next.active_neurons = active.clone();
        }
        if let Some(selected) = &update.selected_neurons {
            next.selected_neurons = selected.clone();
        }

        for (group_id, change) in &update.groups {
            match change {
                GroupChange::Create(group) => {
                    next.neuron_groups.insert(group_id.clone(), group.clone());
                }
                GroupChange::Replace(members) if members.is_empty() => {
                    next.neuron_groups.remove(group_id);
                }
                GroupChange::Replace(members) => {
                    if let Some(group) = next.neuron_groups.get_mut(group_id) {
                        group.neurons = members.clone();
                    }
                }
                GroupChange::Delete => {
                    next.neuron_groups.remove(group_id);
                }
            }
        }

        for (id, change) in &update.graph_viewer {
            let data = next
                .visibilities
                .entry(id.clone())
                .or_default()
                .entry(ViewerType::Graph)
                .or_default();
            if let Some(visibility) = change.visibility {
                data.visibility = visibility;
            }
            if let Some(position) = change.default_position {
                data.default_position = Some(position);
            }
        }

        debug!(
            workspace = %self.id,
            groups_changed = update.groups.len(),
            viewer_changes = update.graph_viewer.len(),
            "applied workspace update"
        );
        next
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupChange {
    Create(NeuronGroup),
    /// New member set; an empty set deletes the group.
    Replace(BTreeSet<NeuronId>),
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerDataUpdate {
    pub visibility: Option<Visibility>,
    pub default_position: Option<Position>,
}

/// Description of a workspace transaction, applied atomically by the owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceUpdate {
    pub active_neurons: Option<BTreeSet<NeuronId>>,
    pub selected_neurons: Option<BTreeSet<NeuronId>>,
    pub groups: BTreeMap<GroupId, GroupChange>,
    pub graph_viewer: BTreeMap<NeuronId, ViewerDataUpdate>,
}

impl WorkspaceUpdate {
    pub fn is_empty(&self) -> bool {
        self.active_neurons.is_none()
            && self.selected_neurons.is_none()
            && self.groups.is_empty()
            && self.graph_viewer.is_empty()
    }

    pub fn graph_viewer_mut(&mut self, id: &str) -> &mut ViewerDataUpdate {
        self.graph_viewer.entry(id.to_string()).or_default()
    }

    pub fn set_group_members(&mut self, id: &str, members: BTreeSet<NeuronId>) {
        let change = if members.is_empty() {
            GroupChange::Delete
        } else {
            GroupChange::Replace(members)
        };
        self.groups.insert(id.to_string(), change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Workspace {
        Workspace::new("ws", "test")
            .load_neurons(vec![
                Neuron::new("AVAL", "AVA"),
                Neuron::new("AVAR", "AVA"),
                Neuron::new("RIS", "RIS"),
            ])
            .with_active(["AVA", "RIS"])
    }

    #[test]
    fn load_synthesizes_class_representatives() {
        let ws = sample();
        assert!(ws.is_class("AVA"));
        assert!(ws.is_cell("AVAL"));
        assert!(ws.is_class("RIS"));
        assert_eq!(ws.cells_of_class("AVA"), vec!["AVAL", "AVAR"]);
        assert!(ws.cells_of_class("RIS").is_empty());
        assert_eq!(ws.class_index().len(), 1);
    }

    #[test]
    fn apply_is_copy_on_write() {
        let ws = sample();
        let update = ws.hide("RIS");
        let next = ws.apply(&update);

        assert_eq!(ws.graph_visibility("RIS"), Visibility::Unset);
        assert_eq!(next.graph_visibility("RIS"), Visibility::Hidden);
        assert!(next.hidden_neurons().contains("RIS"));
    }

    #[test]
    fn empty_replacement_deletes_group() {
        let ws = sample().with_group(NeuronGroup::new(
            "group_1",
            ["AVAL".to_string()].into_iter().collect(),
        ));
        let mut update = WorkspaceUpdate::default();
        update.set_group_members("group_1", BTreeSet::new());
        let next = ws.apply(&update);
        assert!(next.neuron_groups.is_empty());
        assert_eq!(ws.group_of("AVAL").map(String::as_str), Some("group_1"));
    }

    #[test]
    fn deactivate_also_deselects() {
        let ws = sample().with_selected(["AVA"]);
        let next = ws.apply(&ws.deactivate("AVA"));
        assert!(!next.active_neurons.contains("AVA"));
        assert!(next.selected_neurons.is_empty());
    }

    #[test]
    fn toggle_selected_flips_membership() {
        let ws = sample();
        let once = ws.apply(&ws.toggle_selected("RIS"));
        assert!(once.selected_neurons.contains("RIS"));
        let twice = once.apply(&once.toggle_selected("RIS"));
        assert!(twice.selected_neurons.is_empty());
    }
}
