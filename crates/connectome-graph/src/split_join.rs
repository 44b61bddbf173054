//! Split and join overrides.
//!
//! Splitting shows a class as its individual cells; joining collapses cells
//! back into their class. The two sets are only mutated through
//! [`split_selected`] and [`join_selected`], which keep a class and its cells
//! from appearing in both at once.

use crate::layout::{mean_position, split_positions};
use connectome_core::{GroupId, NeuronId, Position, Visibility, Workspace, WorkspaceUpdate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitJoinState {
    split: BTreeSet<NeuronId>,
    join: BTreeSet<NeuronId>,
}

impl SplitJoinState {
    pub const fn new() -> Self {
        Self {
            split: BTreeSet::new(),
            join: BTreeSet::new(),
        }
    }

    /// Classes shown as individual cells.
    pub fn split(&self) -> &BTreeSet<NeuronId> {
        &self.split
    }

    /// Cells collapsed into their class.
    pub fn join(&self) -> &BTreeSet<NeuronId> {
        &self.join
    }

    pub fn is_empty(&self) -> bool {
        self.split.is_empty() && self.join.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitJoinOutcome {
    pub state: SplitJoinState,
    pub update: WorkspaceUpdate,
}

/// Working copy of group memberships; only touched groups end up in the
/// update.
struct GroupEdits {
    members: BTreeMap<GroupId, BTreeSet<NeuronId>>,
    touched: BTreeSet<GroupId>,
}

impl GroupEdits {
    fn new(workspace: &Workspace) -> Self {
        Self {
            members: workspace
                .neuron_groups
                .iter()
                .map(|(id, group)| (id.clone(), group.neurons.clone()))
                .collect(),
            touched: BTreeSet::new(),
        }
    }

    fn groups_containing(&self, id: &str) -> Vec<GroupId> {
        self.members
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(group_id, _)| group_id.clone())
            .collect()
    }

    fn insert(&mut self, group_id: &str, id: &str) {
        if let Some(members) = self.members.get_mut(group_id) {
            if members.insert(id.to_string()) {
                self.touched.insert(group_id.to_string());
            }
        }
    }

    fn remove_everywhere(&mut self, ids: &[NeuronId], except: Option<&str>) {
        for (group_id, members) in self.members.iter_mut() {
            if Some(group_id.as_str()) == except {
                continue;
            }
            for id in ids {
                if members.remove(id) {
                    self.touched.insert(group_id.clone());
                }
            }
        }
    }

    fn write_to(self, update: &mut WorkspaceUpdate) {
        for group_id in self.touched {
            let members = self.members.get(&group_id).cloned().unwrap_or_default();
            update.set_group_members(&group_id, members);
        }
    }
}

/// Split every selected, not yet split class that has individual cells.
pub fn split_selected(
    workspace: &Workspace,
    state: &SplitJoinState,
    fanout_radius: f64,
) -> SplitJoinOutcome {
    let mut split = state.split.clone();
    let mut join = state.join.clone();
    let mut selected = workspace.selected_neurons.clone();
    let mut groups = GroupEdits::new(workspace);
    let mut update = WorkspaceUpdate::default();

    for class in &workspace.selected_neurons {
        if !workspace.is_class(class) || split.contains(class) {
            continue;
        }
        let cells = workspace.cells_of_class(class);
        if cells.is_empty() {
            continue;
        }

        split.insert(class.clone());
        selected.remove(class);

        let base = workspace.graph_position(class).unwrap_or(Position::ORIGIN);
        for (cell, position) in split_positions(&cells, base, fanout_radius) {
            selected.insert(cell.clone());
            let data = update.graph_viewer_mut(&cell);
            data.visibility = Some(Visibility::Visible);
            data.default_position = Some(position);
        }
        update.graph_viewer_mut(class).visibility = Some(Visibility::Unset);

        for group_id in groups.groups_containing(class) {
            if let Some(members) = groups.members.get_mut(&group_id) {
                members.remove(class);
                members.extend(cells.iter().cloned());
            }
            groups.touched.insert(group_id.clone());
            groups.remove_everywhere(&cells, Some(group_id.as_str()));
        }

        join.retain(|cell| workspace.class_of(cell) != Some(class));
        debug!(class = %class, cells = cells.len(), "split class");
    }

    if split != state.split {
        update.selected_neurons = Some(selected);
        groups.write_to(&mut update);
    }

    SplitJoinOutcome {
        state: SplitJoinState { split, join },
        update,
    }
}

/// Collapse every selected individual cell, together with its siblings, into
/// its class. Joining a split class cancels the split.
pub fn join_selected(workspace: &Workspace, state: &SplitJoinState) -> SplitJoinOutcome {
    let mut split = state.split.clone();
    let mut join = state.join.clone();
    let mut selected = workspace.selected_neurons.clone();
    let mut groups = GroupEdits::new(workspace);
    let mut update = WorkspaceUpdate::default();
    let mut joined_classes: BTreeSet<NeuronId> = BTreeSet::new();

    for cell in &workspace.selected_neurons {
        if !workspace.is_cell(cell) {
            continue;
        }
        let class = match workspace.class_of(cell) {
            Some(class) => class.clone(),
            None => continue,
        };
        let siblings = workspace.cells_of_class(&class);

        // The triggering cell's groups gain the class even when a sibling
        // already joined it.
        for group_id in groups.groups_containing(cell) {
            groups.insert(&group_id, &class);
            groups.remove_everywhere(&[class.clone()], Some(&group_id));
        }
        if !joined_classes.insert(class.clone()) {
            continue;
        }

        let class_data = update.graph_viewer_mut(&class);
        class_data.visibility = Some(Visibility::Visible);
        if workspace.graph_position(&class).is_none() {
            class_data.default_position = mean_position(&siblings, workspace);
        }

        for sibling in &siblings {
            selected.remove(sibling);
            update.graph_viewer_mut(sibling).visibility = Some(Visibility::Unset);
        }
        selected.insert(class.clone());

        if !split.remove(&class) {
            join.extend(siblings.iter().cloned());
        }
        debug!(class = %class, cells = siblings.len(), "joined cells");
    }

    if !joined_classes.is_empty() {
        let all_siblings: Vec<NeuronId> = joined_classes
            .iter()
            .flat_map(|class| workspace.cells_of_class(class))
            .collect();
        groups.remove_everywhere(&all_siblings, None);

        update.selected_neurons = Some(selected);
        groups.write_to(&mut update);
    }

    SplitJoinOutcome {
        state: SplitJoinState { split, join },
        update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use connectome_core::{GroupChange, Neuron, NeuronGroup};

    fn workspace() -> Workspace {
        Workspace::new("ws", "test")
            .load_neurons(vec![
                Neuron::new("AVAL", "AVA"),
                Neuron::new("AVAR", "AVA"),
                Neuron::new("RIML", "RIM"),
                Neuron::new("RIMR", "RIM"),
                Neuron::new("PVQ", "PVQ"),
            ])
            .with_active(["AVA", "RIM", "PVQ"])
    }

    fn set(ids: &[&str]) -> BTreeSet<NeuronId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_replaces_class_with_cells() {
        let ws = workspace()
            .with_selected(["AVA", "PVQ"])
            .with_graph_position("AVA", Position::new(50.0, 50.0));
        let outcome = split_selected(&ws, &SplitJoinState::new(), 60.0);

        assert_eq!(outcome.state.split(), &set(&["AVA"]));
        assert!(outcome.state.join().is_empty());
        assert_eq!(
            outcome.update.selected_neurons,
            Some(set(&["AVAL", "AVAR", "PVQ"]))
        );

        let next = ws.apply(&outcome.update);
        assert_eq!(next.graph_visibility("AVAL"), Visibility::Visible);
        assert_eq!(next.graph_visibility("AVA"), Visibility::Unset);
        let fanned = next.graph_position("AVAL").unwrap();
        assert_relative_eq!(fanned.x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(fanned.y, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn split_ignores_cells_and_unpaired_classes() {
        let ws = workspace().with_selected(["AVAL", "PVQ"]);
        let outcome = split_selected(&ws, &SplitJoinState::new(), 60.0);
        assert!(outcome.state.is_empty());
        assert!(outcome.update.is_empty());
    }

    #[test]
    fn split_then_join_restores_selection() {
        let ws = workspace().with_selected(["AVA", "RIM"]);
        let split = split_selected(&ws, &SplitJoinState::new(), 60.0);
        let ws_split = ws.apply(&split.update);

        let joined = join_selected(&ws_split, &split.state);
        let ws_joined = ws_split.apply(&joined.update);

        assert_eq!(ws_joined.selected_neurons, ws.selected_neurons);
        assert!(joined.state.is_empty());
    }

    #[test]
    fn join_records_cells_when_class_not_split() {
        let ws = workspace()
            .with_selected(["AVAL"])
            .with_graph_position("AVAL", Position::new(0.0, 0.0))
            .with_graph_position("AVAR", Position::new(10.0, 0.0));
        let outcome = join_selected(&ws, &SplitJoinState::new());

        assert_eq!(outcome.state.join(), &set(&["AVAL", "AVAR"]));
        assert_eq!(outcome.update.selected_neurons, Some(set(&["AVA"])));
        let class = outcome.update.graph_viewer["AVA"];
        assert_eq!(class.default_position, Some(Position::new(5.0, 0.0)));
        assert_eq!(class.visibility, Some(Visibility::Visible));

        // splitting again clears the join entries of that class
        let ws_joined = ws.apply(&outcome.update);
        let split = split_selected(&ws_joined, &outcome.state, 60.0);
        assert!(split.state.join().is_empty());
        assert_eq!(split.state.split(), &set(&["AVA"]));
    }

    #[test]
    fn split_rewrites_groups() {
        let ws = workspace()
            .with_selected(["AVA"])
            .with_group(NeuronGroup::new("group_1", set(&["AVA", "RIM"])))
            .with_group(NeuronGroup::new("group_2", set(&["AVAL"])));
        let outcome = split_selected(&ws, &SplitJoinState::new(), 60.0);

        assert_eq!(
            outcome.update.groups["group_1"],
            GroupChange::Replace(set(&["AVAL", "AVAR", "RIM"]))
        );
        assert_eq!(outcome.update.groups["group_2"], GroupChange::Delete);

        let next = ws.apply(&outcome.update);
        assert!(!next.neuron_groups.contains_key("group_2"));
    }

    #[test]
    fn join_moves_class_into_trigger_group() {
        let ws = workspace()
            .with_selected(["RIML"])
            .with_group(NeuronGroup::new("group_1", set(&["RIML", "AVA"])))
            .with_group(NeuronGroup::new("group_2", set(&["RIMR"])));
        let outcome = join_selected(&ws, &SplitJoinState::new());

        assert_eq!(
            outcome.update.groups["group_1"],
            GroupChange::Replace(set(&["AVA", "RIM"]))
        );
        assert_eq!(outcome.update.groups["group_2"], GroupChange::Delete);
    }

    #[test]
    fn join_takes_class_out_of_its_previous_group() {
        let ws = workspace()
            .with_selected(["AVAL"])
            .with_group(NeuronGroup::new("group_1", set(&["AVAL", "PVQ"])))
            .with_group(NeuronGroup::new("group_2", set(&["AVA", "RIM"])));
        let outcome = join_selected(&ws, &SplitJoinState::new());
        let next = ws.apply(&outcome.update);

        let holding: Vec<&String> = next
            .neuron_groups
            .values()
            .filter(|g| g.neurons.contains("AVA"))
            .map(|g| &g.id)
            .collect();
        assert_eq!(holding, vec!["group_1"]);
        assert_eq!(next.neuron_groups["group_2"].neurons, set(&["RIM"]));
    }
}
