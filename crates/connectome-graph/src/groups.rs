use connectome_core::{
    ConnectomeError, GroupChange, GroupId, NeuronGroup, NeuronId, Result, Workspace,
    WorkspaceUpdate, DEFAULT_GROUP_COLOR,
};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct GroupOutcome {
    pub group_id: GroupId,
    pub update: WorkspaceUpdate,
}

/// Smallest `group_N` (N >= 1) not used by the workspace.
pub fn next_group_id(workspace: &Workspace) -> GroupId {
    (1..)
        .map(|n| format!("group_{}", n))
        .find(|id| !workspace.neuron_groups.contains_key(id))
        .unwrap_or_else(|| "group_0".to_string())
}

/// Merge `selection` into one new group. Selected group ids, and groups any
/// selected neuron already belongs to, are dissolved into the new group,
/// which inherits the name and color of the last group merged. The new group
/// becomes the selection.
pub fn group_selected(workspace: &Workspace, selection: &BTreeSet<NeuronId>) -> Result<GroupOutcome> {
    if selection.is_empty() {
        return Err(ConnectomeError::InvalidOperation(
            "cannot group an empty selection".to_string(),
        ));
    }

    let group_id = next_group_id(workspace);
    let mut members: BTreeSet<NeuronId> = BTreeSet::new();
    let mut merged: BTreeSet<GroupId> = BTreeSet::new();
    let mut inherited: Option<(String, String)> = None;

    for id in selection {
        if let Some(group) = workspace.neuron_groups.get(id) {
            members.extend(group.neurons.iter().cloned());
            merged.insert(group.id.clone());
            inherited = Some((group.name.clone(), group.color.clone()));
            continue;
        }

        let mut grouped = false;
        for group in workspace.neuron_groups.values() {
            if group.neurons.contains(id) {
                members.extend(group.neurons.iter().cloned());
                merged.insert(group.id.clone());
                inherited = Some((group.name.clone(), group.color.clone()));
                grouped = true;
            }
        }
        if !grouped {
            members.insert(id.clone());
        }
    }

    let (name, color) =
        inherited.unwrap_or_else(|| (group_id.clone(), DEFAULT_GROUP_COLOR.to_string()));
    let group = NeuronGroup {
        id: group_id.clone(),
        name,
        color,
        neurons: members,
    };

    let mut update = WorkspaceUpdate::default();
    for old in &merged {
        update.groups.insert(old.clone(), GroupChange::Delete);
    }
    debug!(group = %group_id, members = group.neurons.len(), merged = merged.len(), "created group");
    update
        .groups
        .insert(group_id.clone(), GroupChange::Create(group));
    update.selected_neurons = Some(BTreeSet::from([group_id.clone()]));

    Ok(GroupOutcome { group_id, update })
}

/// Dissolve a group. When it was selected, its members take its place in the
/// selection.
pub fn ungroup(workspace: &Workspace, group_id: &str) -> Result<WorkspaceUpdate> {
    let group = workspace
        .neuron_groups
        .get(group_id)
        .ok_or_else(|| ConnectomeError::NotFound(format!("group {}", group_id)))?;

    let mut update = WorkspaceUpdate::default();
    update
        .groups
        .insert(group_id.to_string(), GroupChange::Delete);

    if workspace.selected_neurons.contains(group_id) {
        let mut selected = workspace.selected_neurons.clone();
        selected.remove(group_id);
        selected.extend(group.neurons.iter().cloned());
        update.selected_neurons = Some(selected);
    }

    debug!(group = %group_id, members = group.neurons.len(), "ungrouped");
    Ok(update)
}
