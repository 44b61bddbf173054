use connectome_core::{colors_for, ColoringOption, GroupId, NeuronGroup, Position, Workspace};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Neuron,
    Class,
    Group,
    /// Referenced before its attributes were loaded.
    Placeholder,
}

/// Everything a rendering surface needs to draw a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub parent: Option<GroupId>,
    pub selected: bool,
    pub position: Option<Position>,
    pub cell_type: Option<String>,
    pub neurotransmitter: Option<String>,
    pub colors: Vec<String>,
    pub color: Option<String>,
    pub member_count: Option<usize>,
}

impl NodeDescriptor {
    pub fn for_neuron(
        id: &str,
        workspace: &Workspace,
        coloring: ColoringOption,
        parent: Option<GroupId>,
    ) -> Self {
        let selected = workspace.selected_neurons.contains(id);
        let position = workspace.graph_position(id);

        match workspace.neuron(id) {
            Some(neuron) => Self {
                id: id.to_string(),
                label: id.to_string(),
                kind: if neuron.is_class() {
                    NodeKind::Class
                } else {
                    NodeKind::Neuron
                },
                parent,
                selected,
                position,
                cell_type: Some(neuron.cell_type.clone()),
                neurotransmitter: Some(neuron.neurotransmitter.clone()),
                colors: colors_for(coloring, neuron)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                color: None,
                member_count: None,
            },
            None => Self {
                id: id.to_string(),
                label: id.to_string(),
                kind: NodeKind::Placeholder,
                parent,
                selected,
                position,
                cell_type: None,
                neurotransmitter: None,
                colors: Vec::new(),
                color: None,
                member_count: None,
            },
        }
    }

    pub fn for_group(group: &NeuronGroup, workspace: &Workspace) -> Self {
        Self {
            id: group.id.clone(),
            label: group.name.clone(),
            kind: NodeKind::Group,
            parent: None,
            selected: workspace.selected_neurons.contains(&group.id),
            position: workspace.graph_position(&group.id),
            cell_type: None,
            neurotransmitter: None,
            colors: vec![group.color.clone()],
            color: Some(group.color.clone()),
            member_count: Some(group.neurons.len()),
        }
    }
}
