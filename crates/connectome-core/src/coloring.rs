//! Node coloring. Each option maps to a stateless lookup over the neuron's
//! categorical attributes.

use crate::Neuron;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const FALLBACK_COLOR: &str = "#FFFFFF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColoringOption {
    #[default]
    CellType,
    Neurotransmitter,
}

impl fmt::Display for ColoringOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColoringOption::CellType => write!(f, "cell-type"),
            ColoringOption::Neurotransmitter => write!(f, "neurotransmitter"),
        }
    }
}

impl FromStr for ColoringOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "cell-type" => Ok(ColoringOption::CellType),
            "neurotransmitter" => Ok(ColoringOption::Neurotransmitter),
            other => Err(format!("unknown coloring option: {}", other)),
        }
    }
}

const CELL_TYPE_COLORS: &[(&str, &str)] = &[
    ("neurosecretory", "#F9D77B"),
    ("sensory", "#F9CEF9"),
    ("inter", "#FF887A"),
    ("motor", "#B7DAF5"),
    ("muscle", "#A8F5A2"),
    ("others", "#D9D9D9"),
];

const NEUROTRANSMITTER_COLORS: &[(&str, &str)] = &[
    ("acetylcholine", "#FF887A"),
    ("dopamine", "#A8F5A2"),
    ("gaba", "#99CCFF"),
    ("glutamate", "#FFF860"),
    ("octopamine", "#CFACFF"),
    ("serotonin", "#90FFCF"),
    ("tyramine", "#F9D77B"),
    ("unknown", "#D9D9D9"),
    ("none", "#FFFFFF"),
];

fn cell_type_name(code: char) -> Option<&'static str> {
    match code {
        'b' => Some("muscle"),
        'u' => Some("others"),
        's' => Some("sensory"),
        'i' => Some("inter"),
        'm' => Some("motor"),
        'n' => Some("neurosecretory"),
        _ => None,
    }
}

fn neurotransmitter_name(code: char) -> Option<&'static str> {
    match code {
        'a' => Some("acetylcholine"),
        'd' => Some("dopamine"),
        'g' => Some("gaba"),
        'l' => Some("glutamate"),
        'o' => Some("octopamine"),
        's' => Some("serotonin"),
        't' => Some("tyramine"),
        'u' => Some("unknown"),
        'n' => Some("none"),
        _ => None,
    }
}

fn lookup(table: &[(&str, &'static str)], name: Option<&str>) -> &'static str {
    name.and_then(|name| table.iter().find(|(k, _)| *k == name).map(|(_, c)| *c))
        .unwrap_or(FALLBACK_COLOR)
}

/// Colors for a neuron. Cell type yields one color; neurotransmitter yields
/// one color per transmitter code, in order.
pub fn colors_for(option: ColoringOption, neuron: &Neuron) -> Vec<&'static str> {
    match option {
        ColoringOption::CellType => {
            let name = neuron.cell_type.chars().next().and_then(cell_type_name);
            vec![lookup(CELL_TYPE_COLORS, name)]
        }
        ColoringOption::Neurotransmitter => neuron
            .neurotransmitter
            .chars()
            .map(|code| lookup(NEUROTRANSMITTER_COLORS, neurotransmitter_name(code)))
            .collect(),
    }
}

/// Legend for an option: category name to color.
pub fn color_map(option: ColoringOption) -> &'static [(&'static str, &'static str)] {
    match option {
        ColoringOption::CellType => CELL_TYPE_COLORS,
        ColoringOption::Neurotransmitter => NEUROTRANSMITTER_COLORS,
    }
}
