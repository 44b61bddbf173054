use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type NeuronId = String;
pub type GroupId = String;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionType {
    Chemical,
    Electrical,
    Other(String),
}

impl Default for ConnectionType {
    fn default() -> Self {
        ConnectionType::Chemical
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionType::Chemical => "chemical",
            ConnectionType::Electrical => "electrical",
            ConnectionType::Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ConnectionType::from(s.to_string()))
    }
}

/// Known types match case-insensitively; any other tag is kept verbatim.
impl From<String> for ConnectionType {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("chemical") {
            ConnectionType::Chemical
        } else if s.eq_ignore_ascii_case("electrical") {
            ConnectionType::Electrical
        } else {
            ConnectionType::Other(s)
        }
    }
}

impl From<ConnectionType> for String {
    fn from(t: ConnectionType) -> Self {
        t.to_string()
    }
}

/// The synchronized display panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ViewerType {
    Graph,
    ThreeD,
    Em,
    InstanceDetails,
}

impl ViewerType {
    pub const ALL: [ViewerType; 4] = [
        ViewerType::Graph,
        ViewerType::ThreeD,
        ViewerType::Em,
        ViewerType::InstanceDetails,
    ];
}

impl fmt::Display for ViewerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewerType::Graph => "Graph",
            ViewerType::ThreeD => "3D",
            ViewerType::Em => "EM",
            ViewerType::InstanceDetails => "Instance Details",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ViewerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "graph" => Ok(ViewerType::Graph),
            "3d" | "three-d" | "threed" => Ok(ViewerType::ThreeD),
            "em" => Ok(ViewerType::Em),
            "instance-details" | "details" => Ok(ViewerType::InstanceDetails),
            other => Err(format!("unknown viewer type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Unset,
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A single named entity of the dataset, either a class representative
/// (`name == nclass`) or an individual cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neuron {
    pub name: NeuronId,
    pub nclass: NeuronId,
    #[serde(default)]
    pub neurotransmitter: String,
    #[serde(rename = "type", default)]
    pub cell_type: String,
    #[serde(default = "default_embryonic")]
    pub embryonic: bool,
    #[serde(default)]
    pub inhead: bool,
    #[serde(default)]
    pub intail: bool,
    #[serde(default)]
    pub dataset_ids: Vec<String>,
}

fn default_embryonic() -> bool {
    true
}

impl Neuron {
    pub fn new(name: impl Into<NeuronId>, nclass: impl Into<NeuronId>) -> Self {
        Self {
            name: name.into(),
            nclass: nclass.into(),
            neurotransmitter: String::new(),
            cell_type: String::new(),
            embryonic: true,
            inhead: false,
            intail: false,
            dataset_ids: Vec::new(),
        }
    }

    pub fn with_cell_type(mut self, cell_type: impl Into<String>) -> Self {
        self.cell_type = cell_type.into();
        self
    }

    pub fn with_neurotransmitter(mut self, neurotransmitter: impl Into<String>) -> Self {
        self.neurotransmitter = neurotransmitter.into();
        self
    }

    pub fn post_embryonic(mut self) -> Self {
        self.embryonic = false;
        self
    }

    pub fn is_class(&self) -> bool {
        self.name == self.nclass
    }
}

/// A directed, typed relationship between two neurons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub pre: NeuronId,
    pub post: NeuronId,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    /// Synapse counts keyed by subtype (dataset id).
    #[serde(default)]
    pub synapses: BTreeMap<String, u32>,
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl Connection {
    pub fn new(
        pre: impl Into<NeuronId>,
        post: impl Into<NeuronId>,
        connection_type: ConnectionType,
    ) -> Self {
        Self {
            pre: pre.into(),
            post: post.into(),
            connection_type,
            synapses: BTreeMap::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_synapses(mut self, subtype: impl Into<String>, count: u32) -> Self {
        self.synapses.insert(subtype.into(), count);
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn total_synapses(&self) -> u64 {
        self.synapses.values().map(|&c| c as u64).sum()
    }
}
