//! Selection context fan-out between viewers.
//!
//! Every viewer keeps an ordered context of highlighted neuron ids. A
//! [`SynchronizerPair`] links two viewers; while the pair is active, an
//! update started by one of them is applied to both. Pairs are evaluated
//! independently and in a fixed order, and never transitively: a selection in
//! the graph reaches the 3D viewer but not, through it, the EM viewer.

use connectome_core::{NeuronId, SyncConfig, ViewerType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub type Context = Vec<NeuronId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SynchronizerPair {
    #[serde(rename = "graph-instance-details")]
    GraphInstanceDetails,
    #[serde(rename = "graph-3d", alias = "graph-three-d")]
    GraphThreeD,
    #[serde(rename = "3d-em", alias = "three-d-em")]
    ThreeDEm,
}

impl SynchronizerPair {
    /// Evaluation order.
    pub const ALL: [SynchronizerPair; 3] = [
        SynchronizerPair::GraphInstanceDetails,
        SynchronizerPair::GraphThreeD,
        SynchronizerPair::ThreeDEm,
    ];

    pub fn viewers(self) -> [ViewerType; 2] {
        match self {
            SynchronizerPair::GraphInstanceDetails => [ViewerType::Graph, ViewerType::InstanceDetails],
            SynchronizerPair::GraphThreeD => [ViewerType::Graph, ViewerType::ThreeD],
            SynchronizerPair::ThreeDEm => [ViewerType::ThreeD, ViewerType::Em],
        }
    }

    pub fn includes(self, viewer: ViewerType) -> bool {
        self.viewers().contains(&viewer)
    }
}

impl fmt::Display for SynchronizerPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SynchronizerPair::GraphInstanceDetails => "graph-instance-details",
            SynchronizerPair::GraphThreeD => "graph-3d",
            SynchronizerPair::ThreeDEm => "3d-em",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SynchronizerPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "graph-instance-details" | "graph-details" => Ok(SynchronizerPair::GraphInstanceDetails),
            "graph-3d" | "graph-three-d" => Ok(SynchronizerPair::GraphThreeD),
            "3d-em" | "three-d-em" => Ok(SynchronizerPair::ThreeDEm),
            other => Err(format!("unknown synchronizer pair: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy)]
enum ContextChange<'a> {
    Replace(&'a [NeuronId]),
    Add(&'a str),
    Remove(&'a str),
    Clear,
}

impl ContextChange<'_> {
    fn apply(&self, context: &mut Context) {
        match self {
            ContextChange::Replace(ids) => {
                context.clear();
                for id in ids.iter() {
                    if !context.contains(id) {
                        context.push(id.clone());
                    }
                }
            }
            ContextChange::Add(id) => {
                if !context.iter().any(|c| c == id) {
                    context.push(id.to_string());
                }
            }
            ContextChange::Remove(id) => context.retain(|c| c != id),
            ContextChange::Clear => context.clear(),
        }
    }
}

/// One pair and its activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synchronizer {
    pair: SynchronizerPair,
    state: PairState,
}

impl Synchronizer {
    pub fn new(pair: SynchronizerPair, active: bool) -> Self {
        Self {
            pair,
            state: if active {
                PairState::Active
            } else {
                PairState::Inactive
            },
        }
    }

    pub fn pair(&self) -> SynchronizerPair {
        self.pair
    }

    pub fn state(&self) -> PairState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == PairState::Active
    }

    fn set_active(&mut self, active: bool) {
        self.state = if active {
            PairState::Active
        } else {
            PairState::Inactive
        };
    }

    fn sync(
        &self,
        change: ContextChange<'_>,
        initiator: ViewerType,
        contexts: &mut BTreeMap<ViewerType, Context>,
    ) {
        if !self.pair.includes(initiator) {
            return;
        }
        if !self.is_active() {
            change.apply(contexts.entry(initiator).or_default());
            return;
        }
        for viewer in self.pair.viewers() {
            change.apply(contexts.entry(viewer).or_default());
        }
        debug!(pair = %self.pair, initiator = %initiator, "propagated selection");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOrchestrator {
    synchronizers: Vec<Synchronizer>,
    contexts: BTreeMap<ViewerType, Context>,
}

impl Default for SyncOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncOrchestrator {
    /// Every pair active, every context empty.
    pub fn new() -> Self {
        Self::with_activity(&BTreeMap::new())
    }

    /// Pairs missing from `activity` start active.
    pub fn with_activity(activity: &BTreeMap<SynchronizerPair, bool>) -> Self {
        let synchronizers = SynchronizerPair::ALL
            .iter()
            .map(|pair| Synchronizer::new(*pair, activity.get(pair).copied().unwrap_or(true)))
            .collect();
        let contexts = ViewerType::ALL
            .iter()
            .map(|viewer| (*viewer, Context::new()))
            .collect();
        Self {
            synchronizers,
            contexts,
        }
    }

    pub fn with_contexts(mut self, contexts: BTreeMap<ViewerType, Context>) -> Self {
        for (viewer, context) in contexts {
            self.contexts.insert(viewer, context);
        }
        self
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        let activity = BTreeMap::from([
            (SynchronizerPair::GraphInstanceDetails, config.graph_instance_details),
            (SynchronizerPair::GraphThreeD, config.graph_three_d),
            (SynchronizerPair::ThreeDEm, config.three_d_em),
        ]);
        Self::with_activity(&activity)
    }

    fn propagate(&mut self, change: ContextChange<'_>, initiator: ViewerType) {
        for synchronizer in &self.synchronizers {
            synchronizer.sync(change, initiator, &mut self.contexts);
        }
    }

    /// Replace the initiator's context, and that of every actively linked
    /// viewer, with `selection`.
    pub fn select(&mut self, selection: &[NeuronId], initiator: ViewerType) {
        self.propagate(ContextChange::Replace(selection), initiator);
    }

    pub fn select_one(&mut self, id: &str, initiator: ViewerType) {
        self.propagate(ContextChange::Add(id), initiator);
    }

    pub fn unselect_one(&mut self, id: &str, initiator: ViewerType) {
        self.propagate(ContextChange::Remove(id), initiator);
    }

    pub fn clear(&mut self, initiator: ViewerType) {
        self.propagate(ContextChange::Clear, initiator);
    }

    pub fn set_active(&mut self, pair: SynchronizerPair, active: bool) {
        if let Some(synchronizer) = self.synchronizers.iter_mut().find(|s| s.pair == pair) {
            synchronizer.set_active(active);
            debug!(pair = %pair, active, "synchronizer toggled");
        }
    }

    pub fn toggle(&mut self, pair: SynchronizerPair) {
        let active = self.is_active(pair);
        self.set_active(pair, !active);
    }

    pub fn is_active(&self, pair: SynchronizerPair) -> bool {
        self.synchronizers
            .iter()
            .find(|s| s.pair == pair)
            .map(Synchronizer::is_active)
            .unwrap_or(false)
    }

    pub fn synchronizers(&self) -> &[Synchronizer] {
        &self.synchronizers
    }

    pub fn contexts(&self) -> &BTreeMap<ViewerType, Context> {
        &self.contexts
    }

    pub fn context(&self, viewer: ViewerType) -> &[NeuronId] {
        self.contexts.get(&viewer).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<NeuronId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn select_fans_out_to_linked_viewers_only() {
        let mut sync = SyncOrchestrator::new();
        sync.select(&ids(&["AVAL", "AVAR"]), ViewerType::Graph);

        assert_eq!(sync.context(ViewerType::Graph), ids(&["AVAL", "AVAR"]).as_slice());
        assert_eq!(sync.context(ViewerType::ThreeD), ids(&["AVAL", "AVAR"]).as_slice());
        assert_eq!(
            sync.context(ViewerType::InstanceDetails),
            ids(&["AVAL", "AVAR"]).as_slice()
        );
        // no transitive propagation through the 3D viewer
        assert!(sync.context(ViewerType::Em).is_empty());
    }

    #[test]
    fn inactive_pair_updates_initiator_only() {
        let mut sync = SyncOrchestrator::new();
        sync.set_active(SynchronizerPair::ThreeDEm, false);
        sync.select_one("RIML", ViewerType::Em);

        assert_eq!(sync.context(ViewerType::Em), ids(&["RIML"]).as_slice());
        assert!(sync.context(ViewerType::ThreeD).is_empty());
    }

    #[test]
    fn select_one_keeps_insertion_order_without_duplicates() {
        let mut sync = SyncOrchestrator::new();
        sync.select_one("B", ViewerType::ThreeD);
        sync.select_one("A", ViewerType::ThreeD);
        sync.select_one("B", ViewerType::ThreeD);

        assert_eq!(sync.context(ViewerType::ThreeD), ids(&["B", "A"]).as_slice());
        assert_eq!(sync.context(ViewerType::Em), ids(&["B", "A"]).as_slice());
        assert_eq!(sync.context(ViewerType::Graph), ids(&["B", "A"]).as_slice());

        sync.unselect_one("B", ViewerType::ThreeD);
        assert_eq!(sync.context(ViewerType::Graph), ids(&["A"]).as_slice());
    }

    #[test]
    fn partner_applies_the_update_to_its_own_context() {
        let contexts = BTreeMap::from([
            (ViewerType::Graph, ids(&["A"])),
            (ViewerType::ThreeD, ids(&["X", "Y"])),
        ]);
        let mut sync = SyncOrchestrator::new().with_contexts(contexts);
        sync.select_one("B", ViewerType::Graph);

        assert_eq!(sync.context(ViewerType::Graph), ids(&["A", "B"]).as_slice());
        assert_eq!(sync.context(ViewerType::ThreeD), ids(&["X", "Y", "B"]).as_slice());
    }

    #[test]
    fn clear_and_toggle() {
        let mut sync = SyncOrchestrator::new();
        sync.select(&ids(&["A"]), ViewerType::Graph);
        sync.toggle(SynchronizerPair::GraphThreeD);
        assert!(!sync.is_active(SynchronizerPair::GraphThreeD));

        sync.clear(ViewerType::Graph);
        assert!(sync.context(ViewerType::Graph).is_empty());
        assert!(sync.context(ViewerType::InstanceDetails).is_empty());
        assert_eq!(sync.context(ViewerType::ThreeD), ids(&["A"]).as_slice());

        sync.toggle(SynchronizerPair::GraphThreeD);
        assert!(sync.is_active(SynchronizerPair::GraphThreeD));
    }

    #[test]
    fn config_controls_initial_activity() {
        let config = SyncConfig {
            graph_three_d: false,
            ..Default::default()
        };
        let sync = SyncOrchestrator::from_config(&config);
        assert!(sync.is_active(SynchronizerPair::GraphInstanceDetails));
        assert!(!sync.is_active(SynchronizerPair::GraphThreeD));
        assert!(sync.is_active(SynchronizerPair::ThreeDEm));

        let pairs: Vec<SynchronizerPair> = sync.synchronizers().iter().map(|s| s.pair()).collect();
        assert_eq!(pairs, SynchronizerPair::ALL.to_vec());
    }

    #[test]
    fn pair_names_round_trip() {
        for pair in SynchronizerPair::ALL {
            assert_eq!(pair.to_string().parse::<SynchronizerPair>(), Ok(pair));
        }
        for pair in SynchronizerPair::ALL {
            let raw = serde_json::to_string(&pair).unwrap();
            assert_eq!(raw, format!("\"{}\"", pair));
            assert_eq!(serde_json::from_str::<SynchronizerPair>(&raw).unwrap(), pair);
        }
        assert_eq!(
            serde_json::from_str::<SynchronizerPair>("\"three-d-em\"").unwrap(),
            SynchronizerPair::ThreeDEm
        );
    }
}
