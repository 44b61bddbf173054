use connectome_core::{Connection, ConnectionType, NeuronId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Rendered edge identity. Connections sharing `(pre, post, type)` under the
/// same annotation policy collapse onto one id.
pub fn edge_id(
    pre: &str,
    post: &str,
    connection_type: &ConnectionType,
    include_annotations: bool,
) -> String {
    if include_annotations {
        format!("{}-{}-{}-annotated", pre, post, connection_type)
    } else {
        format!("{}-{}-{}", pre, post, connection_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDescriptor {
    pub id: String,
    pub source: NeuronId,
    pub target: NeuronId,
    pub connection_type: ConnectionType,
    pub synapses: BTreeMap<String, u64>,
    pub annotations: Vec<String>,
    pub weight: u64,
}

impl EdgeDescriptor {
    /// Descriptor for `connection` drawn between `source` and `target`, which
    /// may differ from the connection endpoints after re-keying.
    pub fn from_connection(
        connection: &Connection,
        source: NeuronId,
        target: NeuronId,
        include_annotations: bool,
    ) -> Self {
        let synapses: BTreeMap<String, u64> = connection
            .synapses
            .iter()
            .map(|(subtype, &count)| (subtype.clone(), count as u64))
            .collect();
        let annotations = if include_annotations {
            let unique: BTreeSet<String> = connection.annotations.iter().cloned().collect();
            unique.into_iter().collect()
        } else {
            Vec::new()
        };

        Self {
            id: edge_id(&source, &target, &connection.connection_type, include_annotations),
            weight: synapses.values().sum(),
            source,
            target,
            connection_type: connection.connection_type.clone(),
            synapses,
            annotations,
        }
    }

    /// Fold another edge with the same id into this one: magnitudes add per
    /// subtype, annotations are unioned.
    pub fn merge(&mut self, other: EdgeDescriptor) {
        for (subtype, count) in other.synapses {
            *self.synapses.entry(subtype).or_insert(0) += count;
        }
        if !other.annotations.is_empty() {
            let mut unique: BTreeSet<String> = self.annotations.drain(..).collect();
            unique.extend(other.annotations);
            self.annotations = unique.into_iter().collect();
        }
        self.weight = self.synapses.values().sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_id_encodes_annotation_policy() {
        let chemical = ConnectionType::Chemical;
        assert_eq!(edge_id("AVAL", "AVBR", &chemical, false), "AVAL-AVBR-chemical");
        assert_eq!(
            edge_id("AVAL", "AVBR", &chemical, true),
            "AVAL-AVBR-chemical-annotated"
        );
        assert_ne!(
            edge_id("AVAL", "AVBR", &ConnectionType::Electrical, false),
            edge_id("AVAL", "AVBR", &chemical, false)
        );
    }

    #[test]
    fn merge_sums_per_subtype() {
        let a = Connection::new("A", "B", ConnectionType::Chemical)
            .with_synapses("ach", 3)
            .with_synapses("gaba", 1)
            .with_annotation("increase");
        let b = Connection::new("A", "B", ConnectionType::Chemical)
            .with_synapses("ach", 2)
            .with_annotation("stable")
            .with_annotation("increase");

        let mut edge = EdgeDescriptor::from_connection(&a, "A".into(), "B".into(), true);
        edge.merge(EdgeDescriptor::from_connection(&b, "A".into(), "B".into(), true));

        assert_eq!(edge.synapses["ach"], 5);
        assert_eq!(edge.synapses["gaba"], 1);
        assert_eq!(edge.weight, 6);
        assert_eq!(edge.annotations, vec!["increase", "stable"]);
    }

    #[test]
    fn annotations_are_stripped_when_excluded() {
        let conn = Connection::new("A", "B", ConnectionType::Electrical).with_annotation("increase");
        let edge = EdgeDescriptor::from_connection(&conn, "A".into(), "B".into(), false);
        assert!(edge.annotations.is_empty());
        assert_eq!(edge.id, "A-B-electrical");
    }
}
