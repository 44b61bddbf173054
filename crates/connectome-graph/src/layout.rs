use connectome_core::{NeuronId, Position, Workspace};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Fan-out positions for the cells of a split class. Ids are laid out in
/// sorted order on a circle of `radius` around `base`, starting straight up.
/// A single id sits on `base`.
pub fn split_positions(ids: &[NeuronId], base: Position, radius: f64) -> BTreeMap<NeuronId, Position> {
    let mut sorted: Vec<&NeuronId> = ids.iter().collect();
    sorted.sort();
    sorted.dedup();

    if sorted.len() == 1 {
        return sorted.into_iter().map(|id| (id.clone(), base)).collect();
    }

    let step = 2.0 * PI / sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let angle = -PI / 2.0 + step * i as f64;
            let position = Position::new(base.x + radius * angle.cos(), base.y + radius * angle.sin());
            (id.clone(), position)
        })
        .collect()
}

/// Mean graph position of the ids that have one.
pub fn mean_position(ids: &[NeuronId], workspace: &Workspace) -> Option<Position> {
    let positions: Vec<Position> = ids
        .iter()
        .filter_map(|id| workspace.graph_position(id))
        .collect();
    if positions.is_empty() {
        return None;
    }

    let count = positions.len() as f64;
    let (sum_x, sum_y) = positions
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Some(Position::new(sum_x / count, sum_y / count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ids(names: &[&str]) -> Vec<NeuronId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_cell_stays_on_base() {
        let base = Position::new(12.0, -4.0);
        let positions = split_positions(&ids(&["AVAL"]), base, 60.0);
        assert_eq!(positions["AVAL"], base);
    }

    #[test]
    fn pair_is_split_vertically() {
        let positions = split_positions(&ids(&["AVAR", "AVAL"]), Position::new(100.0, 100.0), 50.0);
        // AVAL sorts first and takes the top slot
        assert_relative_eq!(positions["AVAL"].x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(positions["AVAL"].y, 50.0, epsilon = 1e-9);
        assert_relative_eq!(positions["AVAR"].x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(positions["AVAR"].y, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn layout_is_order_independent() {
        let a = split_positions(&ids(&["C", "A", "B", "D"]), Position::ORIGIN, 10.0);
        let b = split_positions(&ids(&["D", "B", "C", "A"]), Position::ORIGIN, 10.0);
        assert_eq!(a, b);
        for p in a.values() {
            assert_relative_eq!((p.x * p.x + p.y * p.y).sqrt(), 10.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn mean_skips_missing_positions() {
        let workspace = Workspace::new("ws", "test")
            .with_graph_position("AVAL", Position::new(0.0, 10.0))
            .with_graph_position("AVAR", Position::new(20.0, 30.0));

        let mean = mean_position(&ids(&["AVAL", "AVAR", "AVAX"]), &workspace).unwrap();
        assert_relative_eq!(mean.x, 10.0);
        assert_relative_eq!(mean.y, 20.0);
        assert!(mean_position(&ids(&["RIML"]), &workspace).is_none());
    }
}
