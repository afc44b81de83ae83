use crate::{
    connections::Connections,
    position::{Position, TimePoint},
    position_collection::PositionCollection,
};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Positions of one time point that are connected to each other, directly or through
/// other positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub positions: BTreeSet<Position>,
}

impl Cluster {
    pub fn smallest_position(&self) -> Option<Position> {
        self.positions.first().copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Connected components of the connections of the time point. Every position of the
/// time point lands in exactly one cluster; unconnected positions form a cluster of
/// their own. Connections to positions that are not in the collection are ignored.
/// Clusters are ordered by their smallest position.
pub fn find_clusters(
    positions: &PositionCollection,
    connections: &Connections,
    time_point: TimePoint,
) -> Vec<Cluster> {
    let mut visited: HashSet<Position> = HashSet::new();
    let mut clusters = vec![];

    // Sorted, so that every cluster is discovered from its smallest position
    for start in positions.of_time_point(time_point) {
        if !visited.insert(start) {
            continue;
        }
        let mut cluster = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for neighbor in connections.get_connections(&current) {
                if !positions.contains(&neighbor) || !visited.insert(neighbor) {
                    continue;
                }
                cluster.insert(neighbor);
                queue.push_back(neighbor);
            }
        }
        clusters.push(Cluster { positions: cluster });
    }

    tracing::debug!(
        time_point = time_point.time_point_number(),
        clusters = clusters.len(),
        "Found clusters"
    );
    clusters
}
