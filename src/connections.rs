use crate::{
    error::{Result, TrackerError},
    position::{Position, TimePoint},
};
use std::collections::{BTreeSet, HashMap};

/// Undirected same-time-point relations, for example touching cells.
#[derive(Clone, Debug, Default)]
pub struct Connections {
    by_time_point: HashMap<TimePoint, HashMap<Position, BTreeSet<Position>>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&mut self, a: Position, b: Position) -> Result<()> {
        let time_point = Self::shared_time_point(&a, &b)?;
        let at_time_point = self.by_time_point.entry(time_point).or_default();
        at_time_point.entry(a).or_default().insert(b);
        at_time_point.entry(b).or_default().insert(a);
        Ok(())
    }

    fn shared_time_point(a: &Position, b: &Position) -> Result<TimePoint> {
        let (Some(tp_a), Some(tp_b)) = (a.time_point(), b.time_point()) else {
            return Err(TrackerError::InvalidConnection(format!(
                "{a} and {b} must both have a time point"
            )));
        };
        if tp_a != tp_b {
            return Err(TrackerError::InvalidConnection(format!(
                "{a} and {b} are in different time points"
            )));
        }
        if a == b {
            return Err(TrackerError::InvalidConnection(format!(
                "{a} cannot be connected to itself"
            )));
        }
        Ok(tp_a)
    }

    pub fn remove_connection(&mut self, a: &Position, b: &Position) -> bool {
        let Some(time_point) = a.time_point() else {
            return false;
        };
        let Some(at_time_point) = self.by_time_point.get_mut(&time_point) else {
            return false;
        };
        let removed = at_time_point
            .get_mut(a)
            .map(|neighbors| neighbors.remove(b))
            .unwrap_or(false);
        if removed {
            if let Some(neighbors) = at_time_point.get_mut(b) {
                neighbors.remove(a);
            }
            at_time_point.retain(|_, neighbors| !neighbors.is_empty());
            if at_time_point.is_empty() {
                self.by_time_point.remove(&time_point);
            }
        }
        removed
    }

    pub fn contains_connection(&self, a: &Position, b: &Position) -> bool {
        self.neighbors(a)
            .map(|neighbors| neighbors.contains(b))
            .unwrap_or(false)
    }

    fn neighbors(&self, position: &Position) -> Option<&BTreeSet<Position>> {
        self.by_time_point
            .get(&position.time_point()?)
            .and_then(|at_time_point| at_time_point.get(position))
    }

    /// Positions connected to the given one, ascending.
    pub fn get_connections(&self, position: &Position) -> Vec<Position> {
        self.neighbors(position)
            .map(|neighbors| neighbors.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every connection of the time point once, as `(smaller, larger)` pairs, ascending.
    pub fn of_time_point(&self, time_point: TimePoint) -> Vec<(Position, Position)> {
        let Some(at_time_point) = self.by_time_point.get(&time_point) else {
            return vec![];
        };
        let mut ret: Vec<(Position, Position)> = at_time_point
            .iter()
            .flat_map(|(a, neighbors)| {
                neighbors
                    .iter()
                    .filter(move |b| a < *b)
                    .map(move |b| (*a, *b))
            })
            .collect();
        ret.sort();
        ret
    }

    pub fn time_points(&self) -> Vec<TimePoint> {
        let mut ret: Vec<TimePoint> = self.by_time_point.keys().copied().collect();
        ret.sort();
        ret
    }

    pub fn iter_all(&self) -> Vec<(Position, Position)> {
        self.time_points()
            .into_iter()
            .flat_map(|tp| self.of_time_point(tp))
            .collect()
    }

    pub fn remove_position(&mut self, position: &Position) {
        for other in self.get_connections(position) {
            self.remove_connection(position, &other);
        }
    }

    /// Moves all connections of `old` over to `new`, which must be in the same time point.
    pub fn replace_position(&mut self, old: &Position, new: Position) -> Result<()> {
        let others = self.get_connections(old);
        if others.is_empty() {
            return Ok(());
        }
        if old.time_point() != new.time_point() {
            return Err(TrackerError::InvalidConnection(format!(
                "cannot move connected {old} to another time point"
            )));
        }
        self.remove_position(old);
        for other in others {
            if other != new {
                self.add_connection(new, other)?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_time_point
            .values()
            .flat_map(|at_time_point| at_time_point.values())
            .map(|neighbors| neighbors.len())
            .sum::<usize>()
            / 2
    }

    pub fn is_empty(&self) -> bool {
        self.by_time_point.is_empty()
    }
}
