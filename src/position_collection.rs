use crate::{
    error::Result,
    position::{Position, TimePoint},
};
use serde_json::Value;
use std::collections::HashMap;

/// Shape fields that follow `[x, y, z]` in a particle row. Empty when unknown.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionShape(pub Vec<Value>);

impl PositionShape {
    pub fn unknown() -> Self {
        Self(vec![])
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[Value] {
        &self.0
    }
}

/// All positions of an experiment, filed by time point.
#[derive(Clone, Debug, Default)]
pub struct PositionCollection {
    positions: HashMap<TimePoint, HashMap<Position, PositionShape>>,
}

impl PositionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions<I: IntoIterator<Item = Position>>(positions: I) -> Result<Self> {
        let mut ret = Self::new();
        for position in positions {
            ret.add(position)?;
        }
        Ok(ret)
    }

    /// Adds a position, keeping its shape if it was already present.
    pub fn add(&mut self, position: Position) -> Result<()> {
        let time_point = position.require_time_point()?;
        self.positions
            .entry(time_point)
            .or_default()
            .entry(position)
            .or_default();
        Ok(())
    }

    pub fn add_with_shape(&mut self, position: Position, shape: PositionShape) -> Result<()> {
        let time_point = position.require_time_point()?;
        self.positions
            .entry(time_point)
            .or_default()
            .insert(position, shape);
        Ok(())
    }

    pub fn remove(&mut self, position: &Position) -> bool {
        let Some(time_point) = position.time_point() else {
            return false;
        };
        let Some(at_time_point) = self.positions.get_mut(&time_point) else {
            return false;
        };
        let removed = at_time_point.remove(position).is_some();
        if at_time_point.is_empty() {
            self.positions.remove(&time_point);
        }
        removed
    }

    /// Moves a position (keeping its shape). Returns false if `old` was not present.
    pub fn move_position(&mut self, old: &Position, new: Position) -> Result<bool> {
        new.require_time_point()?;
        let shape = match self.shape_of(old) {
            Some(shape) => shape.clone(),
            None => return Ok(false),
        };
        self.remove(old);
        self.add_with_shape(new, shape)?;
        Ok(true)
    }

    pub fn contains(&self, position: &Position) -> bool {
        position
            .time_point()
            .and_then(|tp| self.positions.get(&tp))
            .map(|at_time_point| at_time_point.contains_key(position))
            .unwrap_or(false)
    }

    pub fn shape_of(&self, position: &Position) -> Option<&PositionShape> {
        self.positions
            .get(&position.time_point()?)
            .and_then(|at_time_point| at_time_point.get(position))
    }

    /// Positions of one time point, in ascending position order.
    pub fn of_time_point(&self, time_point: TimePoint) -> Vec<Position> {
        let mut ret: Vec<Position> = self
            .positions
            .get(&time_point)
            .map(|at_time_point| at_time_point.keys().copied().collect())
            .unwrap_or_default();
        ret.sort();
        ret
    }

    pub fn of_time_point_with_shapes(&self, time_point: TimePoint) -> Vec<(Position, &PositionShape)> {
        let mut ret: Vec<(Position, &PositionShape)> = self
            .positions
            .get(&time_point)
            .map(|at_time_point| at_time_point.iter().map(|(p, s)| (*p, s)).collect())
            .unwrap_or_default();
        ret.sort_by(|a, b| a.0.cmp(&b.0));
        ret
    }

    pub fn count_at(&self, time_point: TimePoint) -> usize {
        self.positions
            .get(&time_point)
            .map(|at_time_point| at_time_point.len())
            .unwrap_or(0)
    }

    pub fn first_time_point_number(&self) -> Option<i32> {
        self.positions.keys().map(|tp| tp.time_point_number()).min()
    }

    pub fn last_time_point_number(&self) -> Option<i32> {
        self.positions.keys().map(|tp| tp.time_point_number()).max()
    }

    /// Time points that hold at least one position, ascending.
    pub fn time_points(&self) -> Vec<TimePoint> {
        let mut ret: Vec<TimePoint> = self.positions.keys().copied().collect();
        ret.sort();
        ret
    }

    /// All positions, ordered by time point and then by position.
    pub fn iter(&self) -> impl Iterator<Item = Position> + '_ {
        self.time_points()
            .into_iter()
            .flat_map(move |tp| self.of_time_point(tp))
    }

    pub fn len(&self) -> usize {
        self.positions.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_positions(&self) -> bool {
        !self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_time_point_range() {
        let mut positions = PositionCollection::new();
        assert_eq!(positions.first_time_point_number(), None);
        positions.add(Position::new(0.0, 0.0, 0.0, 5)).unwrap();
        positions.add(Position::new(0.0, 0.0, 0.0, 2)).unwrap();
        positions.add(Position::new(1.0, 0.0, 0.0, 9)).unwrap();
        assert_eq!(positions.first_time_point_number(), Some(2));
        assert_eq!(positions.last_time_point_number(), Some(9));
        assert_eq!(positions.len(), 3);

        positions.remove(&Position::new(1.0, 0.0, 0.0, 9));
        assert_eq!(positions.last_time_point_number(), Some(5));
    }

    #[test]
    fn test_rejects_position_without_time_point() {
        let mut positions = PositionCollection::new();
        assert!(positions.add(Position::without_time_point(1.0, 1.0, 1.0)).is_err());
        assert!(positions.is_empty());
    }

    #[test]
    fn test_add_keeps_existing_shape() {
        let mut positions = PositionCollection::new();
        let position = Position::new(4.0, 5.0, 6.0, 1);
        positions
            .add_with_shape(position, PositionShape(vec![json!("ellipse"), json!(3.0)]))
            .unwrap();
        positions.add(position).unwrap();
        assert_eq!(positions.shape_of(&position).unwrap().fields().len(), 2);
    }

    #[test]
    fn test_move_position_keeps_shape() {
        let mut positions = PositionCollection::new();
        let old = Position::new(4.0, 5.0, 6.0, 1);
        let new = Position::new(7.0, 5.0, 6.0, 1);
        positions
            .add_with_shape(old, PositionShape(vec![json!(1)]))
            .unwrap();
        assert!(positions.move_position(&old, new).unwrap());
        assert!(!positions.contains(&old));
        assert_eq!(positions.shape_of(&new), Some(&PositionShape(vec![json!(1)])));
        assert!(!positions.move_position(&old, new).unwrap());
    }

    #[test]
    fn test_of_time_point_is_sorted() {
        let positions = PositionCollection::from_positions([
            Position::new(3.0, 0.0, 0.0, 1),
            Position::new(1.0, 0.0, 0.0, 1),
            Position::new(2.0, 0.0, 0.0, 1),
            Position::new(0.0, 0.0, 0.0, 2),
        ])
        .unwrap();
        let xs: Vec<f64> = positions
            .of_time_point(TimePoint::new(1))
            .iter()
            .map(|p| p.x)
            .collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert_eq!(positions.iter().count(), 4);
    }
}
