use crate::{
    error::Result,
    position::{Position, TimePoint},
};
use std::collections::BTreeMap;

/// Where the image stack of each time point starts, in pixels. Time points without an
/// explicit offset start at zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageOffsets {
    offsets: BTreeMap<TimePoint, Position>,
}

impl ImageOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the time point, carrying that time point.
    pub fn of_time_point(&self, time_point: TimePoint) -> Position {
        self.offsets
            .get(&time_point)
            .copied()
            .unwrap_or_else(|| Position::new(0.0, 0.0, 0.0, time_point.time_point_number()))
    }

    /// Sets the offset for every time point from `min_time_point` up to and including
    /// `max_time_point`.
    pub fn update_offset(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        min_time_point: i32,
        max_time_point: i32,
    ) {
        for time_point_number in min_time_point..=max_time_point {
            let offset = Position::new(x, y, z, time_point_number);
            if offset.is_zero() {
                self.offsets.remove(&TimePoint::new(time_point_number));
            } else {
                self.offsets
                    .insert(TimePoint::new(time_point_number), offset);
            }
        }
    }

    /// All non-zero offsets, ascending by time point.
    pub fn to_list(&self) -> Vec<Position> {
        self.offsets.values().copied().collect()
    }

    pub fn from_list<I: IntoIterator<Item = Position>>(offsets: I) -> Result<Self> {
        let mut ret = Self::new();
        for offset in offsets {
            let time_point = offset.require_time_point()?;
            if !offset.is_zero() {
                ret.offsets.insert(time_point, offset);
            }
        }
        Ok(ret)
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_at(offsets: &ImageOffsets, time_point_number: i32) -> (f64, f64, f64) {
        let offset = offsets.of_time_point(TimePoint::new(time_point_number));
        assert_eq!(offset.time_point_number(), Some(time_point_number));
        (offset.x, offset.y, offset.z)
    }

    #[test]
    fn test_range_is_inclusive() {
        let mut offsets = ImageOffsets::new();
        assert_eq!(offset_at(&offsets, 15), (0.0, 0.0, 0.0));

        offsets.update_offset(10.0, 9.0, 8.0, 12, 18);
        assert_eq!(offset_at(&offsets, 11), (0.0, 0.0, 0.0));
        assert_eq!(offset_at(&offsets, 12), (10.0, 9.0, 8.0));
        assert_eq!(offset_at(&offsets, 13), (10.0, 9.0, 8.0));
        assert_eq!(offset_at(&offsets, 18), (10.0, 9.0, 8.0));
        assert_eq!(offset_at(&offsets, 19), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_negative_time_points() {
        let mut offsets = ImageOffsets::new();
        assert_eq!(offset_at(&offsets, -15), (0.0, 0.0, 0.0));

        offsets.update_offset(10.0, 9.0, 8.0, -18, -12);
        assert_eq!(offset_at(&offsets, -11), (0.0, 0.0, 0.0));
        assert_eq!(offset_at(&offsets, -12), (10.0, 9.0, 8.0));
        assert_eq!(offset_at(&offsets, -13), (10.0, 9.0, 8.0));
        assert_eq!(offset_at(&offsets, -18), (10.0, 9.0, 8.0));
        assert_eq!(offset_at(&offsets, -19), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_list_round_trip() {
        let mut offsets = ImageOffsets::new();
        offsets.update_offset(1.0, 2.0, 0.0, 3, 4);
        offsets.update_offset(0.0, 0.0, 0.0, 4, 4);
        let list = offsets.to_list();
        assert_eq!(list, vec![Position::new(1.0, 2.0, 0.0, 3)]);
        assert_eq!(ImageOffsets::from_list(list).unwrap(), offsets);
    }
}
