//! Curves drawn through the cells of a time point (for example a crypt axis), used
//! to express a cell location as a distance along the curve.

use crate::position::{Position, TimePoint};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::OnceLock};

/// Number of samples taken from the smoothed curve, at parameter steps of 0.05.
const INTERPOLATION_SAMPLES: usize = 21;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathPosition {
    /// Index of the path within its time point, if the position was resolved through a
    /// [`PathCollection`].
    pub path_index: Option<usize>,
    /// Distance along the path, in pixels, corrected for the path offset.
    pub pos: f64,
    /// Perpendicular distance to the path, in pixels.
    pub distance: f64,
}

#[derive(Clone, Debug, Default)]
pub struct Path {
    x_list: Vec<f64>,
    y_list: Vec<f64>,
    z: Option<i32>,
    offset: f64,
    interpolation: OnceLock<(Vec<f64>, Vec<f64>)>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// The z of the first point is used for the whole path.
    pub fn add_point(&mut self, x: f64, y: f64, z: f64) {
        if self.z.is_none() {
            self.z = Some(z as i32);
        }
        self.x_list.push(x);
        self.y_list.push(y);
        self.interpolation.take();
    }

    /// Removes the first point within 1 px of the given coordinates. Returns whether a
    /// point was removed.
    pub fn remove_point(&mut self, x: f64, y: f64) -> bool {
        let Some(index) = self
            .x_list
            .iter()
            .zip(&self.y_list)
            .position(|(px, py)| (px - x).abs() < 1.0 && (py - y).abs() < 1.0)
        else {
            return false;
        };
        self.x_list.remove(index);
        self.y_list.remove(index);
        self.interpolation.take();
        true
    }

    pub fn points_2d(&self) -> (&[f64], &[f64]) {
        (&self.x_list, &self.y_list)
    }

    pub fn z(&self) -> Option<i32> {
        self.z
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn len(&self) -> usize {
        self.x_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_list.is_empty()
    }

    /// Sampled smoothed curve as `(xs, ys)`. Paths with fewer than two points return
    /// the points themselves.
    pub fn get_interpolation(&self) -> (&[f64], &[f64]) {
        let (xs, ys) = self
            .interpolation
            .get_or_init(|| interpolate(&self.x_list, &self.y_list));
        (xs, ys)
    }

    /// Projects the position on the closest segment of the sampled curve.
    pub fn get_path_position(&self, position: &Position) -> Option<PathPosition> {
        let (xs, ys) = self.get_interpolation();
        if xs.len() < 2 {
            return None;
        }

        let mut closest_segment = 1;
        let mut min_distance_squared = f64::INFINITY;
        let mut on_segment = 0.0;
        for i in 1..xs.len() {
            let (distance_squared, along) = project_on_segment(
                (xs[i - 1], ys[i - 1]),
                (xs[i], ys[i]),
                (position.x, position.y),
            );
            if distance_squared < min_distance_squared {
                min_distance_squared = distance_squared;
                closest_segment = i;
                on_segment = along;
            }
        }

        let previous_length: f64 = (1..closest_segment)
            .map(|i| distance((xs[i - 1], ys[i - 1]), (xs[i], ys[i])))
            .sum();

        Some(PathPosition {
            path_index: None,
            pos: previous_length + on_segment - self.offset,
            distance: min_distance_squared.sqrt(),
        })
    }

    /// Inverse of [`Path::get_path_position`] for points on the curve. `None` for
    /// positions before the start or past the end.
    pub fn path_position_to_xy(&self, path_position: f64) -> Option<(f64, f64)> {
        if self.x_list.len() < 2 {
            return None;
        }
        let mut remaining = path_position + self.offset;
        if remaining < 0.0 {
            return None;
        }
        let (xs, ys) = self.get_interpolation();
        for i in 1..xs.len() {
            let length = distance((xs[i - 1], ys[i - 1]), (xs[i], ys[i]));
            if remaining < length {
                let fraction = remaining / length;
                return Some((
                    xs[i - 1] + (xs[i] - xs[i - 1]) * fraction,
                    ys[i - 1] + (ys[i] - ys[i - 1]) * fraction,
                ));
            }
            remaining -= length;
        }
        None
    }

    /// Shifts the offset so that the lowest path position of the given positions
    /// becomes exactly zero.
    pub fn update_offset_for_positions<'a, I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = &'a Position>,
    {
        if self.x_list.len() < 2 {
            return;
        }
        let lowest = positions
            .into_iter()
            .filter_map(|position| self.get_path_position(position))
            .map(|path_position| path_position.pos)
            .fold(None, |lowest: Option<f64>, pos| {
                Some(lowest.map_or(pos, |l| l.min(pos)))
            });
        if let Some(lowest) = lowest {
            self.offset += lowest;
        }
    }

    /// General direction from the first to the last point, with (0, 0) in the top left.
    pub fn direction_marker(&self) -> char {
        let (Some(first_x), Some(last_x), Some(first_y), Some(last_y)) = (
            self.x_list.first(),
            self.x_list.last(),
            self.y_list.first(),
            self.y_list.last(),
        ) else {
            return '>';
        };
        if self.x_list.len() < 2 {
            return '>';
        }
        let dx = last_x - first_x;
        let dy = last_y - first_y;
        if dx.abs() > dy.abs() {
            if dx < 0.0 { '<' } else { '>' }
        } else if dy < 0.0 {
            '^'
        } else {
            'v'
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.x_list == other.x_list
            && self.y_list == other.y_list
            && self.z == other.z
            && self.offset == other.offset
    }
}

fn distance_squared(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    distance_squared(a, b).sqrt()
}

/// Squared distance from the point to the segment, and how far along the segment the
/// point projects. The projection is clamped to the segment ends.
fn project_on_segment(start: (f64, f64), end: (f64, f64), point: (f64, f64)) -> (f64, f64) {
    let length_squared = distance_squared(start, end);
    if length_squared == 0.0 {
        return (distance_squared(point, start), 0.0);
    }
    let t = ((point.0 - start.0) * (end.0 - start.0) + (point.1 - start.1) * (end.1 - start.1))
        / length_squared;
    let t = t.clamp(0.0, 1.0);
    let projected = (
        start.0 + t * (end.0 - start.0),
        start.1 + t * (end.1 - start.1),
    );
    (distance_squared(point, projected), t * length_squared.sqrt())
}

fn interpolate(x_list: &[f64], y_list: &[f64]) -> (Vec<f64>, Vec<f64>) {
    // Repeated points would give a zero-length parameter step
    let mut xs = vec![];
    let mut ys = vec![];
    for (x, y) in x_list.iter().zip(y_list) {
        if xs.last() == Some(x) && ys.last() == Some(y) {
            continue;
        }
        xs.push(*x);
        ys.push(*y);
    }
    if xs.len() < 2 {
        return (x_list.to_vec(), y_list.to_vec());
    }

    let mut params = vec![0.0];
    for i in 1..xs.len() {
        params.push(params[i - 1] + distance((xs[i - 1], ys[i - 1]), (xs[i], ys[i])));
    }
    let total = params[params.len() - 1];
    for param in params.iter_mut() {
        *param /= total;
    }

    let cubic = x_list.len() > 3 && xs.len() > 2;
    let (x_curve, y_curve) = if cubic {
        (
            natural_cubic_second_derivatives(&params, &xs),
            natural_cubic_second_derivatives(&params, &ys),
        )
    } else {
        (vec![0.0; xs.len()], vec![0.0; ys.len()])
    };

    let mut sampled_x = Vec::with_capacity(INTERPOLATION_SAMPLES);
    let mut sampled_y = Vec::with_capacity(INTERPOLATION_SAMPLES);
    for step in 0..INTERPOLATION_SAMPLES {
        let s = step as f64 / (INTERPOLATION_SAMPLES - 1) as f64;
        sampled_x.push(evaluate_spline(&params, &xs, &x_curve, s));
        sampled_y.push(evaluate_spline(&params, &ys, &y_curve, s));
    }
    (sampled_x, sampled_y)
}

/// Second derivatives at the knots of the natural cubic spline through the values,
/// solved with the tridiagonal (Thomas) algorithm.
fn natural_cubic_second_derivatives(knots: &[f64], values: &[f64]) -> Vec<f64> {
    let n = knots.len();
    let mut second = vec![0.0; n];
    if n < 3 {
        return second;
    }
    let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();

    let inner = n - 2;
    let mut diagonal = vec![0.0; inner];
    let mut upper = vec![0.0; inner];
    let mut rhs = vec![0.0; inner];
    for row in 0..inner {
        let i = row + 1;
        diagonal[row] = 2.0 * (h[i - 1] + h[i]);
        upper[row] = h[i];
        rhs[row] = 6.0
            * ((values[i + 1] - values[i]) / h[i] - (values[i] - values[i - 1]) / h[i - 1]);
    }
    for row in 1..inner {
        let factor = h[row] / diagonal[row - 1];
        diagonal[row] -= factor * upper[row - 1];
        rhs[row] -= factor * rhs[row - 1];
    }
    for row in (0..inner).rev() {
        let next = if row + 1 < inner { second[row + 2] } else { 0.0 };
        second[row + 1] = (rhs[row] - upper[row] * next) / diagonal[row];
    }
    second
}

fn evaluate_spline(knots: &[f64], values: &[f64], second: &[f64], s: f64) -> f64 {
    let segment = knots
        .windows(2)
        .position(|w| s <= w[1])
        .unwrap_or(knots.len() - 2);
    let h = knots[segment + 1] - knots[segment];
    let a = (knots[segment + 1] - s) / h;
    let b = (s - knots[segment]) / h;
    a * values[segment]
        + b * values[segment + 1]
        + ((a.powi(3) - a) * second[segment] + (b.powi(3) - b) * second[segment + 1]) * h * h
            / 6.0
}

/// The paths of all time points. Time points without paths borrow them from the
/// nearest earlier time point that has paths, or else from the nearest later one.
#[derive(Clone, Debug, Default)]
pub struct PathCollection {
    paths: BTreeMap<TimePoint, Vec<Path>>,
}

impl PathCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_path(&mut self, time_point: TimePoint, path: Path) {
        self.paths.entry(time_point).or_default().push(path);
    }

    /// Removes the path with the given index from the time point's own paths.
    pub fn remove_path(&mut self, time_point: TimePoint, index: usize) -> Option<Path> {
        let paths = self.paths.get_mut(&time_point)?;
        if index >= paths.len() {
            return None;
        }
        let removed = paths.remove(index);
        if paths.is_empty() {
            self.paths.remove(&time_point);
        }
        Some(removed)
    }

    /// Paths that apply to the time point, possibly carried over from another time point.
    pub fn of_time_point(&self, time_point: TimePoint) -> &[Path] {
        if let Some((_, paths)) = self.paths.range(..=time_point).next_back() {
            return paths;
        }
        self.paths
            .range(time_point..)
            .next()
            .map(|(_, paths)| paths.as_slice())
            .unwrap_or(&[])
    }

    /// Paths stored for exactly this time point, without carry-over.
    pub fn own_paths(&self, time_point: TimePoint) -> &[Path] {
        self.paths
            .get(&time_point)
            .map(|paths| paths.as_slice())
            .unwrap_or(&[])
    }

    pub fn own_paths_mut(&mut self, time_point: TimePoint) -> Option<&mut Vec<Path>> {
        self.paths.get_mut(&time_point)
    }

    pub fn exists(&self, path: &Path, time_point: TimePoint) -> bool {
        self.own_paths(time_point).contains(path)
    }

    /// Position along the nearest path of the position's time point.
    pub fn get_path_position(&self, position: &Position) -> Option<PathPosition> {
        let time_point = position.time_point()?;
        self.of_time_point(time_point)
            .iter()
            .enumerate()
            .filter_map(|(index, path)| {
                path.get_path_position(position).map(|path_position| PathPosition {
                    path_index: Some(index),
                    ..path_position
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Time points with their own paths, ascending.
    pub fn time_points(&self) -> Vec<TimePoint> {
        self.paths.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimePoint, &[Path])> {
        self.paths
            .iter()
            .map(|(time_point, paths)| (*time_point, paths.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_path() -> Path {
        let mut path = Path::new();
        for x in [0.0, 10.0, 20.0, 30.0] {
            path.add_point(x, 0.0, 4.0);
        }
        path
    }

    #[test]
    fn test_interpolation_of_straight_line() {
        let path = straight_path();
        let (xs, ys) = path.get_interpolation();
        assert_eq!(xs.len(), 21);
        for (i, (x, y)) in xs.iter().zip(ys).enumerate() {
            assert!((x - 1.5 * i as f64).abs() < 1e-9, "sample {i} at {x}");
            assert!(y.abs() < 1e-9);
        }
        assert_eq!(path.z(), Some(4));
    }

    #[test]
    fn test_short_paths() {
        let mut path = Path::new();
        assert!(path.get_path_position(&Position::new(1.0, 1.0, 0.0, 1)).is_none());
        path.add_point(3.0, 4.0, 0.0);
        assert_eq!(path.get_interpolation().0, &[3.0]);
        assert!(path.get_path_position(&Position::new(1.0, 1.0, 0.0, 1)).is_none());
        assert_eq!(path.path_position_to_xy(0.0), None);

        // Two points use a straight line
        path.add_point(3.0, 24.0, 0.0);
        let (xs, ys) = path.get_interpolation();
        assert_eq!(xs.len(), 21);
        assert!((ys[10] - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_cubic_passes_through_points() {
        let mut path = Path::new();
        for (x, y) in [(0.0, 0.0), (10.0, 5.0), (20.0, 0.0), (30.0, 5.0), (40.0, 0.0)] {
            path.add_point(x, y, 0.0);
        }
        let (xs, ys) = path.get_interpolation();
        assert_eq!((xs[0], ys[0]), (0.0, 0.0));
        assert!((xs[20] - 40.0).abs() < 1e-9);
        assert!(ys[20].abs() < 1e-9);
    }

    #[test]
    fn test_path_position() {
        let path = straight_path();
        let path_position = path
            .get_path_position(&Position::new(15.0, 5.0, 0.0, 1))
            .unwrap();
        assert!((path_position.pos - 15.0).abs() < 1e-9);
        assert!((path_position.distance - 5.0).abs() < 1e-9);
        assert_eq!(path_position.path_index, None);

        // Projection is clamped to the end of the path
        let beyond = path
            .get_path_position(&Position::new(40.0, 0.0, 0.0, 1))
            .unwrap();
        assert!((beyond.pos - 30.0).abs() < 1e-9);
        assert!((beyond.distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_offset_makes_minimum_zero() {
        let mut path = straight_path();
        let positions = [
            Position::new(20.0, 3.0, 0.0, 1),
            Position::new(5.0, -1.0, 0.0, 1),
            Position::new(12.0, 2.0, 0.0, 1),
        ];
        path.update_offset_for_positions(&positions);
        let lowest = positions
            .iter()
            .map(|p| path.get_path_position(p).unwrap().pos)
            .fold(f64::INFINITY, f64::min);
        assert!(lowest.abs() < 1e-9);
        assert!((path.offset() - 5.0).abs() < 1e-9);

        let before = path.offset();
        let no_positions: [Position; 0] = [];
        path.update_offset_for_positions(&no_positions);
        assert_eq!(path.offset(), before);
    }

    #[test]
    fn test_path_position_to_xy() {
        let mut path = straight_path();
        path.set_offset(2.0);
        let (x, y) = path.path_position_to_xy(10.0).unwrap();
        assert!((x - 12.0).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
        assert_eq!(path.path_position_to_xy(-3.0), None);
        assert_eq!(path.path_position_to_xy(100.0), None);
    }

    #[test]
    fn test_remove_point_invalidates_interpolation() {
        let mut path = straight_path();
        assert_eq!(path.get_interpolation().0.len(), 21);
        assert!(!path.remove_point(5.0, 0.0));
        assert!(path.remove_point(10.5, -0.5));
        assert_eq!(path.points_2d().0, &[0.0, 20.0, 30.0]);
        let (xs, _) = path.get_interpolation();
        assert!((xs[20] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_direction_marker() {
        let mut path = Path::new();
        assert_eq!(path.direction_marker(), '>');
        path.add_point(10.0, 10.0, 0.0);
        path.add_point(0.0, 12.0, 0.0);
        assert_eq!(path.direction_marker(), '<');
        path.add_point(4.0, -20.0, 0.0);
        assert_eq!(path.direction_marker(), '^');
        path.add_point(10.0, 30.0, 0.0);
        assert_eq!(path.direction_marker(), 'v');
    }

    #[test]
    fn test_collection_carry_forward() {
        let mut paths = PathCollection::new();
        paths.add_path(TimePoint::new(3), straight_path());
        assert_eq!(paths.of_time_point(TimePoint::new(5)).len(), 1);
        assert_eq!(paths.of_time_point(TimePoint::new(1)).len(), 1);
        assert!(paths.own_paths(TimePoint::new(5)).is_empty());
        assert!(paths.exists(&straight_path(), TimePoint::new(3)));
        assert!(!paths.exists(&straight_path(), TimePoint::new(4)));

        let mut other = Path::new();
        other.add_point(0.0, 100.0, 0.0);
        other.add_point(30.0, 100.0, 0.0);
        paths.add_path(TimePoint::new(3), other);
        let path_position = paths
            .get_path_position(&Position::new(8.0, 90.0, 0.0, 7))
            .unwrap();
        assert_eq!(path_position.path_index, Some(1));
        assert!((path_position.distance - 10.0).abs() < 1e-9);

        assert!(paths.remove_path(TimePoint::new(3), 5).is_none());
        assert!(paths.remove_path(TimePoint::new(3), 0).is_some());
        assert_eq!(paths.time_points(), vec![TimePoint::new(3)]);
    }
}
