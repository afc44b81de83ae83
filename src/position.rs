use crate::{
    error::{Result, TrackerError},
    resolution::ImageResolution,
};
use celltrack_protocol::SavedPosition;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    ops::{Add, Sub},
};

/// Two coordinates closer than this are the same coordinate.
pub const POSITION_EPSILON: f64 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimePoint(i32);

impl TimePoint {
    pub fn new(time_point_number: i32) -> Self {
        Self(time_point_number)
    }

    pub fn time_point_number(self) -> i32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn previous(self) -> Self {
        Self(self.0 - 1)
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time point {}", self.0)
    }
}

/// A detected cell location in pixel coordinates, optionally bound to a time point.
///
/// Equality, hashing and ordering all work on coordinates snapped to a
/// [`POSITION_EPSILON`] grid, so positions read back from a file compare equal
/// to the ones that were written.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(into = "SavedPosition", from = "SavedPosition")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    time_point_number: Option<i32>,
}

fn snap(value: f64) -> i64 {
    (value / POSITION_EPSILON).round() as i64
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64, time_point_number: i32) -> Self {
        Self {
            x,
            y,
            z,
            time_point_number: Some(time_point_number),
        }
    }

    pub fn without_time_point(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            time_point_number: None,
        }
    }

    pub fn with_time_point_number(self, time_point_number: i32) -> Self {
        Self {
            time_point_number: Some(time_point_number),
            ..self
        }
    }

    pub fn with_time_point(self, time_point: TimePoint) -> Self {
        self.with_time_point_number(time_point.time_point_number())
    }

    pub fn time_point_number(&self) -> Option<i32> {
        self.time_point_number
    }

    pub fn time_point(&self) -> Option<TimePoint> {
        self.time_point_number.map(TimePoint::new)
    }

    pub fn require_time_point(&self) -> Result<TimePoint> {
        self.time_point()
            .ok_or_else(|| TrackerError::MissingTimePoint(self.to_string()))
    }

    pub fn is_zero(&self) -> bool {
        snap(self.x) == 0 && snap(self.y) == 0 && snap(self.z) == 0
    }

    /// Squared distance in micrometers. Each axis is scaled by its own pixel size,
    /// which matters because z-spacing usually differs from x/y spacing.
    pub fn distance_squared_um(&self, other: &Position, resolution: &ImageResolution) -> f64 {
        let dx = (self.x - other.x) * resolution.pixel_size_x_um;
        let dy = (self.y - other.y) * resolution.pixel_size_y_um;
        let dz = (self.z - other.z) * resolution.pixel_size_z_um;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance_um(&self, other: &Position, resolution: &ImageResolution) -> f64 {
        self.distance_squared_um(other, resolution).sqrt()
    }

    fn key(&self) -> (Option<i32>, i64, i64, i64) {
        (
            self.time_point_number,
            snap(self.x),
            snap(self.y),
            snap(self.z),
        )
    }

    pub fn to_saved(&self) -> SavedPosition {
        SavedPosition {
            x: self.x,
            y: self.y,
            z: self.z,
            time_point_number: self.time_point_number,
        }
    }

    pub fn from_saved(saved: &SavedPosition) -> Self {
        Self {
            x: saved.x,
            y: saved.y,
            z: saved.z,
            time_point_number: saved.time_point_number,
        }
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Vector sum; keeps the time point of the left-hand side.
impl Add for Position {
    type Output = Position;

    fn add(self, other: Position) -> Position {
        Position {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            time_point_number: self.time_point_number,
        }
    }
}

/// Vector difference; keeps the time point of the left-hand side.
impl Sub for Position {
    type Output = Position;

    fn sub(self, other: Position) -> Position {
        Position {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            time_point_number: self.time_point_number,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell at ({:.2}, {:.2}, {:.0})", self.x, self.y, self.z)?;
        if let Some(time_point_number) = self.time_point_number {
            write!(f, " at time point {time_point_number}")?;
        }
        Ok(())
    }
}

impl From<&SavedPosition> for Position {
    fn from(saved: &SavedPosition) -> Self {
        Position::from_saved(saved)
    }
}

impl From<SavedPosition> for Position {
    fn from(saved: SavedPosition) -> Self {
        Position::from_saved(&saved)
    }
}

impl From<Position> for SavedPosition {
    fn from(position: Position) -> Self {
        position.to_saved()
    }
}

impl From<&Position> for SavedPosition {
    fn from(position: &Position) -> Self {
        position.to_saved()
    }
}
