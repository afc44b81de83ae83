use crate::error::{Result, TrackerError};
use celltrack_protocol::SavedResolution;
use serde::{Deserialize, Serialize};

/// Conversion from pixels and time points to micrometers and minutes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageResolution {
    pub pixel_size_x_um: f64,
    pub pixel_size_y_um: f64,
    pub pixel_size_z_um: f64,
    pub time_point_interval_m: f64,
}

impl ImageResolution {
    /// One micrometer per pixel on every axis, one minute per time point.
    pub const PIXELS: ImageResolution = ImageResolution {
        pixel_size_x_um: 1.0,
        pixel_size_y_um: 1.0,
        pixel_size_z_um: 1.0,
        time_point_interval_m: 1.0,
    };

    pub fn new(
        pixel_size_x_um: f64,
        pixel_size_y_um: f64,
        pixel_size_z_um: f64,
        time_point_interval_m: f64,
    ) -> Result<Self> {
        let values = [
            ("x", pixel_size_x_um),
            ("y", pixel_size_y_um),
            ("z", pixel_size_z_um),
            ("time", time_point_interval_m),
        ];
        for (axis, value) in values {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackerError::InvalidResolution(format!(
                    "{axis} resolution must be positive, got {value}"
                )));
            }
        }
        Ok(Self {
            pixel_size_x_um,
            pixel_size_y_um,
            pixel_size_z_um,
            time_point_interval_m,
        })
    }

    pub fn pixel_size_zyx_um(&self) -> (f64, f64, f64) {
        (
            self.pixel_size_z_um,
            self.pixel_size_y_um,
            self.pixel_size_x_um,
        )
    }

    pub fn time_point_interval_h(&self) -> f64 {
        self.time_point_interval_m / 60.0
    }

    pub fn to_saved(&self) -> SavedResolution {
        SavedResolution {
            x_um: self.pixel_size_x_um,
            y_um: self.pixel_size_y_um,
            z_um: self.pixel_size_z_um,
            t_m: self.time_point_interval_m,
        }
    }

    pub fn from_saved(saved: &SavedResolution) -> Result<Self> {
        Self::new(saved.x_um, saved.y_um, saved.z_um, saved.t_m)
    }
}

impl Default for ImageResolution {
    fn default() -> Self {
        Self::PIXELS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(ImageResolution::new(0.32, 0.32, 0.0, 12.0).is_err());
        assert!(ImageResolution::new(0.32, -1.0, 2.0, 12.0).is_err());
        assert!(ImageResolution::new(0.32, 0.32, 2.0, f64::NAN).is_err());
    }

    #[test]
    fn test_time_interval_in_hours() {
        let resolution = ImageResolution::new(0.32, 0.32, 2.0, 12.0).unwrap();
        assert!((resolution.time_point_interval_h() - 0.2).abs() < 1e-12);
        assert_eq!(resolution.pixel_size_zyx_um(), (2.0, 0.32, 0.32));
    }
}
