use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// Top-down raster covering the detection range.
///
/// Cell `(a, b)` holds lidar `x` in `[x_min + a * cell, x_min + (a + 1) * cell)`
/// and likewise `y` along `b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirdviewConfig {
    /// `[x_min, x_max]` in meters.
    pub x_range: [f64; 2],
    /// `[y_min, y_max]` in meters.
    pub y_range: [f64; 2],
    /// Cell size along x and y in meters.
    pub cell_size: [f64; 2],
}

impl Default for BirdviewConfig {
    fn default() -> Self {
        Self {
            x_range: [0.0, 70.4],
            y_range: [-40.0, 40.0],
            cell_size: [0.2, 0.2],
        }
    }
}

impl BirdviewConfig {
    /// Check that the ranges are ordered and the cells positive.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidVoxelConfig`] otherwise.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let [x_min, x_max] = self.x_range;
        let [y_min, y_max] = self.y_range;
        if !(x_max > x_min && y_max > y_min) {
            return Err(GeometryError::InvalidVoxelConfig(format!(
                "empty birdview range x {:?} y {:?}",
                self.x_range, self.y_range
            )));
        }
        if self.cell_size.iter().any(|c| *c <= 0.0 || !c.is_finite()) {
            return Err(GeometryError::InvalidVoxelConfig(format!(
                "birdview cell size must be positive, got {:?}",
                self.cell_size
            )));
        }
        Ok(())
    }

    /// Number of cells along x.
    pub fn width(&self) -> usize {
        ((self.x_range[1] - self.x_range[0]) / self.cell_size[0]).round() as usize
    }

    /// Number of cells along y.
    pub fn height(&self) -> usize {
        ((self.y_range[1] - self.y_range[0]) / self.cell_size[1]).round() as usize
    }

    /// Map a lidar `(x, y)` to continuous birdview coordinates.
    ///
    /// The result is scaled by `factor` and clipped to `[0, width * factor]`
    /// and `[0, height * factor]`.
    pub fn lidar_to_bird_view(&self, x: f64, y: f64, factor: f64) -> [f64; 2] {
        let a = (x - self.x_range[0]) / self.cell_size[0] * factor;
        let b = (y - self.y_range[0]) / self.cell_size[1] * factor;
        let a_max = (self.x_range[1] - self.x_range[0]) / self.cell_size[0] * factor;
        let b_max = (self.y_range[1] - self.y_range[0]) / self.cell_size[1] * factor;
        [a.clamp(0.0, a_max), b.clamp(0.0, b_max)]
    }

    /// Cell holding lidar `(x, y)`, without clipping.
    ///
    /// Points outside the range map to negative indices or to indices past
    /// [`BirdviewConfig::width`] and [`BirdviewConfig::height`].
    pub fn lidar_to_cell(&self, x: f64, y: f64) -> [i64; 2] {
        [
            ((x - self.x_range[0]) / self.cell_size[0]).floor() as i64,
            ((y - self.y_range[0]) / self.cell_size[1]).floor() as i64,
        ]
    }

    /// Batch version of [`BirdviewConfig::lidar_to_bird_view`].
    pub fn lidar_to_bird_view_points(&self, points: &[[f64; 2]], factor: f64) -> Vec<[f64; 2]> {
        points
            .iter()
            .map(|p| self.lidar_to_bird_view(p[0], p[1], factor))
            .collect()
    }
}
