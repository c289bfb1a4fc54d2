use std::f64::consts::FRAC_PI_2;

use voxelrpn_3d::boxes::{anchor_to_standup_2d, Box3D, StandupBox};

use crate::config::AnchorConfig;
use crate::RpnError;

/// Anchor yaws per feature map cell, in storage order.
pub const ANCHOR_YAWS: [f64; 2] = [0.0, FRAC_PI_2];

/// Number of anchors per feature map cell.
pub const NUM_ANCHORS_PER_CELL: usize = ANCHOR_YAWS.len();

/// `n` evenly spaced values from `start` to `end` inclusive.
///
/// A single value yields `[start]`.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// The dense `(height, width, 2)` anchor tensor over the feature map.
///
/// Anchors are stored flat with index `(row * width + col) * 2 + k`, where
/// `k = 0` has yaw `0` and `k = 1` has yaw `pi/2`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorGrid {
    config: AnchorConfig,
    anchors: Vec<Box3D>,
}

impl AnchorGrid {
    /// Lay anchors over the feature map described by `config`.
    ///
    /// Rows follow y and columns follow x, both spanning the configured range
    /// inclusively.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Config`] if the configuration is invalid.
    pub fn new(config: &AnchorConfig) -> Result<Self, RpnError> {
        config.validate()?;

        let xs = linspace(config.x_range[0], config.x_range[1], config.feature_width);
        let ys = linspace(config.y_range[0], config.y_range[1], config.feature_height);

        let mut anchors =
            Vec::with_capacity(config.feature_height * config.feature_width * NUM_ANCHORS_PER_CELL);
        for &y in &ys {
            for &x in &xs {
                for &r in &ANCHOR_YAWS {
                    anchors.push(Box3D::new(x, y, config.z, config.h, config.w, config.l, r));
                }
            }
        }

        Ok(Self {
            config: config.clone(),
            anchors,
        })
    }

    /// The configuration the grid was built from.
    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Feature map rows.
    pub fn height(&self) -> usize {
        self.config.feature_height
    }

    /// Feature map columns.
    pub fn width(&self) -> usize {
        self.config.feature_width
    }

    /// Total number of anchors, `height * width * 2`.
    #[inline]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Check whether the grid holds no anchors.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// All anchors in flat order.
    pub fn anchors(&self) -> &[Box3D] {
        &self.anchors
    }

    /// Flat index of anchor `k` in cell `(row, col)`.
    #[inline]
    pub fn index(&self, row: usize, col: usize, k: usize) -> usize {
        (row * self.width() + col) * NUM_ANCHORS_PER_CELL + k
    }

    /// Inverse of [`AnchorGrid::index`].
    #[inline]
    pub fn unravel(&self, index: usize) -> (usize, usize, usize) {
        let k = index % NUM_ANCHORS_PER_CELL;
        let cell = index / NUM_ANCHORS_PER_CELL;
        (cell / self.width(), cell % self.width(), k)
    }

    /// Anchor `k` in cell `(row, col)`.
    pub fn get(&self, row: usize, col: usize, k: usize) -> Option<&Box3D> {
        if row >= self.height() || col >= self.width() || k >= NUM_ANCHORS_PER_CELL {
            return None;
        }
        self.anchors.get(self.index(row, col, k))
    }

    /// Axis-aligned birdview rectangles of every anchor.
    pub fn standup_boxes(&self) -> Vec<StandupBox> {
        anchor_to_standup_2d(&self.anchors)
    }

    /// Anchor tensor as a flat `(height, width, 2, 7)` buffer.
    pub fn to_tensor(&self) -> Vec<f64> {
        self.anchors.iter().flat_map(|a| a.to_array()).collect()
    }
}
