use std::path::Path;

use serde::{Deserialize, Serialize};
use voxelrpn_3d::birdview::BirdviewConfig;
use voxelrpn_3d::calibration::{Calibration, CalibrationMatrices};
use voxelrpn_3d::voxel_grid::VoxelConfig;

use crate::RpnError;

/// Class name whose scans are voxelized in arrival order.
pub const PRIMARY_CLASS: &str = "Car";

/// Anchor grid geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// `[x_min, x_max]` spanned by anchor centers.
    pub x_range: [f64; 2],
    /// `[y_min, y_max]` spanned by anchor centers.
    pub y_range: [f64; 2],
    /// Feature map columns (anchors along x).
    pub feature_width: usize,
    /// Feature map rows (anchors along y).
    pub feature_height: usize,
    /// Anchor center z.
    pub z: f64,
    /// Anchor height; also the normalizer of the z regression target.
    pub h: f64,
    /// Anchor width.
    pub w: f64,
    /// Anchor length.
    pub l: f64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            x_range: [0.0, 70.4],
            y_range: [-40.0, 40.0],
            feature_width: 176,
            feature_height: 200,
            z: -1.0,
            h: 1.56,
            w: 1.6,
            l: 3.9,
        }
    }
}

impl AnchorConfig {
    /// Check the anchor geometry.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Config`] for an empty feature map, a reversed range
    /// or a non-positive anchor size.
    pub fn validate(&self) -> Result<(), RpnError> {
        if self.feature_width == 0 || self.feature_height == 0 {
            return Err(RpnError::Config(format!(
                "feature map must be non-empty, got {}x{}",
                self.feature_height, self.feature_width
            )));
        }
        if self.x_range[1] < self.x_range[0] || self.y_range[1] < self.y_range[0] {
            return Err(RpnError::Config(format!(
                "anchor range is reversed: x {:?} y {:?}",
                self.x_range, self.y_range
            )));
        }
        for (name, value) in [("h", self.h), ("w", self.w), ("l", self.l)] {
            if value <= 0.0 || !value.is_finite() {
                return Err(RpnError::Config(format!(
                    "anchor {name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// IoU thresholds and the class the targets are built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Pairs with IoU strictly above this are positive.
    pub pos_iou: f64,
    /// Anchors with IoU strictly below this for every box are negative.
    pub neg_iou: f64,
    /// Target class name, resolved through [`crate::labels::ClassFilter`].
    pub target_class: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            pos_iou: 0.6,
            neg_iou: 0.45,
            target_class: PRIMARY_CLASS.to_string(),
        }
    }
}

impl TargetConfig {
    /// Check the thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Config`] if a threshold is outside `[0, 1]` or the
    /// negative threshold exceeds the positive one.
    pub fn validate(&self) -> Result<(), RpnError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.pos_iou) || !in_unit(self.neg_iou) {
            return Err(RpnError::Config(format!(
                "IoU thresholds must lie in [0, 1], got pos {} neg {}",
                self.pos_iou, self.neg_iou
            )));
        }
        if self.neg_iou > self.pos_iou {
            return Err(RpnError::Config(format!(
                "negative threshold {} exceeds positive threshold {}",
                self.neg_iou, self.pos_iou
            )));
        }
        Ok(())
    }
}

/// Every piece of static geometry the preprocessing needs.
///
/// Built once at startup and passed by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Voxel grid. Its `shuffle` flag is overridden by [`DetectorConfig::voxel_config`].
    pub voxel: VoxelConfig,
    /// Birdview raster for exact IoU.
    pub birdview: BirdviewConfig,
    /// Anchor grid.
    pub anchors: AnchorConfig,
    /// Matching thresholds.
    pub targets: TargetConfig,
    /// Lidar/camera calibration.
    pub calibration: CalibrationMatrices,
}

impl DetectorConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Json`] on malformed input and [`RpnError::Config`]
    /// when validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, RpnError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Io`] if the file cannot be read, otherwise as
    /// [`DetectorConfig::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RpnError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Json`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, RpnError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Config`] describing the first failing section.
    pub fn validate(&self) -> Result<(), RpnError> {
        self.voxel
            .validate()
            .map_err(|e| RpnError::Config(format!("voxel: {e}")))?;
        self.birdview
            .validate()
            .map_err(|e| RpnError::Config(format!("birdview: {e}")))?;
        self.anchors.validate()?;
        self.targets.validate()?;
        Calibration::new(self.calibration.clone())
            .map_err(|e| RpnError::Config(format!("calibration: {e}")))?;

        if self.anchors.x_range != self.birdview.x_range
            || self.anchors.y_range != self.birdview.y_range
        {
            log::warn!(
                "anchor range x {:?} y {:?} differs from birdview range x {:?} y {:?}",
                self.anchors.x_range,
                self.anchors.y_range,
                self.birdview.x_range,
                self.birdview.y_range
            );
        }
        Ok(())
    }

    /// Voxel geometry with the shuffle flag derived from the target class.
    ///
    /// Scans are shuffled before truncation unless the target is the primary class.
    pub fn voxel_config(&self) -> VoxelConfig {
        VoxelConfig {
            shuffle: self.targets.target_class != PRIMARY_CLASS,
            ..self.voxel.clone()
        }
    }

    /// Build the calibration.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Geometry`] if a transform is singular.
    pub fn calibration(&self) -> Result<Calibration, RpnError> {
        Ok(Calibration::new(self.calibration.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() -> Result<(), RpnError> {
        DetectorConfig::default().validate()?;
        assert!(!DetectorConfig::default().voxel_config().shuffle);
        Ok(())
    }

    #[test]
    fn test_from_json_partial() -> Result<(), RpnError> {
        let config = DetectorConfig::from_json_str(
            r#"{ "targets": { "target_class": "Pedestrian", "pos_iou": 0.5, "neg_iou": 0.35 } }"#,
        )?;
        assert_eq!(config.targets.target_class, "Pedestrian");
        assert_eq!(config.targets.pos_iou, 0.5);
        assert_eq!(config.anchors, AnchorConfig::default());
        assert!(config.voxel_config().shuffle);
        Ok(())
    }

    #[test]
    fn test_invalid_thresholds() {
        let res = DetectorConfig::from_json_str(r#"{ "targets": { "pos_iou": 0.3, "neg_iou": 0.45 } }"#);
        assert!(matches!(res, Err(RpnError::Config(_))));
    }

    #[test]
    fn test_invalid_anchor_size() {
        let res = DetectorConfig::from_json_str(r#"{ "anchors": { "w": 0.0 } }"#);
        assert!(matches!(res, Err(RpnError::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        let res = DetectorConfig::from_json_str("{ anchors: ");
        assert!(matches!(res, Err(RpnError::Json(_))));
    }

    #[test]
    fn test_json_file_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("detector.json");
        let mut config = DetectorConfig::default();
        config.targets.target_class = "Cyclist".to_string();
        std::fs::write(&path, config.to_json_string()?)?;
        assert_eq!(DetectorConfig::from_json_file(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let res = DetectorConfig::from_json_file("/nonexistent/detector.json");
        assert!(matches!(res, Err(RpnError::Io(_))));
    }
}
