#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Example: targets for one scene
//!
//! ```rust
//! use voxelrpn_3d::boxes::Box3D;
//! use voxelrpn_rpn::anchors::AnchorGrid;
//! use voxelrpn_rpn::config::DetectorConfig;
//! use voxelrpn_rpn::target::TargetAssigner;
//!
//! let config = DetectorConfig::default();
//! let anchors = AnchorGrid::new(&config.anchors)?;
//! let assigner = TargetAssigner::new(anchors, config.targets.clone())?;
//!
//! let gt = Box3D::new(20.0, 2.0, -1.0, 1.56, 1.6, 3.9, 0.0);
//! let targets = assigner.assign_boxes(&[gt]);
//! assert!(targets.num_positive() >= 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Anchor grid generation.
pub mod anchors;

/// Detector configuration.
pub mod config;

/// Box regression encoding and decoding.
pub mod delta;

mod error;
pub use error::RpnError;

/// Standup and rasterized IoU.
pub mod iou;

/// Object classes, ground-truth labels and label lines.
pub mod labels;

/// Convex polygon rasterization.
pub mod raster;

/// RPN target assignment.
pub mod target;
