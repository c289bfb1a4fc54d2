#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Birdview (top-down) grid coordinates.
pub mod birdview;

/// Box representations and center/corner conversions.
pub mod boxes;

/// Sensor calibration and lidar/camera frame conversions.
pub mod calibration;

mod error;
pub use error::GeometryError;

/// Linear algebra utilities.
pub mod linalg;

/// Lidar point cloud type.
pub mod pointcloud;

/// 3D transforms: quaternions, rotations and yaw angles.
pub mod transforms;

mod utils;

/// Voxelization of lidar point clouds.
pub mod voxel_grid;
