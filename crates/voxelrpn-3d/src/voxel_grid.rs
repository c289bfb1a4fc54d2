use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::pointcloud::LidarPointCloud;
use crate::GeometryError;

/// Number of values stored per point in a voxel: `x, y, z, r, dx, dy, dz`.
pub const VOXEL_FEATURE_DIM: usize = 7;

/// Static voxel geometry. All triples are in `x, y, z` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelConfig {
    /// Extent of the voxelized scene in meters.
    pub scene_size: [f32; 3],
    /// Size of one voxel in meters.
    pub voxel_size: [f32; 3],
    /// Number of voxels along each axis.
    pub grid_size: [usize; 3],
    /// Offset added to every point before binning.
    pub origin_shift: [f32; 3],
    /// Maximum number of points kept per voxel (`T`).
    pub max_points_per_voxel: usize,
    /// Shuffle the input before binning so truncation keeps a random subset.
    pub shuffle: bool,
}

impl Default for VoxelConfig {
    fn default() -> Self {
        Self {
            scene_size: [70.4, 80.0, 4.0],
            voxel_size: [0.2, 0.2, 0.4],
            grid_size: [352, 400, 10],
            origin_shift: [0.0, 40.0, 3.0],
            max_points_per_voxel: 35,
            shuffle: false,
        }
    }
}

impl VoxelConfig {
    /// Check that the geometry is usable.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidVoxelConfig`] when a size is not
    /// positive, `T` is zero, or `grid_size * voxel_size` disagrees with
    /// `scene_size`.
    pub fn validate(&self) -> Result<(), GeometryError> {
        const AXES: [&str; 3] = ["x", "y", "z"];

        if self.max_points_per_voxel == 0 {
            return Err(GeometryError::InvalidVoxelConfig(
                "max_points_per_voxel must be positive".to_string(),
            ));
        }

        for (i, axis) in AXES.iter().enumerate() {
            let voxel = self.voxel_size[i];
            if voxel <= 0.0 || !voxel.is_finite() {
                return Err(GeometryError::InvalidVoxelConfig(format!(
                    "voxel size along {axis} must be positive, got {voxel}"
                )));
            }
            if self.grid_size[i] == 0 {
                return Err(GeometryError::InvalidVoxelConfig(format!(
                    "grid size along {axis} must be positive"
                )));
            }
            let covered = self.grid_size[i] as f32 * voxel;
            let scene = self.scene_size[i];
            if (covered - scene).abs() > 1e-3 * scene.abs().max(1.0) {
                return Err(GeometryError::InvalidVoxelConfig(format!(
                    "grid covers {covered} m along {axis} but the scene is {scene} m"
                )));
            }
        }

        Ok(())
    }

    /// Total number of voxels in the grid.
    pub fn num_voxels(&self) -> usize {
        self.grid_size.iter().product()
    }
}

/// One occupied voxel.
#[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
pub struct VoxelRecord {
    /// Grid index in `(z, y, x)` order.
    pub key: [i64; 3],
    /// Number of retained points, between 1 and `T`.
    pub point_count: usize,
    /// Retained points in arrival order as `(x, y, z, r, dx, dy, dz)`, where
    /// `d*` is the offset from the mean of the retained points.
    pub features: Vec<[f32; VOXEL_FEATURE_DIM]>,
}

/// The sparse voxel representation of a scan, ordered by voxel key.
#[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
pub struct VoxelGrid {
    /// Occupied voxels sorted by `(z, y, x)` key.
    pub voxels: Vec<VoxelRecord>,
    /// Capacity `T` each voxel was truncated to.
    pub max_points_per_voxel: usize,
}

impl VoxelGrid {
    /// Number of occupied voxels (`K`).
    #[inline]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Check whether no voxel is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// `[K, 3]` voxel keys.
    pub fn coordinate_buffer(&self) -> Vec<[i64; 3]> {
        self.voxels.iter().map(|v| v.key).collect()
    }

    /// `[K]` retained point counts.
    pub fn number_buffer(&self) -> Vec<usize> {
        self.voxels.iter().map(|v| v.point_count).collect()
    }

    /// Dense row-major `[K, T, 7]` feature buffer, zero padded.
    pub fn feature_buffer(&self) -> Vec<f32> {
        let t = self.max_points_per_voxel;
        let mut buffer = vec![0.0; self.voxels.len() * t * VOXEL_FEATURE_DIM];
        for (voxel, dst) in self
            .voxels
            .iter()
            .zip(buffer.chunks_exact_mut(t * VOXEL_FEATURE_DIM))
        {
            let src = voxel.features.as_flattened();
            dst[..src.len()].copy_from_slice(src);
        }
        buffer
    }

    /// Sum of retained points over all voxels.
    pub fn total_points(&self) -> usize {
        self.voxels.iter().map(|v| v.point_count).sum()
    }
}

/// Bins lidar points into a fixed voxel grid.
#[derive(Debug, Clone)]
pub struct Voxelizer {
    config: VoxelConfig,
}

impl Voxelizer {
    /// Create a voxelizer for the given geometry.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidVoxelConfig`] if the geometry is invalid.
    pub fn new(config: VoxelConfig) -> Result<Self, GeometryError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The voxel geometry.
    pub fn config(&self) -> &VoxelConfig {
        &self.config
    }

    /// Grid key `(z, y, x)` of a point, `None` when it falls outside the grid.
    pub fn voxel_key(&self, point: &[f32; 4]) -> Option<[i64; 3]> {
        let c = &self.config;
        let mut key = [0i64; 3];
        // reversed axes: key[0] is z
        for axis in 0..3 {
            let index =
                ((point[axis] + c.origin_shift[axis]) / c.voxel_size[axis]).floor();
            if !(index >= 0.0 && index < c.grid_size[axis] as f32) {
                return None;
            }
            key[2 - axis] = index as i64;
        }
        Some(key)
    }

    fn pack_key(&self, key: &[i64; 3]) -> u64 {
        let [gx, gy, _] = self.config.grid_size;
        (key[0] as u64 * gy as u64 + key[1] as u64) * gx as u64 + key[2] as u64
    }

    /// Voxelize a scan, shuffling it first when the configuration asks for it.
    ///
    /// With shuffling enabled the retained subset of an over-full voxel
    /// depends on `rng`; seed it for reproducible output.
    pub fn voxelize<R: rand::Rng + ?Sized>(
        &self,
        cloud: &LidarPointCloud,
        rng: &mut R,
    ) -> VoxelGrid {
        if self.config.shuffle {
            let mut points = cloud.points().to_vec();
            points.shuffle(rng);
            self.voxelize_ordered(&points)
        } else {
            self.voxelize_ordered(cloud.points())
        }
    }

    /// Voxelize points in the given order.
    ///
    /// Points outside the grid are dropped. Each voxel keeps the first `T`
    /// points that land in it, and the centered offsets use only those.
    pub fn voxelize_ordered(&self, points: &[[f32; 4]]) -> VoxelGrid {
        let t = self.config.max_points_per_voxel;

        let mut slots: HashMap<u64, usize> = HashMap::new();
        let mut voxels: Vec<(u64, VoxelRecord)> = Vec::new();
        let mut num_dropped = 0usize;
        let mut num_truncated = 0usize;

        for point in points {
            let Some(key) = self.voxel_key(point) else {
                num_dropped += 1;
                continue;
            };
            let packed = self.pack_key(&key);
            let slot = *slots.entry(packed).or_insert_with(|| {
                voxels.push((
                    packed,
                    VoxelRecord {
                        key,
                        point_count: 0,
                        features: Vec::with_capacity(t),
                    },
                ));
                voxels.len() - 1
            });

            let voxel = &mut voxels[slot].1;
            if voxel.point_count < t {
                voxel
                    .features
                    .push([point[0], point[1], point[2], point[3], 0.0, 0.0, 0.0]);
                voxel.point_count += 1;
            } else {
                num_truncated += 1;
            }
        }

        voxels.sort_unstable_by_key(|(packed, _)| *packed);

        let mut voxels: Vec<VoxelRecord> = voxels.into_iter().map(|(_, v)| v).collect();
        voxels.iter_mut().for_each(center_features);

        log::debug!(
            "voxelized {} points into {} voxels ({} out of range, {} over capacity)",
            points.len(),
            voxels.len(),
            num_dropped,
            num_truncated
        );

        VoxelGrid {
            voxels,
            max_points_per_voxel: t,
        }
    }
}

fn center_features(voxel: &mut VoxelRecord) {
    if voxel.point_count == 0 {
        return;
    }
    let mut sum = [0.0f32; 3];
    for f in &voxel.features {
        sum[0] += f[0];
        sum[1] += f[1];
        sum[2] += f[2];
    }
    let inv_count = 1.0 / voxel.point_count as f32;
    let mean = sum.map(|s| s * inv_count);
    for f in voxel.features.iter_mut() {
        f[4] = f[0] - mean[0];
        f[5] = f[1] - mean[1];
        f[6] = f[2] - mean[2];
    }
}
