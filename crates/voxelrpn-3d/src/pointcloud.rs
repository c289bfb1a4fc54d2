/// A lidar scan: points as `(x, y, z, reflectance)` in the lidar frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LidarPointCloud {
    // The points in the scan.
    points: Vec<[f32; 4]>,
}

impl LidarPointCloud {
    /// Create a new point cloud from `(x, y, z, reflectance)` points.
    pub fn new(points: Vec<[f32; 4]>) -> Self {
        Self { points }
    }

    /// Create a point cloud from a flat `[x0, y0, z0, r0, x1, ...]` buffer.
    ///
    /// Trailing values that do not form a whole point are ignored.
    pub fn from_flat(values: &[f32]) -> Self {
        let points = values
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        Self { points }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f32; 4]] {
        &self.points
    }

    /// Get as mutable reference the points in the point cloud.
    pub fn points_mut(&mut self) -> &mut Vec<[f32; 4]> {
        &mut self.points
    }

    /// Consume the point cloud and return its points.
    pub fn into_points(self) -> Vec<[f32; 4]> {
        self.points
    }

    /// The xyz part of every point, widened to `f64`.
    pub fn xyz(&self) -> Vec<[f64; 3]> {
        self.points
            .iter()
            .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
            .collect()
    }

    /// Get the minimum xyz bound of the point cloud, zero when empty.
    pub fn min_bound(&self) -> [f32; 3] {
        self.fold_xyz(f32::min)
    }

    /// Get the maximum xyz bound of the point cloud, zero when empty.
    pub fn max_bound(&self) -> [f32; 3] {
        self.fold_xyz(f32::max)
    }

    fn fold_xyz(&self, f: impl Fn(f32, f32) -> f32) -> [f32; 3] {
        let Some(first) = self.points.first() else {
            return [0.0; 3];
        };
        self.points
            .iter()
            .fold([first[0], first[1], first[2]], |acc, p| {
                [f(acc[0], p[0]), f(acc[1], p[1]), f(acc[2], p[2])]
            })
    }
}

impl From<Vec<[f32; 4]>> for LidarPointCloud {
    fn from(points: Vec<[f32; 4]>) -> Self {
        Self::new(points)
    }
}
