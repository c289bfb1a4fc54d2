use serde::{Deserialize, Serialize};

use crate::boxes::Box3D;
use crate::linalg;
use crate::transforms::normalize_yaw;
use crate::GeometryError;

/// Raw calibration matrices supplied by the external calibration loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMatrices {
    /// Homogeneous lidar to (unrectified) camera transform.
    pub velo_to_cam: [[f64; 4]; 4],
    /// Homogeneous rectifying rotation of the reference camera.
    pub rect: [[f64; 4]; 4],
    /// 3x4 camera projection matrix.
    pub projection: [[f64; 4]; 3],
}

impl Default for CalibrationMatrices {
    fn default() -> Self {
        Self {
            velo_to_cam: [
                [7.49916597e-03, -9.99971248e-01, -8.65110297e-04, -6.71807577e-03],
                [1.18652889e-02, 9.54520517e-04, -9.99910318e-01, -7.33152811e-02],
                [9.99882833e-01, 7.49141178e-03, 1.18719929e-02, -2.78557062e-01],
                [0.0, 0.0, 0.0, 1.0],
            ],
            rect: [
                [0.99992475, 0.00975976, -0.00734152, 0.0],
                [-0.0097913, 0.99994262, -0.00430371, 0.0],
                [0.00730871, 0.00437527, 0.99996409, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            projection: [
                [719.787081, 0.0, 608.463003, 44.9538775],
                [0.0, 719.787081, 174.545111, 0.1066855],
                [0.0, 0.0, 1.0, 3.0106472e-03],
            ],
        }
    }
}

/// Validated lidar/camera calibration with precomputed inverse transforms.
///
/// Conversions are pure functions of this value; there is no hidden
/// process-wide calibration.
#[derive(Debug, Clone)]
pub struct Calibration {
    matrices: CalibrationMatrices,
    // rect * velo_to_cam
    lidar_to_camera: [[f64; 4]; 3],
    camera_to_lidar: [[f64; 4]; 3],
}

impl Calibration {
    /// Build a calibration, inverting both transforms up front.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SingularMatrix`] if either rotation block is singular.
    pub fn new(matrices: CalibrationMatrices) -> Result<Self, GeometryError> {
        let velo_to_cam = linalg::homogeneous_to_transform(&matrices.velo_to_cam);
        let rect = linalg::homogeneous_to_transform(&matrices.rect);

        let lidar_to_camera = linalg::compose_transforms(&rect, &velo_to_cam);
        let camera_to_lidar = linalg::compose_transforms(
            &linalg::invert_rigid_transform(&velo_to_cam)?,
            &linalg::invert_rigid_transform(&rect)?,
        );

        Ok(Self {
            matrices,
            lidar_to_camera,
            camera_to_lidar,
        })
    }

    /// Build a calibration from `base`, replacing the given matrices.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SingularMatrix`] if a resulting transform is singular.
    pub fn with_overrides(
        base: &CalibrationMatrices,
        velo_to_cam: Option<[[f64; 4]; 4]>,
        rect: Option<[[f64; 4]; 4]>,
    ) -> Result<Self, GeometryError> {
        let mut matrices = base.clone();
        if let Some(m) = velo_to_cam {
            matrices.velo_to_cam = m;
        }
        if let Some(m) = rect {
            matrices.rect = m;
        }
        Self::new(matrices)
    }

    /// The raw matrices this calibration was built from.
    pub fn matrices(&self) -> &CalibrationMatrices {
        &self.matrices
    }

    /// Combined 3x4 lidar to rectified camera transform.
    pub fn lidar_to_camera_transform(&self) -> &[[f64; 4]; 3] {
        &self.lidar_to_camera
    }

    /// Combined 3x4 rectified camera to lidar transform.
    pub fn camera_to_lidar_transform(&self) -> &[[f64; 4]; 3] {
        &self.camera_to_lidar
    }

    /// Convert a point from the lidar frame to the rectified camera frame.
    pub fn lidar_to_camera_point(&self, point: &[f64; 3]) -> [f64; 3] {
        linalg::transform_point(&self.lidar_to_camera, point)
    }

    /// Convert a point from the rectified camera frame to the lidar frame.
    pub fn camera_to_lidar_point(&self, point: &[f64; 3]) -> [f64; 3] {
        linalg::transform_point(&self.camera_to_lidar, point)
    }

    /// Convert a batch of points from the lidar frame to the camera frame.
    pub fn lidar_to_camera_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        transform_batch(&self.lidar_to_camera, points)
    }

    /// Convert a batch of points from the camera frame to the lidar frame.
    pub fn camera_to_lidar_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        transform_batch(&self.camera_to_lidar, points)
    }

    /// Convert a camera-frame box to the lidar frame.
    ///
    /// The camera yaw `ry` becomes `rz = -ry - pi/2`, normalized.
    pub fn camera_to_lidar_box(&self, b: &Box3D) -> Box3D {
        let [x, y, z] = self.camera_to_lidar_point(&[b.x, b.y, b.z]);
        Box3D {
            x,
            y,
            z,
            r: normalize_yaw(-b.r - std::f64::consts::FRAC_PI_2),
            ..*b
        }
    }

    /// Convert a lidar-frame box to the camera frame.
    ///
    /// The lidar yaw `rz` becomes `ry = -rz - pi/2`, normalized.
    pub fn lidar_to_camera_box(&self, b: &Box3D) -> Box3D {
        let [x, y, z] = self.lidar_to_camera_point(&[b.x, b.y, b.z]);
        Box3D {
            x,
            y,
            z,
            r: normalize_yaw(-b.r - std::f64::consts::FRAC_PI_2),
            ..*b
        }
    }

    /// Project lidar points into the image plane.
    ///
    /// Points at or behind the camera plane project to NaN.
    pub fn project_lidar_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 2]> {
        let p = &self.matrices.projection;
        self.lidar_to_camera_points(points)
            .iter()
            .map(|c| {
                let u = p[0][0] * c[0] + p[0][1] * c[1] + p[0][2] * c[2] + p[0][3];
                let v = p[1][0] * c[0] + p[1][1] * c[1] + p[1][2] * c[2] + p[1][3];
                let w = p[2][0] * c[0] + p[2][1] * c[1] + p[2][2] * c[2] + p[2][3];
                if w <= 0.0 {
                    [f64::NAN, f64::NAN]
                } else {
                    [u / w, v / w]
                }
            })
            .collect()
    }
}

fn transform_batch(transform: &[[f64; 4]; 3], points: &[[f64; 3]]) -> Vec<[f64; 3]> {
    let (rotation, translation) = linalg::split_transform(transform);
    linalg::transform_points_to_vec(points, &rotation, &translation)
}
