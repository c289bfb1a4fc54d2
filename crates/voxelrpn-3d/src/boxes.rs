//! Box representations used by the detector and the conversions between them.
//!
//! Corner layout (object-local, before rotation; `l` runs along local x, `w`
//! along local y, `h` along z):
//!
//! ```text
//! index   x      y      z
//!   0   +l/2   +w/2   +h/2   front-left-top
//!   1   -l/2   +w/2   +h/2   back-left-top
//!   2   -l/2   -w/2   +h/2   back-right-top
//!   3   +l/2   -w/2   +h/2   front-right-top
//!   4..7  as 0..3 with -h/2 (bottom)
//! ```
//!
//! Edges `0-1, 3-2, 4-5, 7-6` measure the length and edges `0-3, 1-2, 4-7, 5-6`
//! measure the width. Corner arrays are always expressed in the lidar frame.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::linalg;
use crate::transforms::{self, normalize_yaw};

/// Coordinate frame a box collection is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frame {
    /// Lidar frame: x forward, y left, z up; yaw about z.
    Lidar,
    /// Rectified camera frame: x right, y down, z forward; yaw about y.
    Camera,
}

/// Eight cuboid corners in the lidar frame.
pub type Corners3D = [[f64; 3]; 8];

/// Four birdview corners (x, y) in the lidar frame.
pub type Corners2D = [[f64; 2]; 4];

/// A 3D box in center form `(x, y, z, h, w, l, r)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Box3D {
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    /// Center z.
    pub z: f64,
    /// Height.
    pub h: f64,
    /// Width.
    pub w: f64,
    /// Length.
    pub l: f64,
    /// Yaw about the frame's up axis.
    pub r: f64,
}

impl Box3D {
    /// Create a box from its seven parameters.
    pub fn new(x: f64, y: f64, z: f64, h: f64, w: f64, l: f64, r: f64) -> Self {
        Self {
            x,
            y,
            z,
            h,
            w,
            l,
            r,
        }
    }

    /// Create a box from an `[x, y, z, h, w, l, r]` array.
    pub fn from_array(a: &[f64; 7]) -> Self {
        Self::new(a[0], a[1], a[2], a[3], a[4], a[5], a[6])
    }

    /// The box as an `[x, y, z, h, w, l, r]` array.
    pub fn to_array(&self) -> [f64; 7] {
        [self.x, self.y, self.z, self.h, self.w, self.l, self.r]
    }

    /// Birdview projection `(x, y, w, l, r)`.
    pub fn to_bev(&self) -> BevBox {
        BevBox {
            x: self.x,
            y: self.y,
            w: self.w,
            l: self.l,
            r: self.r,
        }
    }

    /// Corners of a lidar-frame box.
    pub fn lidar_corners(&self) -> Corners3D {
        let rotation = transforms::yaw_to_rotation(self.r);
        corners_from_rotation(&[self.x, self.y, self.z], self.h, self.w, self.l, &rotation)
    }
}

/// A box collection tagged with the frame it lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boxes3D {
    /// Frame of every box in `boxes`.
    pub frame: Frame,
    /// The boxes.
    pub boxes: Vec<Box3D>,
}

impl Boxes3D {
    /// Create a tagged collection.
    pub fn new(frame: Frame, boxes: Vec<Box3D>) -> Self {
        Self { frame, boxes }
    }

    /// Number of boxes.
    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Check whether the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Express the collection in `frame`.
    pub fn to_frame(&self, frame: Frame, calib: &Calibration) -> Boxes3D {
        let boxes = match (self.frame, frame) {
            (Frame::Lidar, Frame::Camera) => self
                .boxes
                .iter()
                .map(|b| calib.lidar_to_camera_box(b))
                .collect(),
            (Frame::Camera, Frame::Lidar) => self
                .boxes
                .iter()
                .map(|b| calib.camera_to_lidar_box(b))
                .collect(),
            _ => self.boxes.clone(),
        };
        Boxes3D { frame, boxes }
    }
}

/// A birdview box `(x, y, w, l, r)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BevBox {
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    /// Width.
    pub w: f64,
    /// Length.
    pub l: f64,
    /// Yaw.
    pub r: f64,
}

impl BevBox {
    /// Birdview corners of a lidar-frame box, in the order of corners `0..4`.
    pub fn lidar_corners(&self) -> Corners2D {
        let (s, c) = self.r.sin_cos();
        let (hl, hw) = (self.l / 2.0, self.w / 2.0);
        [[hl, hw], [-hl, hw], [-hl, -hw], [hl, -hw]].map(|[u, v]| {
            [self.x + c * u - s * v, self.y + s * u + c * v]
        })
    }

    /// Axis-aligned bounds of a lidar-frame box.
    pub fn lidar_standup(&self) -> StandupBox {
        corner_to_standup_2d(&[self.lidar_corners()])[0]
    }
}

/// An axis-aligned birdview rectangle `(x1, y1, x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StandupBox {
    /// Minimum x.
    pub x1: f64,
    /// Minimum y.
    pub y1: f64,
    /// Maximum x.
    pub x2: f64,
    /// Maximum y.
    pub y2: f64,
}

impl StandupBox {
    /// Area of the rectangle, zero when degenerate.
    #[inline]
    pub fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// A box whose orientation is a full quaternion `(q0, q1, q2, q3)`, scalar first.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientedBox {
    /// Center `(x, y, z)`.
    pub center: [f64; 3],
    /// Height.
    pub h: f64,
    /// Width.
    pub w: f64,
    /// Length.
    pub l: f64,
    /// Orientation quaternion.
    pub orientation: [f64; 4],
}

impl OrientedBox {
    /// Corners of the box rotated by its quaternion.
    pub fn corners(&self) -> Corners3D {
        let rotation = transforms::quaternion_to_rotation(&self.orientation);
        corners_from_rotation(&self.center, self.h, self.w, self.l, &rotation)
    }

    /// Express the box in yaw form after applying a 3x4 rigid transform.
    ///
    /// The transform moves the center and pre-multiplies the orientation; the
    /// yaw comes from [`transforms::rotation_to_yaw`].
    pub fn to_yaw_box(&self, transform: &[[f64; 4]; 3]) -> Box3D {
        let [x, y, z] = linalg::transform_point(transform, &self.center);
        let (rotation, _) = linalg::split_transform(transform);
        let orientation = linalg::mat33_mul(
            &rotation,
            &transforms::quaternion_to_rotation(&self.orientation),
        );
        Box3D::new(
            x,
            y,
            z,
            self.h,
            self.w,
            self.l,
            transforms::rotation_to_yaw(&orientation),
        )
    }
}

/// How redundant edge measurements are reduced when recovering a center box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CornerPolicy {
    /// Mean over the redundant measurements.
    #[default]
    Average,
    /// Maximum over the redundant measurements, for noisy corners.
    Max,
}

fn corners_from_rotation(
    center: &[f64; 3],
    h: f64,
    w: f64,
    l: f64,
    rotation: &[[f64; 3]; 3],
) -> Corners3D {
    let (hl, hw, hh) = (l / 2.0, w / 2.0, h / 2.0);
    let local = [
        [hl, hw, hh],
        [-hl, hw, hh],
        [-hl, -hw, hh],
        [hl, -hw, hh],
        [hl, hw, -hh],
        [-hl, hw, -hh],
        [-hl, -hw, -hh],
        [hl, -hw, -hh],
    ];
    let mut corners = [[0.0; 3]; 8];
    for (corner, p) in corners.iter_mut().zip(local.iter()) {
        let q = linalg::mat33_mul_vec(rotation, p);
        *corner = [q[0] + center[0], q[1] + center[1], q[2] + center[2]];
    }
    corners
}

/// Build the eight lidar-frame corners of each box.
///
/// Camera-frame boxes are converted to the lidar frame first.
pub fn center_to_corner_3d(boxes: &Boxes3D, calib: &Calibration) -> Vec<Corners3D> {
    boxes
        .to_frame(Frame::Lidar, calib)
        .boxes
        .iter()
        .map(Box3D::lidar_corners)
        .collect()
}

fn planar_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn reduce(values: [f64; 4], policy: CornerPolicy) -> f64 {
    match policy {
        CornerPolicy::Average => values.iter().sum::<f64>() / 4.0,
        CornerPolicy::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn corners_to_lidar_box(c: &Corners3D, policy: CornerPolicy) -> Box3D {
    let h = reduce(
        [
            (c[0][2] - c[4][2]).abs(),
            (c[1][2] - c[5][2]).abs(),
            (c[2][2] - c[6][2]).abs(),
            (c[3][2] - c[7][2]).abs(),
        ],
        policy,
    );
    let mut w = reduce(
        [
            planar_distance(&c[0], &c[3]),
            planar_distance(&c[1], &c[2]),
            planar_distance(&c[4], &c[7]),
            planar_distance(&c[5], &c[6]),
        ],
        policy,
    );
    let mut l = reduce(
        [
            planar_distance(&c[0], &c[1]),
            planar_distance(&c[3], &c[2]),
            planar_distance(&c[4], &c[5]),
            planar_distance(&c[7], &c[6]),
        ],
        policy,
    );

    let x = c.iter().map(|p| p[0]).sum::<f64>() / 8.0;
    let y = c.iter().map(|p| p[1]).sum::<f64>() / 8.0;
    let z = c.iter().map(|p| p[2]).sum::<f64>() / 8.0;

    // length edges point along the heading, width edges along heading + pi/2
    let along_l = |front: usize, back: usize| {
        (c[front][1] - c[back][1]).atan2(c[front][0] - c[back][0])
    };
    let along_w = |left: usize, right: usize| {
        (-(c[left][0] - c[right][0])).atan2(c[left][1] - c[right][1])
    };
    let mut r = (along_l(0, 1)
        + along_l(3, 2)
        + along_l(4, 5)
        + along_l(7, 6)
        + along_w(0, 3)
        + along_w(1, 2)
        + along_w(4, 7)
        + along_w(5, 6))
        / 8.0;

    if w > l {
        std::mem::swap(&mut w, &mut l);
        r = normalize_yaw(r + FRAC_PI_2);
    }

    Box3D::new(x, y, z, h, w, l, r)
}

/// Recover center-form boxes from lidar-frame corners.
///
/// Height, width and length reduce their four redundant edge measurements
/// according to `policy`; the yaw is the mean of eight `atan2` estimates (four
/// edges times two directions). When the width exceeds the length the two are
/// swapped and the yaw turns by `pi/2`. The result is expressed in `frame`.
pub fn corner_to_center_3d(
    corners: &[Corners3D],
    frame: Frame,
    policy: CornerPolicy,
    calib: &Calibration,
) -> Boxes3D {
    let lidar = Boxes3D::new(
        Frame::Lidar,
        corners
            .iter()
            .map(|c| corners_to_lidar_box(c, policy))
            .collect(),
    );
    lidar.to_frame(frame, calib)
}

/// Birdview corners of each box (height dropped).
pub fn center_to_corner_2d(boxes: &[BevBox], frame: Frame, calib: &Calibration) -> Vec<Corners2D> {
    let boxes3d = Boxes3D::new(
        frame,
        boxes
            .iter()
            .map(|b| Box3D::new(b.x, b.y, 0.0, 0.0, b.w, b.l, b.r))
            .collect(),
    );
    center_to_corner_3d(&boxes3d, calib)
        .iter()
        .map(|c| [[c[0][0], c[0][1]], [c[1][0], c[1][1]], [c[2][0], c[2][1]], [c[3][0], c[3][1]]])
        .collect()
}

/// Recover birdview boxes from their four corners.
pub fn corner_to_center_2d(
    corners: &[Corners2D],
    frame: Frame,
    policy: CornerPolicy,
    calib: &Calibration,
) -> Vec<BevBox> {
    let corners3d: Vec<Corners3D> = corners
        .iter()
        .map(|c| {
            let mut c3 = [[0.0; 3]; 8];
            for (i, p) in c.iter().enumerate() {
                c3[i] = [p[0], p[1], 0.0];
                c3[i + 4] = [p[0], p[1], 0.0];
            }
            c3
        })
        .collect();
    corner_to_center_3d(&corners3d, frame, policy, calib)
        .boxes
        .iter()
        .map(Box3D::to_bev)
        .collect()
}

/// Axis-aligned bounding rectangle of each set of birdview corners.
pub fn corner_to_standup_2d(corners: &[Corners2D]) -> Vec<StandupBox> {
    corners
        .iter()
        .map(|c| {
            let mut s = StandupBox {
                x1: f64::INFINITY,
                y1: f64::INFINITY,
                x2: f64::NEG_INFINITY,
                y2: f64::NEG_INFINITY,
            };
            for p in c {
                s.x1 = s.x1.min(p[0]);
                s.y1 = s.y1.min(p[1]);
                s.x2 = s.x2.max(p[0]);
                s.y2 = s.y2.max(p[1]);
            }
            s
        })
        .collect()
}

/// Closed-form standup rectangles for a flattened anchor list.
///
/// Anchors alternate yaw per grid cell: even indices are taken as yaw `0`
/// (length along x) and odd indices as yaw `pi/2` (length along y). This must
/// match the anchor generator's `(rows, cols, 2)` layout; the stored yaw is
/// not read.
pub fn anchor_to_standup_2d(anchors: &[Box3D]) -> Vec<StandupBox> {
    anchors
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let (half_x, half_y) = if i % 2 == 0 {
                (a.l / 2.0, a.w / 2.0)
            } else {
                (a.w / 2.0, a.l / 2.0)
            };
            StandupBox {
                x1: a.x - half_x,
                y1: a.y - half_y,
                x2: a.x + half_x,
                y2: a.y + half_y,
            }
        })
        .collect()
}

/// Rigidly move boxes through their corners.
///
/// The lidar-frame corners go through [`transforms::point_transform`] with
/// `translation` and `rz = yaw`, so a box turns by `-yaw` about the lidar z
/// axis. They are then converted back to center form in the boxes' own frame.
pub fn box_transform(
    boxes: &Boxes3D,
    translation: &[f64; 3],
    yaw: f64,
    policy: CornerPolicy,
    calib: &Calibration,
) -> Boxes3D {
    let moved: Vec<Corners3D> = center_to_corner_3d(boxes, calib)
        .iter()
        .map(|c| {
            let points = transforms::point_transform(c, translation, &[0.0, 0.0, yaw]);
            let mut out = [[0.0; 3]; 8];
            out.copy_from_slice(&points);
            out
        })
        .collect();
    corner_to_center_3d(&moved, boxes.frame, policy, calib)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationMatrices;
    use crate::GeometryError;
    use approx::assert_relative_eq;

    fn calib() -> Result<Calibration, GeometryError> {
        Calibration::new(CalibrationMatrices::default())
    }

    fn assert_box_eq(a: &Box3D, b: &Box3D, eps: f64) {
        for (u, v) in a.to_array().iter().zip(b.to_array().iter()) {
            assert_relative_eq!(u, v, epsilon = eps);
        }
    }

    #[test]
    fn test_corner_layout() {
        let b = Box3D::new(0.0, 0.0, 0.0, 2.0, 1.0, 4.0, 0.0);
        let c = b.lidar_corners();
        assert_eq!(c[0], [2.0, 0.5, 1.0]);
        assert_eq!(c[2], [-2.0, -0.5, 1.0]);
        assert_eq!(c[7], [2.0, -0.5, -1.0]);
    }

    #[test]
    fn test_center_corner_roundtrip_lidar() -> Result<(), GeometryError> {
        let calib = calib()?;
        let boxes = Boxes3D::new(
            Frame::Lidar,
            vec![
                Box3D::new(10.0, -2.0, -0.8, 1.5, 1.6, 3.9, 0.3),
                Box3D::new(-4.0, 7.5, 0.2, 1.8, 0.6, 0.8, -1.2),
                Box3D::new(30.0, 0.0, -1.0, 3.2, 2.5, 10.0, 2.8),
                Box3D::new(5.0, 5.0, 0.0, 1.0, 0.9, 1.0, -3.0),
            ],
        );
        for policy in [CornerPolicy::Average, CornerPolicy::Max] {
            let corners = center_to_corner_3d(&boxes, &calib);
            let back = corner_to_center_3d(&corners, Frame::Lidar, policy, &calib);
            assert_eq!(back.frame, Frame::Lidar);
            for (a, b) in back.boxes.iter().zip(boxes.boxes.iter()) {
                assert_box_eq(a, b, 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn test_center_corner_roundtrip_camera() -> Result<(), GeometryError> {
        let calib = calib()?;
        let boxes = Boxes3D::new(
            Frame::Camera,
            vec![Box3D::new(1.0, 1.5, 20.0, 1.5, 1.6, 3.9, 0.7)],
        );
        let corners = center_to_corner_3d(&boxes, &calib);
        let back = corner_to_center_3d(&corners, Frame::Camera, CornerPolicy::Average, &calib);
        assert_eq!(back.frame, Frame::Camera);
        assert_box_eq(&back.boxes[0], &boxes.boxes[0], 1e-7);
        Ok(())
    }

    #[test]
    fn test_corner_to_center_swaps_wide_boxes() -> Result<(), GeometryError> {
        let calib = calib()?;
        let wide = Box3D::new(0.0, 0.0, 0.0, 1.0, 3.0, 2.0, 0.3);
        let corners = vec![wide.lidar_corners()];
        let back = corner_to_center_3d(&corners, Frame::Lidar, CornerPolicy::Average, &calib);
        let b = back.boxes[0];
        assert_relative_eq!(b.w, 2.0, epsilon = 1e-9);
        assert_relative_eq!(b.l, 3.0, epsilon = 1e-9);
        assert_relative_eq!(b.r, normalize_yaw(0.3 + FRAC_PI_2), epsilon = 1e-9);

        // the swapped box describes the same cuboid
        let c2 = b.lidar_corners();
        let s1 = corner_to_standup_2d(&[[
            [corners[0][0][0], corners[0][0][1]],
            [corners[0][1][0], corners[0][1][1]],
            [corners[0][2][0], corners[0][2][1]],
            [corners[0][3][0], corners[0][3][1]],
        ]]);
        let s2 = corner_to_standup_2d(&[[
            [c2[0][0], c2[0][1]],
            [c2[1][0], c2[1][1]],
            [c2[2][0], c2[2][1]],
            [c2[3][0], c2[3][1]],
        ]]);
        assert_relative_eq!(s1[0].x1, s2[0].x1, epsilon = 1e-9);
        assert_relative_eq!(s1[0].y2, s2[0].y2, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_max_policy_takes_longest_edge() -> Result<(), GeometryError> {
        let calib = calib()?;
        let mut corners = Box3D::new(0.0, 0.0, 0.0, 1.0, 1.0, 4.0, 0.0).lidar_corners();
        // stretch the bottom front edge forward
        corners[4][0] += 0.4;
        corners[7][0] += 0.4;
        let avg = corner_to_center_3d(&[corners], Frame::Lidar, CornerPolicy::Average, &calib);
        let max = corner_to_center_3d(&[corners], Frame::Lidar, CornerPolicy::Max, &calib);
        assert_relative_eq!(avg.boxes[0].l, 4.2, epsilon = 1e-9);
        assert_relative_eq!(max.boxes[0].l, 4.4, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_bev_roundtrip_and_standup() -> Result<(), GeometryError> {
        let calib = calib()?;
        let boxes = vec![BevBox {
            x: 5.0,
            y: 1.0,
            w: 2.0,
            l: 4.0,
            r: FRAC_PI_2 - 0.5,
        }];
        let corners = center_to_corner_2d(&boxes, Frame::Lidar, &calib);
        let back = corner_to_center_2d(&corners, Frame::Lidar, CornerPolicy::Average, &calib);
        assert_relative_eq!(back[0].x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(back[0].l, 4.0, epsilon = 1e-9);
        assert_relative_eq!(back[0].r, FRAC_PI_2 - 0.5, epsilon = 1e-9);

        for (p, q) in boxes[0].lidar_corners().iter().zip(corners[0].iter()) {
            assert_relative_eq!(p[0], q[0], epsilon = 1e-12);
            assert_relative_eq!(p[1], q[1], epsilon = 1e-12);
        }

        let axis_aligned = vec![BevBox {
            x: 0.0,
            y: 0.0,
            w: 2.0,
            l: 4.0,
            r: 0.0,
        }];
        let standup = corner_to_standup_2d(&center_to_corner_2d(&axis_aligned, Frame::Lidar, &calib));
        assert_relative_eq!(standup[0].x1, -2.0);
        assert_relative_eq!(standup[0].y1, -1.0);
        assert_relative_eq!(standup[0].x2, 2.0);
        assert_relative_eq!(standup[0].y2, 1.0);
        Ok(())
    }

    #[test]
    fn test_anchor_standup_parity() {
        let anchor = Box3D::new(1.0, 2.0, -1.0, 1.56, 1.6, 3.9, 0.0);
        let standup = anchor_to_standup_2d(&[anchor, Box3D { r: FRAC_PI_2, ..anchor }]);
        assert_relative_eq!(standup[0].x2 - standup[0].x1, 3.9, epsilon = 1e-12);
        assert_relative_eq!(standup[0].y2 - standup[0].y1, 1.6, epsilon = 1e-12);
        assert_relative_eq!(standup[1].x2 - standup[1].x1, 1.6, epsilon = 1e-12);
        assert_relative_eq!(standup[1].y2 - standup[1].y1, 3.9, epsilon = 1e-12);
    }

    #[test]
    fn test_oriented_box_yaw() {
        let yaw: f64 = 0.6;
        let oriented = OrientedBox {
            center: [1.0, 2.0, 3.0],
            h: 1.5,
            w: 1.6,
            l: 3.9,
            orientation: [(yaw / 2.0).cos(), 0.0, 0.0, (yaw / 2.0).sin()],
        };
        let shift = [[1.0, 0.0, 0.0, 0.5], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, -1.0]];
        let b = oriented.to_yaw_box(&shift);
        assert_relative_eq!(b.x, 1.5, epsilon = 1e-12);
        assert_relative_eq!(b.z, 2.0, epsilon = 1e-12);
        assert_relative_eq!(b.r, yaw, epsilon = 1e-9);

        let from_quat = oriented.corners();
        let from_yaw = Box3D::new(1.0, 2.0, 3.0, 1.5, 1.6, 3.9, yaw).lidar_corners();
        for (p, q) in from_quat.iter().zip(from_yaw.iter()) {
            for i in 0..3 {
                assert_relative_eq!(p[i], q[i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_box_transform_rotates_center_and_yaw() -> Result<(), GeometryError> {
        let calib = calib()?;
        let boxes = Boxes3D::new(Frame::Lidar, vec![Box3D::new(10.0, 0.0, -1.0, 1.5, 1.6, 3.9, 0.0)]);
        let moved = box_transform(&boxes, &[0.0, 0.0, 0.0], 0.5, CornerPolicy::Average, &calib);
        let b = moved.boxes[0];
        assert_relative_eq!(b.x, 10.0 * 0.5f64.cos(), epsilon = 1e-9);
        assert_relative_eq!(b.y, -10.0 * 0.5f64.sin(), epsilon = 1e-9);
        assert_relative_eq!(b.r, -0.5, epsilon = 1e-9);
        Ok(())
    }
}
