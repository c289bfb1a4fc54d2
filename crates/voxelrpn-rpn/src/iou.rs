use rayon::prelude::*;
use voxelrpn_3d::birdview::BirdviewConfig;
use voxelrpn_3d::boxes::{BevBox, Box3D, Boxes3D, Frame, StandupBox};
use voxelrpn_3d::calibration::Calibration;

use crate::raster::PolygonSpans;

/// Dense row-major `rows x cols` IoU matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct IouMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl IouMatrix {
    fn from_rows(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    /// Number of rows (first box list).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (second box list).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// IoU of row box `i` with column box `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// All IoUs of row box `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// The flat row-major values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// For every column, the first row holding its maximum, or `None` for an
    /// empty matrix.
    pub fn argmax_per_col(&self) -> Vec<Option<(usize, f64)>> {
        let mut best: Vec<Option<(usize, f64)>> = vec![None; self.cols];
        for i in 0..self.rows {
            for (j, &v) in self.row(i).iter().enumerate() {
                match best[j] {
                    Some((_, b)) if v <= b => {}
                    _ => best[j] = Some((i, v)),
                }
            }
        }
        best
    }
}

/// Axis-aligned rectangle IoU.
///
/// Returns `0` when the union is empty.
pub fn standup_iou(a: &StandupBox, b: &StandupBox) -> f64 {
    let iw = a.x2.min(b.x2) - a.x1.max(b.x1);
    let ih = a.y2.min(b.y2) - a.y1.max(b.y1);
    if iw <= 0.0 || ih <= 0.0 {
        return 0.0;
    }
    let inter = iw * ih;
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        return 0.0;
    }
    (inter / union).clamp(0.0, 1.0)
}

/// Pairwise standup IoU of two rectangle lists.
pub fn standup_iou_matrix(a: &[StandupBox], b: &[StandupBox]) -> IouMatrix {
    let mut data = Vec::with_capacity(a.len() * b.len());
    for sa in a {
        data.extend(b.iter().map(|sb| standup_iou(sa, sb)));
    }
    IouMatrix::from_rows(a.len(), b.len(), data)
}

/// Height overlap of `[cz1 - h1/2, cz1 + h1/2]` and `[cz2 - h2/2, cz2 + h2/2]`
/// as a ratio.
///
/// When one interval contains the other the ratio is inner over outer height;
/// for a partial overlap it is the overlap over the union length. Disjoint
/// intervals and zero heights give `0`.
pub fn z_intersect(cz1: f64, h1: f64, cz2: f64, h2: f64) -> f64 {
    let (b1z1, b1z2) = (cz1 - h1 / 2.0, cz1 + h1 / 2.0);
    let (b2z1, b2z2) = (cz2 - h2 / 2.0, cz2 + h2 / 2.0);
    let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };

    if b1z1 > b2z2 || b2z1 > b1z2 {
        0.0
    } else if b2z1 <= b1z1 && b1z1 <= b2z2 {
        if b1z2 <= b2z2 {
            ratio(h1, h2)
        } else {
            ratio(b2z2 - b1z1, b1z2 - b2z1)
        }
    } else if b1z1 < b2z1 && b2z1 < b1z2 {
        if b2z2 <= b1z2 {
            ratio(h2, h1)
        } else {
            ratio(b1z2 - b2z1, b2z2 - b1z1)
        }
    } else {
        0.0
    }
}

/// Length of the overlap of two height intervals, `0` when disjoint.
pub fn z_overlap(cz1: f64, h1: f64, cz2: f64, h2: f64) -> f64 {
    let lo = (cz1 - h1 / 2.0).max(cz2 - h2 / 2.0);
    let hi = (cz1 + h1 / 2.0).min(cz2 + h2 / 2.0);
    (hi - lo).max(0.0)
}

/// IoU by rasterizing birdview footprints.
///
/// Boxes are filled onto the [`BirdviewConfig`] grid after conversion to the
/// lidar frame, and overlap is counted in cells.
#[derive(Debug, Clone)]
pub struct ExactIou {
    birdview: BirdviewConfig,
    calibration: Calibration,
}

impl ExactIou {
    /// Create an exact IoU engine over `birdview`, converting camera-frame
    /// boxes with `calibration`.
    pub fn new(birdview: BirdviewConfig, calibration: Calibration) -> Self {
        Self {
            birdview,
            calibration,
        }
    }

    /// Birdview grid used for rasterization.
    pub fn birdview(&self) -> &BirdviewConfig {
        &self.birdview
    }

    /// Rasterize a lidar-frame birdview box.
    ///
    /// The footprint is clipped to the birdview range, so a box lying
    /// entirely outside it has no cells.
    pub fn rasterize(&self, b: &BevBox) -> PolygonSpans {
        let vertices: Vec<[i64; 2]> = b
            .lidar_corners()
            .iter()
            .map(|c| self.birdview.lidar_to_cell(c[0], c[1]))
            .collect();
        PolygonSpans::fill_convex(&vertices, self.birdview.width(), self.birdview.height())
    }

    fn to_lidar(&self, b: &Box3D, frame: Frame) -> Box3D {
        match frame {
            Frame::Lidar => *b,
            Frame::Camera => self.calibration.camera_to_lidar_box(b),
        }
    }

    /// Birdview IoU of two boxes expressed in `frame`.
    pub fn iou_2d(&self, a: &Box3D, b: &Box3D, frame: Frame) -> f64 {
        let fa = self.rasterize(&self.to_lidar(a, frame).to_bev());
        let fb = self.rasterize(&self.to_lidar(b, frame).to_bev());
        iou_2d_from_spans(&fa, &fb)
    }

    /// 3D IoU of two boxes expressed in `frame`.
    ///
    /// The shared footprint is scaled by the length of the height overlap
    /// from [`z_overlap`], not by the [`z_intersect`] ratio, so the numerator
    /// is an intersection volume and `iou_3d(a, a) == 1`.
    pub fn iou_3d(&self, a: &Box3D, b: &Box3D, frame: Frame) -> f64 {
        let (a, b) = (self.to_lidar(a, frame), self.to_lidar(b, frame));
        let fa = self.rasterize(&a.to_bev());
        let fb = self.rasterize(&b.to_bev());
        iou_3d_from_spans(&fa, &a, &fb, &b)
    }

    fn rasterize_all(&self, boxes: &Boxes3D) -> (Vec<Box3D>, Vec<PolygonSpans>) {
        let lidar: Vec<Box3D> = boxes
            .boxes
            .iter()
            .map(|b| self.to_lidar(b, boxes.frame))
            .collect();
        let footprints = lidar
            .par_iter()
            .map(|b| self.rasterize(&b.to_bev()))
            .collect();
        (lidar, footprints)
    }

    /// Pairwise birdview IoU. Each box is rasterized once; rows run in parallel.
    pub fn iou_2d_matrix(&self, a: &Boxes3D, b: &Boxes3D) -> IouMatrix {
        let (_, fa) = self.rasterize_all(a);
        let (_, fb) = self.rasterize_all(b);
        let data = fa
            .par_iter()
            .flat_map_iter(|sa| fb.iter().map(move |sb| iou_2d_from_spans(sa, sb)))
            .collect();
        IouMatrix::from_rows(fa.len(), fb.len(), data)
    }

    /// Pairwise 3D IoU. Each box is rasterized once; rows run in parallel.
    pub fn iou_3d_matrix(&self, a: &Boxes3D, b: &Boxes3D) -> IouMatrix {
        let (la, fa) = self.rasterize_all(a);
        let (lb, fb) = self.rasterize_all(b);
        let data = la
            .par_iter()
            .zip(fa.par_iter())
            .flat_map_iter(|(ba, sa)| {
                lb.iter()
                    .zip(fb.iter())
                    .map(move |(bb, sb)| iou_3d_from_spans(sa, ba, sb, bb))
            })
            .collect();
        IouMatrix::from_rows(fa.len(), fb.len(), data)
    }
}

fn iou_2d_from_spans(a: &PolygonSpans, b: &PolygonSpans) -> f64 {
    let share = a.intersection(b);
    let union = a.area() + b.area() - share;
    if union == 0 {
        return 0.0;
    }
    share as f64 / union as f64
}

fn iou_3d_from_spans(fa: &PolygonSpans, a: &Box3D, fb: &PolygonSpans, b: &Box3D) -> f64 {
    let share = fa.intersection(fb) as f64;
    let overlap = share * z_overlap(a.z, a.h, b.z, b.h);
    let union = fa.area() as f64 * a.h + fb.area() as f64 * b.h - overlap;
    if union <= 0.0 {
        return 0.0;
    }
    (overlap / union).clamp(0.0, 1.0)
}

/// Birdview IoU under one contract for both strategies.
///
/// `exact = false` uses the standup rectangles of the footprints, `exact =
/// true` rasterizes them with `engine`. Boxes are in the lidar frame.
pub fn iou(engine: &ExactIou, a: &Box3D, b: &Box3D, exact: bool) -> f64 {
    if exact {
        engine.iou_2d(a, b, Frame::Lidar)
    } else {
        standup_iou(&a.to_bev().lidar_standup(), &b.to_bev().lidar_standup())
    }
}

/// Pairwise version of [`iou`].
pub fn iou_matrix(engine: &ExactIou, a: &Boxes3D, b: &Boxes3D, exact: bool) -> IouMatrix {
    if exact {
        engine.iou_2d_matrix(a, b)
    } else {
        let standup = |boxes: &Boxes3D| -> Vec<StandupBox> {
            boxes
                .to_frame(Frame::Lidar, &engine.calibration)
                .boxes
                .iter()
                .map(|b| b.to_bev().lidar_standup())
                .collect()
        };
        standup_iou_matrix(&standup(a), &standup(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use voxelrpn_3d::calibration::CalibrationMatrices;

    fn engine() -> ExactIou {
        let calib = match Calibration::new(CalibrationMatrices::default()) {
            Ok(c) => c,
            Err(e) => panic!("{e}"),
        };
        ExactIou::new(BirdviewConfig::default(), calib)
    }

    fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> StandupBox {
        StandupBox { x1, y1, x2, y2 }
    }

    #[test]
    fn test_standup_iou() {
        assert_relative_eq!(standup_iou(&rect(0.0, 0.0, 2.0, 2.0), &rect(1.0, 0.0, 3.0, 2.0)), 1.0 / 3.0);
        assert_eq!(standup_iou(&rect(0.0, 0.0, 1.0, 1.0), &rect(2.0, 2.0, 3.0, 3.0)), 0.0);
        assert_eq!(standup_iou(&rect(0.0, 0.0, 1.0, 1.0), &rect(0.0, 0.0, 1.0, 1.0)), 1.0);
        // degenerate boxes have no union
        assert_eq!(standup_iou(&rect(1.0, 1.0, 1.0, 1.0), &rect(1.0, 1.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_argmax_per_col_prefers_first() {
        let m = IouMatrix::from_rows(3, 2, vec![0.5, 0.0, 0.7, 0.0, 0.7, 0.0]);
        assert_eq!(m.argmax_per_col(), vec![Some((1, 0.7)), Some((0, 0.0))]);
    }

    #[test]
    fn test_z_intersect_cases() {
        assert_eq!(z_intersect(0.0, 1.0, 5.0, 1.0), 0.0);
        // nested
        assert_relative_eq!(z_intersect(0.0, 1.0, 0.0, 2.0), 0.5);
        assert_relative_eq!(z_intersect(0.0, 2.0, 0.0, 1.0), 0.5);
        // partial overlaps, both directions
        assert_relative_eq!(z_intersect(0.5, 1.0, 0.0, 1.0), 0.5 / 1.5);
        assert_relative_eq!(z_intersect(0.0, 1.0, 0.5, 1.0), 0.5 / 1.5);
        assert_eq!(z_intersect(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_relative_eq!(z_overlap(0.0, 1.0, 0.5, 1.0), 0.5);
        assert_eq!(z_overlap(0.0, 1.0, 3.0, 1.0), 0.0);
    }

    #[test]
    fn test_exact_self_iou_is_one() {
        let engine = engine();
        let b = Box3D::new(20.0, 3.0, -1.0, 1.5, 1.6, 3.9, 0.4);
        assert_relative_eq!(engine.iou_2d(&b, &b, Frame::Lidar), 1.0);
        assert_relative_eq!(engine.iou_3d(&b, &b, Frame::Lidar), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exact_3d_uses_overlap_volume() {
        let engine = engine();
        let a = Box3D::new(20.0, 3.0, 0.0, 1.0, 1.6, 3.9, 0.0);
        let b = Box3D { z: 0.5, ..a };
        // half of each height is shared: 0.5 / (1 + 1 - 0.5)
        assert_relative_eq!(engine.iou_3d(&a, &b, Frame::Lidar), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(z_intersect(a.z, a.h, b.z, b.h), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exact_disjoint_and_out_of_range() {
        let engine = engine();
        let a = Box3D::new(20.0, 3.0, -1.0, 1.5, 1.6, 3.9, 0.4);
        let far = Box3D { x: 40.0, ..a };
        assert_eq!(engine.iou_2d(&a, &far, Frame::Lidar), 0.0);
        assert_eq!(engine.iou_3d(&a, &far, Frame::Lidar), 0.0);

        // stacked boxes overlap in birdview but not in height
        let above = Box3D { z: 5.0, ..a };
        assert_relative_eq!(engine.iou_2d(&a, &above, Frame::Lidar), 1.0);
        assert_eq!(engine.iou_3d(&a, &above, Frame::Lidar), 0.0);

        // behind the sensor and beyond y_min, each pair 10 m apart
        for (p, q) in [
            (Box3D { x: -10.0, y: 0.0, ..a }, Box3D { x: -20.0, y: 0.5, ..a }),
            (Box3D { y: -50.0, ..a }, Box3D { y: -60.0, ..a }),
            (Box3D { x: 80.0, ..a }, Box3D { x: 90.0, ..a }),
        ] {
            assert_eq!(engine.rasterize(&p.to_bev()).area(), 0);
            assert_eq!(engine.iou_2d(&p, &q, Frame::Lidar), 0.0);
            assert_eq!(engine.iou_3d(&p, &q, Frame::Lidar), 0.0);
            assert_eq!(engine.iou_2d(&p, &p, Frame::Lidar), 0.0);
            assert_eq!(iou(&engine, &p, &q, true), 0.0);
        }
    }

    #[test]
    fn test_exact_clips_box_on_range_edge() {
        let engine = engine();
        let inside = Box3D::new(20.0, 0.0, -1.0, 1.5, 2.0, 4.0, 0.0);
        // half of the footprint lies behind x_min
        let edge = Box3D { x: 0.0, ..inside };
        let full = engine.rasterize(&inside.to_bev()).area();
        let clipped = engine.rasterize(&edge.to_bev()).area();
        assert!(clipped > 0);
        assert!(clipped * 10 < full * 6, "{clipped} of {full}");
        assert_relative_eq!(engine.iou_2d(&edge, &edge, Frame::Lidar), 1.0);
    }

    #[test]
    fn test_exact_close_to_analytic() {
        let engine = engine();
        let a = Box3D::new(20.0, 0.0, -1.0, 1.5, 2.0, 4.0, 0.0);
        let b = Box3D { x: 22.0, ..a };
        // analytic IoU is 1/3; cells are 0.2 m
        let exact = engine.iou_2d(&a, &b, Frame::Lidar);
        assert!((exact - 1.0 / 3.0).abs() < 0.05, "{exact}");
        let fast = iou(&engine, &a, &b, false);
        assert_relative_eq!(fast, 1.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_matrices_agree_with_pairs() {
        let engine = engine();
        let a = Boxes3D::new(
            Frame::Lidar,
            vec![
                Box3D::new(20.0, 0.0, -1.0, 1.5, 1.6, 3.9, 0.0),
                Box3D::new(30.0, 5.0, -1.0, 1.5, 1.6, 3.9, 1.0),
            ],
        );
        let b = Boxes3D::new(
            Frame::Lidar,
            vec![
                Box3D::new(21.0, 0.5, -0.8, 1.4, 1.7, 4.2, 0.2),
                Box3D::new(30.0, 5.0, -1.0, 1.5, 1.6, 3.9, 1.0),
                Box3D::new(60.0, -30.0, -1.0, 1.5, 1.6, 3.9, 0.0),
            ],
        );
        let m2 = iou_matrix(&engine, &a, &b, true);
        let m3 = engine.iou_3d_matrix(&a, &b);
        let fast = iou_matrix(&engine, &a, &b, false);
        assert_eq!((m2.rows(), m2.cols()), (2, 3));
        for i in 0..2 {
            for j in 0..3 {
                let (p, q) = (&a.boxes[i], &b.boxes[j]);
                assert_eq!(m2.get(i, j), engine.iou_2d(p, q, Frame::Lidar));
                assert_eq!(m3.get(i, j), engine.iou_3d(p, q, Frame::Lidar));
                assert_eq!(fast.get(i, j), iou(&engine, p, q, false));
                for v in [m2.get(i, j), m3.get(i, j), fast.get(i, j)] {
                    assert!((0.0..=1.0).contains(&v));
                }
            }
        }
        assert_relative_eq!(m2.get(1, 1), 1.0);
    }

    #[test]
    fn test_camera_frame_matches_lidar() {
        let engine = engine();
        let a = Box3D::new(20.0, 0.0, -1.0, 1.5, 1.6, 3.9, 0.3);
        let b = Box3D::new(20.5, 0.4, -1.0, 1.5, 1.6, 3.9, 0.1);
        let calib = &engine.calibration;
        let (ca, cb) = (calib.lidar_to_camera_box(&a), calib.lidar_to_camera_box(&b));
        let lidar = engine.iou_3d(&a, &b, Frame::Lidar);
        let camera = engine.iou_3d(&ca, &cb, Frame::Camera);
        assert!((lidar - camera).abs() < 0.1, "{lidar} vs {camera}");
    }
}
