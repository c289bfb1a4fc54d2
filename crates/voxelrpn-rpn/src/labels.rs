use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use voxelrpn_3d::boxes::{center_to_corner_3d, Box3D, Boxes3D, Frame, OrientedBox};
use voxelrpn_3d::calibration::Calibration;

use crate::RpnError;

/// Fixed object class enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectClass {
    /// Bus.
    Bus,
    /// Passenger car.
    Car,
    /// Cyclist.
    Cyclist,
    /// Motorcyclist.
    Motorcyclist,
    /// Person.
    Person,
    /// Trailer.
    Trailer,
    /// Truck.
    Truck,
}

impl ObjectClass {
    /// Every class, ordered by id.
    pub const ALL: [ObjectClass; 7] = [
        ObjectClass::Bus,
        ObjectClass::Car,
        ObjectClass::Cyclist,
        ObjectClass::Motorcyclist,
        ObjectClass::Person,
        ObjectClass::Trailer,
        ObjectClass::Truck,
    ];

    /// Look a class up by its exact name.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::UnknownClass`] for names outside the enumeration.
    pub fn from_name(name: &str) -> Result<Self, RpnError> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .ok_or_else(|| RpnError::UnknownClass(name.to_string()))
    }

    /// Class name.
    pub fn name(&self) -> &'static str {
        match self {
            ObjectClass::Bus => "Bus",
            ObjectClass::Car => "Car",
            ObjectClass::Cyclist => "Cyclist",
            ObjectClass::Motorcyclist => "Motorcyclist",
            ObjectClass::Person => "Person",
            ObjectClass::Trailer => "Trailer",
            ObjectClass::Truck => "Truck",
        }
    }

    /// Integer id.
    pub fn id(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for ObjectClass {
    type Err = RpnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which ground-truth class names count for a target class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassFilter {
    /// `Car` and `Van`.
    Car,
    /// `Pedestrian` and `Person`.
    Pedestrian,
    /// `Cyclist`.
    Cyclist,
    /// Every class.
    All,
}

impl ClassFilter {
    /// Filter for a target class name; unrecognized names match everything.
    pub fn from_target(target: &str) -> Self {
        match target {
            "Car" => ClassFilter::Car,
            "Pedestrian" => ClassFilter::Pedestrian,
            "Cyclist" => ClassFilter::Cyclist,
            _ => ClassFilter::All,
        }
    }

    /// Accepted names, empty for [`ClassFilter::All`].
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ClassFilter::Car => &["Car", "Van"],
            ClassFilter::Pedestrian => &["Pedestrian", "Person"],
            ClassFilter::Cyclist => &["Cyclist"],
            ClassFilter::All => &[],
        }
    }

    /// Check whether `name` passes the filter.
    pub fn accepts(&self, name: &str) -> bool {
        let aliases = self.aliases();
        aliases.is_empty() || aliases.contains(&name)
    }

    /// Like [`ClassFilter::accepts`], but names that [`ClassFilter::All`] would
    /// let through must be known.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::UnknownClass`] under [`ClassFilter::All`] for a name
    /// outside both [`ObjectClass`] and the alias sets.
    pub fn select(&self, name: &str) -> Result<bool, RpnError> {
        match self {
            ClassFilter::All if !is_known_class_name(name) => {
                Err(RpnError::UnknownClass(name.to_string()))
            }
            _ => Ok(self.accepts(name)),
        }
    }
}

/// Whether `name` is an [`ObjectClass`] or one of the filter aliases.
pub fn is_known_class_name(name: &str) -> bool {
    ObjectClass::from_name(name).is_ok()
        || [ClassFilter::Car, ClassFilter::Pedestrian, ClassFilter::Cyclist]
            .iter()
            .any(|f| f.aliases().contains(&name))
}

/// A ground-truth object as delivered by the label loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLabel {
    /// Class name as written in the label source.
    pub class_name: String,
    /// Box center in the label reference frame.
    pub center: [f64; 3],
    /// Height.
    pub h: f64,
    /// Width.
    pub w: f64,
    /// Length.
    pub l: f64,
    /// Orientation quaternion, scalar first.
    pub orientation: [f64; 4],
}

impl ObjectLabel {
    /// The label's class in the fixed enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::UnknownClass`] for names outside the enumeration.
    pub fn class(&self) -> Result<ObjectClass, RpnError> {
        ObjectClass::from_name(&self.class_name)
    }

    /// The label as a quaternion-oriented box.
    pub fn oriented_box(&self) -> OrientedBox {
        OrientedBox {
            center: self.center,
            h: self.h,
            w: self.w,
            l: self.l,
            orientation: self.orientation,
        }
    }

    /// Yaw-form lidar box after mapping the label frame through `ref_to_lidar`.
    pub fn to_yaw_box(&self, ref_to_lidar: &[[f64; 4]; 3]) -> Box3D {
        self.oriented_box().to_yaw_box(ref_to_lidar)
    }
}

/// The labels accepted by `filter`, in input order.
///
/// # Errors
///
/// Returns [`RpnError::UnknownClass`] if an unknown name reaches
/// [`ClassFilter::All`].
pub fn select_labels<'a>(
    labels: &'a [ObjectLabel],
    filter: ClassFilter,
) -> Result<Vec<&'a ObjectLabel>, RpnError> {
    let mut selected = Vec::with_capacity(labels.len());
    for label in labels {
        if filter.select(&label.class_name)? {
            selected.push(label);
        }
    }
    Ok(selected)
}

/// Keep the labels accepted by `filter` and convert them to yaw form.
///
/// # Errors
///
/// Returns [`RpnError::UnknownClass`] if an unknown name reaches
/// [`ClassFilter::All`].
pub fn labels_to_gt_boxes(
    labels: &[ObjectLabel],
    filter: ClassFilter,
    ref_to_lidar: &[[f64; 4]; 3],
) -> Result<Vec<Box3D>, RpnError> {
    Ok(select_labels(labels, filter)?
        .iter()
        .map(|label| label.to_yaw_box(ref_to_lidar))
        .collect())
}

/// Integer image rectangle `(x1, y1, x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageBox {
    /// Minimum column.
    pub x1: i64,
    /// Minimum row.
    pub y1: i64,
    /// Maximum column.
    pub x2: i64,
    /// Maximum row.
    pub y2: i64,
}

/// Project the 8 corners of each lidar-frame box into the image.
pub fn lidar_box_to_projected_corners(boxes: &[Box3D], calib: &Calibration) -> Vec<[[f64; 2]; 8]> {
    let lidar = Boxes3D::new(Frame::Lidar, boxes.to_vec());
    center_to_corner_3d(&lidar, calib)
        .iter()
        .map(|corners| {
            let uv = calib.project_lidar_points(corners);
            let mut out = [[0.0; 2]; 8];
            out.copy_from_slice(&uv);
            out
        })
        .collect()
}

/// Image bounding rectangle of each lidar-frame box.
///
/// Coordinates are truncated toward zero.
pub fn lidar_box_to_image_box(boxes: &[Box3D], calib: &Calibration) -> Vec<ImageBox> {
    lidar_box_to_projected_corners(boxes, calib)
        .iter()
        .map(|uv| {
            let (mut x1, mut y1) = (f64::INFINITY, f64::INFINITY);
            let (mut x2, mut y2) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
            for [u, v] in uv {
                x1 = x1.min(*u);
                y1 = y1.min(*v);
                x2 = x2.max(*u);
                y2 = y2.max(*v);
            }
            ImageBox {
                x1: x1 as i64,
                y1: y1 as i64,
                x2: x2 as i64,
                y2: y2 as i64,
            }
        })
        .collect()
}

/// Serialize detections as evaluation label lines.
///
/// Each line reads `<class> 0 0 0 x1 y1 x2 y2 h w l x y z r [score]` with the
/// 3D box in the camera frame and every number printed with 4 decimals.
///
/// # Errors
///
/// Returns [`RpnError::ShapeMismatch`] if `classes` or `scores` do not match
/// the number of boxes.
pub fn boxes_to_label_lines(
    boxes: &Boxes3D,
    classes: &[String],
    scores: Option<&[f64]>,
    calib: &Calibration,
) -> Result<Vec<String>, RpnError> {
    if classes.len() != boxes.len() {
        return Err(RpnError::ShapeMismatch {
            expected: boxes.len(),
            actual: classes.len(),
        });
    }
    if let Some(scores) = scores {
        if scores.len() != boxes.len() {
            return Err(RpnError::ShapeMismatch {
                expected: boxes.len(),
                actual: scores.len(),
            });
        }
    }

    let camera = boxes.to_frame(Frame::Camera, calib);
    let lidar = boxes.to_frame(Frame::Lidar, calib);
    let image_boxes = lidar_box_to_image_box(&lidar.boxes, calib);

    let lines = camera
        .boxes
        .iter()
        .zip(image_boxes.iter())
        .zip(classes.iter())
        .enumerate()
        .map(|(i, ((b, b2d), class))| {
            let mut line = format!(
                "{class} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} {:.4}",
                0.0,
                0.0,
                0.0,
                b2d.x1 as f64,
                b2d.y1 as f64,
                b2d.x2 as f64,
                b2d.y2 as f64,
                b.h,
                b.w,
                b.l,
                b.x,
                b.y,
                b.z,
                b.r
            );
            if let Some(scores) = scores {
                line.push_str(&format!(" {:.4}", scores[i]));
            }
            line
        })
        .collect();
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use voxelrpn_3d::calibration::CalibrationMatrices;

    const IDENTITY: [[f64; 4]; 3] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];

    fn label(class_name: &str, x: f64, yaw: f64) -> ObjectLabel {
        ObjectLabel {
            class_name: class_name.to_string(),
            center: [x, 1.0, -0.9],
            h: 1.5,
            w: 1.6,
            l: 3.9,
            orientation: [(yaw / 2.0).cos(), 0.0, 0.0, (yaw / 2.0).sin()],
        }
    }

    #[test]
    fn test_class_enumeration() -> Result<(), RpnError> {
        assert_eq!(ObjectClass::from_name("Bus")?.id(), 0);
        assert_eq!(ObjectClass::from_name("Car")?.id(), 1);
        assert_eq!("Truck".parse::<ObjectClass>()?.id(), 6);
        assert_eq!(ObjectClass::Motorcyclist.to_string(), "Motorcyclist");
        for (i, class) in ObjectClass::ALL.iter().enumerate() {
            assert_eq!(class.id() as usize, i);
        }
        assert!(matches!(
            ObjectClass::from_name("Van"),
            Err(RpnError::UnknownClass(name)) if name == "Van"
        ));
        Ok(())
    }

    #[test]
    fn test_class_filter() {
        let car = ClassFilter::from_target("Car");
        assert!(car.accepts("Van"));
        assert!(!car.accepts("Pedestrian"));
        assert!(ClassFilter::from_target("Pedestrian").accepts("Person"));
        assert!(!ClassFilter::from_target("Cyclist").accepts("Motorcyclist"));
        let all = ClassFilter::from_target("Truck");
        assert_eq!(all, ClassFilter::All);
        assert!(all.accepts("Anything"));
    }

    #[test]
    fn test_labels_to_gt_boxes() -> Result<(), RpnError> {
        let labels = vec![label("Car", 10.0, 0.3), label("Person", 5.0, 0.0), label("Van", 20.0, -0.5)];
        let boxes = labels_to_gt_boxes(&labels, ClassFilter::Car, &IDENTITY)?;
        assert_eq!(boxes.len(), 2);
        assert_relative_eq!(boxes[0].x, 10.0);
        assert_relative_eq!(boxes[0].r, 0.3, epsilon = 1e-9);
        assert_relative_eq!(boxes[1].r, -0.5, epsilon = 1e-9);
        assert_eq!(boxes[1].l, 3.9);
        Ok(())
    }

    #[test]
    fn test_match_all_rejects_unknown_names() -> Result<(), RpnError> {
        let labels = vec![label("Truck", 10.0, 0.0), label("Van", 20.0, 0.0), label("Pedestrian", 5.0, 0.0)];
        let selected = select_labels(&labels, ClassFilter::All)?;
        let names: Vec<&str> = selected.iter().map(|l| l.class_name.as_str()).collect();
        assert_eq!(names, ["Truck", "Van", "Pedestrian"]);

        let misspelled = vec![label("Car", 10.0, 0.0), label("Carr", 20.0, 0.0)];
        assert!(matches!(
            labels_to_gt_boxes(&misspelled, ClassFilter::All, &IDENTITY),
            Err(RpnError::UnknownClass(name)) if name == "Carr"
        ));
        // an alias filter only passes its own names, so the typo is dropped
        assert_eq!(labels_to_gt_boxes(&misspelled, ClassFilter::Car, &IDENTITY)?.len(), 1);
        assert!(!is_known_class_name("DontCare"));
        Ok(())
    }

    #[test]
    fn test_image_box_in_front() -> Result<(), Box<dyn std::error::Error>> {
        let calib = Calibration::new(CalibrationMatrices::default())?;
        let b = Box3D::new(15.0, 0.0, -0.8, 1.5, 1.6, 3.9, 0.0);
        let image = lidar_box_to_image_box(&[b], &calib)[0];
        assert!(image.x1 < image.x2 && image.y1 < image.y2);
        // the box sits straight ahead, so it straddles the principal point column
        assert!(image.x1 < 608 && image.x2 > 608);
        Ok(())
    }

    #[test]
    fn test_label_lines() -> Result<(), Box<dyn std::error::Error>> {
        let calib = Calibration::new(CalibrationMatrices::default())?;
        let boxes = Boxes3D::new(Frame::Lidar, vec![Box3D::new(15.0, 0.0, -0.8, 1.5, 1.6, 3.9, 0.0)]);
        let classes = vec!["Car".to_string()];

        let lines = boxes_to_label_lines(&boxes, &classes, None, &calib)?;
        let fields: Vec<&str> = lines[0].split(' ').collect();
        assert_eq!(fields.len(), 15);
        assert_eq!(&fields[..4], &["Car", "0.0000", "0.0000", "0.0000"]);
        assert_eq!(&fields[8..11], &["1.5000", "1.6000", "3.9000"]);
        assert!(fields[4].ends_with(".0000"));

        let scored = boxes_to_label_lines(&boxes, &classes, Some(&[0.87654]), &calib)?;
        assert!(scored[0].ends_with(" 0.8765"));
        assert!(scored[0].starts_with(&lines[0]));

        // camera and lidar inputs describe the same detection
        let camera = boxes.to_frame(Frame::Camera, &calib);
        let from_camera = boxes_to_label_lines(&camera, &classes, None, &calib)?;
        let camera_fields: Vec<&str> = from_camera[0].split(' ').collect();
        assert_eq!(&camera_fields[8..], &fields[8..]);
        Ok(())
    }

    #[test]
    fn test_label_lines_shape_mismatch() -> Result<(), Box<dyn std::error::Error>> {
        let calib = Calibration::new(CalibrationMatrices::default())?;
        let boxes = Boxes3D::new(Frame::Lidar, vec![Box3D::default()]);
        let res = boxes_to_label_lines(&boxes, &[], None, &calib);
        assert!(matches!(res, Err(RpnError::ShapeMismatch { expected: 1, actual: 0 })));
        Ok(())
    }
}
