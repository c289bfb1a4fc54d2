use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use voxelrpn_3d::birdview::BirdviewConfig;
use voxelrpn_3d::boxes::{Box3D, Boxes3D, Frame};
use voxelrpn_3d::calibration::{Calibration, CalibrationMatrices};
use voxelrpn_rpn::anchors::AnchorGrid;
use voxelrpn_rpn::config::{AnchorConfig, TargetConfig};
use voxelrpn_rpn::delta::{decode_box, decode_deltas, encode_box};
use voxelrpn_rpn::iou::{iou, ExactIou};
use voxelrpn_rpn::target::TargetAssigner;

fn coarse_anchors() -> Result<AnchorGrid, Box<dyn std::error::Error>> {
    Ok(AnchorGrid::new(&AnchorConfig {
        x_range: [0.0, 40.0],
        y_range: [-20.0, 20.0],
        feature_width: 5,
        feature_height: 5,
        ..Default::default()
    })?)
}

fn random_box(rng: &mut StdRng) -> Box3D {
    Box3D::new(
        rng.random_range(5.0..65.0),
        rng.random_range(-35.0..35.0),
        rng.random_range(-2.0..0.5),
        rng.random_range(1.2..2.5),
        rng.random_range(0.5..2.5),
        rng.random_range(0.8..6.0),
        rng.random_range(-1.5..1.5),
    )
}

#[test]
fn coincident_box_is_positive_with_zero_target() -> Result<(), Box<dyn std::error::Error>> {
    let assigner = TargetAssigner::new(coarse_anchors()?, TargetConfig::default())?;
    let index = assigner.anchors().index(3, 2, 0);
    let gt = assigner.anchors().anchors()[index];

    let targets = assigner.assign_boxes(&[gt]);

    assert!(targets.is_positive(index));
    assert!(!targets.is_negative(index));
    assert!(targets.target(index).iter().all(|v| *v == 0.0));
    assert_eq!(targets.matches, vec![(index, 0)]);

    for other in 0..assigner.anchors().len() {
        if other == index {
            continue;
        }
        assert!(!targets.is_positive(other));
        assert!(targets.target(other).iter().all(|v| *v == 0.0));
    }
    // the rotated anchor of the same cell only shares a 1.6 x 1.6 square
    let rotated = assigner.anchors().index(3, 2, 1);
    assert!(targets.is_negative(rotated));
    assert_eq!(targets.num_negative(), assigner.anchors().len() - 1);
    Ok(())
}

#[test]
fn every_reachable_box_gets_a_positive_anchor() -> Result<(), Box<dyn std::error::Error>> {
    let anchors = AnchorGrid::new(&AnchorConfig::default())?;
    let assigner = TargetAssigner::new(
        anchors,
        TargetConfig {
            pos_iou: 1.0,
            neg_iou: 0.45,
            ..Default::default()
        },
    )?;
    let mut rng = StdRng::seed_from_u64(11);
    // 5 m apart along x so no two boxes share a best anchor
    let gt: Vec<Box3D> = (0..12)
        .map(|i| Box3D {
            x: 6.0 + 5.0 * i as f64,
            ..random_box(&mut rng)
        })
        .collect();

    let targets = assigner.assign_boxes(&gt);
    let iou = assigner.anchor_iou(&gt);

    for g in 0..gt.len() {
        let reachable = (0..iou.rows()).any(|a| iou.get(a, g) > 0.0);
        if reachable {
            assert!(targets.matches.iter().any(|(_, mg)| *mg == g), "box {g} unmatched");
        }
    }
    for (a, _) in &targets.matches {
        assert!(!targets.is_negative(*a));
    }
    Ok(())
}

#[test]
fn iou_stays_in_unit_interval() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ExactIou::new(
        BirdviewConfig::default(),
        Calibration::new(CalibrationMatrices::default())?,
    );
    let mut rng = StdRng::seed_from_u64(5);
    let boxes: Vec<Box3D> = (0..16).map(|_| random_box(&mut rng)).collect();

    for a in &boxes {
        assert!((iou(&engine, a, a, true) - 1.0).abs() < 1e-12);
        assert!((iou(&engine, a, a, false) - 1.0).abs() < 1e-12);
        for b in &boxes {
            for exact in [false, true] {
                let v = iou(&engine, a, b, exact);
                assert!((0.0..=1.0).contains(&v), "{v}");
            }
        }
        let far = Box3D { x: a.x + 20.0, ..*a };
        assert_eq!(iou(&engine, a, &far, true), 0.0);
        assert_eq!(iou(&engine, a, &far, false), 0.0);
    }

    let set = Boxes3D::new(Frame::Lidar, boxes.clone());
    let m = engine.iou_3d_matrix(&set, &set);
    for i in 0..boxes.len() {
        assert!((m.get(i, i) - 1.0).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn decoded_targets_recover_ground_truth() -> Result<(), Box<dyn std::error::Error>> {
    let anchors = coarse_anchors()?;
    let anchor_height = anchors.config().h;
    let mut rng = StdRng::seed_from_u64(23);

    for _ in 0..50 {
        let anchor = anchors.anchors()[rng.random_range(0..anchors.len())];
        let gt = Box3D {
            x: anchor.x + rng.random_range(-1.0..1.0),
            y: anchor.y + rng.random_range(-1.0..1.0),
            ..random_box(&mut rng)
        };
        let back = decode_box(&encode_box(&gt, &anchor, anchor_height), &anchor, anchor_height);
        for (u, v) in back.to_array().iter().zip(gt.to_array().iter()) {
            assert!((u - v).abs() < 1e-9);
        }
    }

    // through the f32 target map
    let assigner = TargetAssigner::new(anchors.clone(), TargetConfig::default())?;
    let gt = Box3D::new(20.6, -9.7, -0.8, 1.7, 1.5, 4.1, 0.15);
    let targets = assigner.assign_boxes(&[gt]);
    let decoded = decode_deltas(&targets.targets, &anchors)?;
    for (a, _) in &targets.matches {
        for (u, v) in decoded[*a].to_array().iter().zip(gt.to_array().iter()) {
            assert!((u - v).abs() < 1e-4);
        }
    }
    assert!(!targets.matches.is_empty());
    Ok(())
}
