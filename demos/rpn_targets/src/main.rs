use argh::FromArgs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

use voxelrpn::k3d::boxes::{Box3D, Boxes3D, Frame};
use voxelrpn::k3d::pointcloud::LidarPointCloud;
use voxelrpn::k3d::voxel_grid::Voxelizer;
use voxelrpn::rpn::anchors::AnchorGrid;
use voxelrpn::rpn::config::DetectorConfig;
use voxelrpn::rpn::labels::{boxes_to_label_lines, select_labels, ObjectLabel};
use voxelrpn::rpn::target::TargetAssigner;

#[derive(FromArgs)]
/// Voxelize a synthetic LiDAR scene and build its RPN training targets
struct Args {
    /// path to a JSON detector configuration, defaults are used when absent
    #[argh(option, short = 'c')]
    config_path: Option<PathBuf>,

    /// seed of the synthetic scene
    #[argh(option, short = 's', default = "0")]
    seed: u64,

    /// number of background points
    #[argh(option, short = 'n', default = "20000")]
    num_points: usize,

    /// number of objects in the scene
    #[argh(option, default = "6")]
    num_objects: usize,

    /// path to a raw scan of little-endian f32 (x, y, z, reflectance) records,
    /// used instead of the synthetic points
    #[argh(option, short = 'p')]
    points_path: Option<PathBuf>,

    /// where to write the bincode-encoded voxel grid
    #[argh(option, short = 'o')]
    output_path: Option<PathBuf>,
}

const CLASSES: [&str; 4] = ["Car", "Van", "Truck", "Cyclist"];

fn random_label(rng: &mut StdRng) -> ObjectLabel {
    let yaw: f64 = rng.random_range(-std::f64::consts::PI..std::f64::consts::PI);
    ObjectLabel {
        class_name: CLASSES[rng.random_range(0..CLASSES.len())].to_string(),
        center: [
            rng.random_range(5.0..65.0),
            rng.random_range(-35.0..35.0),
            rng.random_range(-1.2..-0.6),
        ],
        h: rng.random_range(1.4..1.8),
        w: rng.random_range(1.5..2.0),
        l: rng.random_range(3.6..4.6),
        // rotation about z, scalar first
        orientation: [(yaw / 2.0).cos(), 0.0, 0.0, (yaw / 2.0).sin()],
    }
}

// uniform samples inside a yaw box plus a flat ground plane
fn synthetic_scan(boxes: &[Box3D], num_points: usize, rng: &mut StdRng) -> LidarPointCloud {
    let mut points: Vec<[f32; 4]> = (0..num_points)
        .map(|_| {
            [
                rng.random_range(0.0..70.0),
                rng.random_range(-40.0..40.0),
                rng.random_range(-1.9..-1.7),
                rng.random_range(0.0..0.3),
            ]
        })
        .collect();

    for b in boxes {
        let (sin, cos) = b.r.sin_cos();
        for _ in 0..400 {
            let u = rng.random_range(-0.5..0.5) * b.l;
            let v = rng.random_range(-0.5..0.5) * b.w;
            let z = rng.random_range(-0.5..0.5) * b.h;
            points.push([
                (b.x + u * cos - v * sin) as f32,
                (b.y + u * sin + v * cos) as f32,
                (b.z + z) as f32,
                rng.random_range(0.2..1.0),
            ]);
        }
    }
    LidarPointCloud::new(points)
}

fn read_scan(path: &Path) -> Result<LidarPointCloud, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(LidarPointCloud::from_flat(&values))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config_path {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => DetectorConfig::default(),
    };
    let calib = config.calibration()?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let labels: Vec<ObjectLabel> = (0..args.num_objects)
        .map(|_| random_label(&mut rng))
        .collect();

    // labels are generated directly in the lidar frame
    let identity = [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
    let all_boxes: Vec<Box3D> = labels.iter().map(|l| l.to_yaw_box(&identity)).collect();
    let cloud = match &args.points_path {
        Some(path) => read_scan(path)?,
        None => synthetic_scan(&all_boxes, args.num_points, &mut rng),
    };
    println!("Scan: #{} points, {} objects", cloud.len(), labels.len());

    let voxelizer = Voxelizer::new(config.voxel_config())?;
    let grid = voxelizer.voxelize(&cloud, &mut rng);
    println!(
        "Voxel grid: #{} voxels holding {} points",
        grid.len(),
        grid.total_points()
    );

    let anchors = AnchorGrid::new(&config.anchors)?;
    let assigner = TargetAssigner::new(anchors, config.targets.clone())?;
    let targets = assigner.assign(&labels, &identity)?;
    println!(
        "Targets for '{}': {} positive, {} negative of {} anchors",
        config.targets.target_class,
        targets.num_positive(),
        targets.num_negative(),
        assigner.anchors().len()
    );

    let selected = select_labels(&labels, assigner.filter())?;
    let gt: Vec<Box3D> = selected.iter().map(|l| l.to_yaw_box(&identity)).collect();
    let classes: Vec<String> = selected.iter().map(|l| l.class_name.clone()).collect();
    let lines = boxes_to_label_lines(&Boxes3D::new(Frame::Lidar, gt), &classes, None, &calib)?;
    for line in &lines {
        println!("{line}");
    }

    if let Some(path) = &args.output_path {
        let bytes = bincode::encode_to_vec(&grid, bincode::config::standard())?;
        std::fs::write(path, &bytes)?;
        log::info!("wrote {} bytes to {}", bytes.len(), path.display());
    }

    Ok(())
}
