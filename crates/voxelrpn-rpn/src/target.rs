use rayon::prelude::*;
use voxelrpn_3d::boxes::{Box3D, StandupBox};

use crate::anchors::{AnchorGrid, NUM_ANCHORS_PER_CELL};
use crate::config::TargetConfig;
use crate::delta::{encode_box, DELTA_DIM};
use crate::iou::{standup_iou_matrix, IouMatrix};
use crate::labels::{labels_to_gt_boxes, ClassFilter, ObjectLabel};
use crate::RpnError;

/// Training targets of one sample.
///
/// Masks are `(H, W, 2)` and targets `(H, W, 14)`, flat and row-major, so the
/// seven regression values of anchor `i` live at `targets[7 * i..7 * i + 7]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpnTargets {
    height: usize,
    width: usize,
    /// 1 for positive anchors.
    pub pos_mask: Vec<f32>,
    /// 1 for negative anchors.
    pub neg_mask: Vec<f32>,
    /// Regression targets, zero for non-positive anchors.
    pub targets: Vec<f32>,
    /// Positive anchors in increasing order, with the ground-truth index each
    /// one regresses to.
    pub matches: Vec<(usize, usize)>,
}

impl RpnTargets {
    fn empty(height: usize, width: usize) -> Self {
        let num_anchors = height * width * NUM_ANCHORS_PER_CELL;
        Self {
            height,
            width,
            pos_mask: vec![0.0; num_anchors],
            neg_mask: vec![0.0; num_anchors],
            targets: vec![0.0; num_anchors * DELTA_DIM],
            matches: Vec::new(),
        }
    }

    /// Feature map rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Feature map columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Check whether anchor `index` is positive.
    pub fn is_positive(&self, index: usize) -> bool {
        self.pos_mask.get(index).is_some_and(|v| *v > 0.0)
    }

    /// Check whether anchor `index` is negative.
    pub fn is_negative(&self, index: usize) -> bool {
        self.neg_mask.get(index).is_some_and(|v| *v > 0.0)
    }

    /// Regression target of anchor `index`.
    pub fn target(&self, index: usize) -> &[f32] {
        &self.targets[index * DELTA_DIM..(index + 1) * DELTA_DIM]
    }

    /// Number of positive anchors.
    pub fn num_positive(&self) -> usize {
        self.matches.len()
    }

    /// Number of negative anchors.
    pub fn num_negative(&self) -> usize {
        self.neg_mask.iter().filter(|v| **v > 0.0).count()
    }
}

/// Matches anchors to ground truth and builds RPN targets.
#[derive(Debug, Clone)]
pub struct TargetAssigner {
    anchors: AnchorGrid,
    anchor_standup: Vec<StandupBox>,
    config: TargetConfig,
    filter: ClassFilter,
}

impl TargetAssigner {
    /// Create an assigner over `anchors`.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::Config`] if the thresholds are invalid.
    pub fn new(anchors: AnchorGrid, config: TargetConfig) -> Result<Self, RpnError> {
        config.validate()?;
        let filter = ClassFilter::from_target(&config.target_class);
        Ok(Self {
            anchor_standup: anchors.standup_boxes(),
            anchors,
            config,
            filter,
        })
    }

    /// The anchor grid.
    pub fn anchors(&self) -> &AnchorGrid {
        &self.anchors
    }

    /// The class filter derived from the target class.
    pub fn filter(&self) -> ClassFilter {
        self.filter
    }

    /// Standup IoU of every anchor (rows) with every box (columns).
    pub fn anchor_iou(&self, gt: &[Box3D]) -> IouMatrix {
        let gt_standup: Vec<StandupBox> = gt.iter().map(|b| b.to_bev().lidar_standup()).collect();
        standup_iou_matrix(&self.anchor_standup, &gt_standup)
    }

    /// Build targets from raw labels.
    ///
    /// Labels are filtered by the target class and mapped into the lidar
    /// frame through `ref_to_lidar` before matching.
    ///
    /// # Errors
    ///
    /// Returns [`RpnError::UnknownClass`] if the target class matches every
    /// class and a label name is unknown.
    pub fn assign(
        &self,
        labels: &[ObjectLabel],
        ref_to_lidar: &[[f64; 4]; 3],
    ) -> Result<RpnTargets, RpnError> {
        let gt = labels_to_gt_boxes(labels, self.filter, ref_to_lidar)?;
        Ok(self.assign_boxes(&gt))
    }

    /// Build targets from lidar-frame ground-truth boxes.
    ///
    /// 1. Each box's best anchor (first on ties) is positive if its IoU is above zero.
    /// 2. Every pair above the positive threshold is positive.
    /// 3. Anchors below the negative threshold for every box are negative.
    /// 4. An anchor positive more than once regresses to its first pair in
    ///    threshold order (anchor, then box), with best-anchor pairs after.
    /// 5. Best anchors are never negative.
    pub fn assign_boxes(&self, gt: &[Box3D]) -> RpnTargets {
        let mut out = RpnTargets::empty(self.anchors.height(), self.anchors.width());
        let iou = self.anchor_iou(gt);

        let mut best: Vec<(usize, usize)> = Vec::new();
        for (g, col_max) in iou.argmax_per_col().into_iter().enumerate() {
            if let Some((a, v)) = col_max {
                if v > 0.0 {
                    best.push((a, g));
                }
            }
        }

        let mut candidates: Vec<(usize, usize)> = Vec::new();
        for a in 0..iou.rows() {
            let row = iou.row(a);
            for (g, v) in row.iter().enumerate() {
                if *v > self.config.pos_iou {
                    candidates.push((a, g));
                }
            }
            if row.iter().all(|v| *v < self.config.neg_iou) {
                out.neg_mask[a] = 1.0;
            }
        }
        candidates.extend_from_slice(&best);

        // stable sort keeps the first occurrence of every anchor in front
        candidates.sort_by_key(|(a, _)| *a);
        candidates.dedup_by_key(|(a, _)| *a);

        let anchor_height = self.anchors.config().h;
        let anchors = self.anchors.anchors();
        for &(a, g) in &candidates {
            out.pos_mask[a] = 1.0;
            let delta = encode_box(&gt[g], &anchors[a], anchor_height);
            for (dst, v) in out.targets[a * DELTA_DIM..(a + 1) * DELTA_DIM]
                .iter_mut()
                .zip(delta)
            {
                *dst = v as f32;
            }
        }
        for &(a, _) in &best {
            out.neg_mask[a] = 0.0;
        }
        out.matches = candidates;

        log::debug!(
            "assigned {} boxes: {} positive, {} negative anchors",
            gt.len(),
            out.num_positive(),
            out.num_negative()
        );
        out
    }

    /// [`TargetAssigner::assign`] over a batch, one sample per rayon task.
    ///
    /// # Errors
    ///
    /// Fails as [`TargetAssigner::assign`] does for any sample.
    pub fn assign_batch(
        &self,
        batch: &[Vec<ObjectLabel>],
        ref_to_lidar: &[[f64; 4]; 3],
    ) -> Result<Vec<RpnTargets>, RpnError> {
        batch
            .par_iter()
            .map(|labels| self.assign(labels, ref_to_lidar))
            .collect()
    }

    /// Stack per-sample targets into `(N, H, W, 2)` masks and `(N, H, W, 14)`
    /// regression targets.
    pub fn stack(batch: &[RpnTargets]) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
        let pos = batch.iter().flat_map(|t| t.pos_mask.iter().copied()).collect();
        let neg = batch.iter().flat_map(|t| t.neg_mask.iter().copied()).collect();
        let targets = batch.iter().flat_map(|t| t.targets.iter().copied()).collect();
        (pos, neg, targets)
    }
}
