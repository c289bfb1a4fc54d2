use rayon::prelude::*;
use voxelrpn_3d::boxes::Box3D;

use crate::anchors::AnchorGrid;
use crate::RpnError;

/// Regression values per anchor: `dx, dy, dz, dh, dw, dl, dr`.
pub const DELTA_DIM: usize = 7;

/// Regression targets of `gt` relative to `anchor`.
///
/// `dx, dy` are normalized by the anchor diagonal `sqrt(w^2 + l^2)`, `dz` by
/// `anchor_height`, sizes are log ratios and `dr` is the plain yaw
/// difference, without wrapping.
pub fn encode_box(gt: &Box3D, anchor: &Box3D, anchor_height: f64) -> [f64; DELTA_DIM] {
    let diagonal = anchor.w.hypot(anchor.l);
    [
        (gt.x - anchor.x) / diagonal,
        (gt.y - anchor.y) / diagonal,
        (gt.z - anchor.z) / anchor_height,
        (gt.h / anchor.h).ln(),
        (gt.w / anchor.w).ln(),
        (gt.l / anchor.l).ln(),
        gt.r - anchor.r,
    ]
}

/// Inverse of [`encode_box`].
pub fn decode_box(delta: &[f64; DELTA_DIM], anchor: &Box3D, anchor_height: f64) -> Box3D {
    let diagonal = anchor.w.hypot(anchor.l);
    Box3D::new(
        delta[0] * diagonal + anchor.x,
        delta[1] * diagonal + anchor.y,
        delta[2] * anchor_height + anchor.z,
        delta[3].exp() * anchor.h,
        delta[4].exp() * anchor.w,
        delta[5].exp() * anchor.l,
        delta[6] + anchor.r,
    )
}

/// Decode one sample's `(H, W, 14)` regression map into a box per anchor.
///
/// # Errors
///
/// Returns [`RpnError::ShapeMismatch`] unless `deltas` holds exactly
/// `anchors.len() * 7` values.
pub fn decode_deltas(deltas: &[f32], anchors: &AnchorGrid) -> Result<Vec<Box3D>, RpnError> {
    let expected = anchors.len() * DELTA_DIM;
    if deltas.len() != expected {
        return Err(RpnError::ShapeMismatch {
            expected,
            actual: deltas.len(),
        });
    }
    let anchor_height = anchors.config().h;
    Ok(deltas
        .chunks_exact(DELTA_DIM)
        .zip(anchors.anchors())
        .map(|(d, anchor)| {
            let delta = [d[0], d[1], d[2], d[3], d[4], d[5], d[6]].map(f64::from);
            decode_box(&delta, anchor, anchor_height)
        })
        .collect())
}

/// Decode an `(N, H, W, 14)` batch, one sample per rayon task.
///
/// # Errors
///
/// Returns [`RpnError::ShapeMismatch`] if `deltas` is not a whole number of
/// samples.
pub fn decode_batch(deltas: &[f32], anchors: &AnchorGrid) -> Result<Vec<Vec<Box3D>>, RpnError> {
    let per_sample = anchors.len() * DELTA_DIM;
    if per_sample == 0 || deltas.len() % per_sample != 0 {
        return Err(RpnError::ShapeMismatch {
            expected: per_sample,
            actual: deltas.len(),
        });
    }
    deltas
        .par_chunks(per_sample)
        .map(|sample| decode_deltas(sample, anchors))
        .collect()
}
