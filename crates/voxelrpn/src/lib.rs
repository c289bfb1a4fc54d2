#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]
#![deny(missing_docs)]

#[doc(inline)]
pub use voxelrpn_3d as k3d;

#[doc(inline)]
pub use voxelrpn_rpn as rpn;
