//! Internal modules ported from the OpenCV primitives the original Python
//! tool called.
//!
//! These modules contain pure-Rust ports of:
//! - imgproc: gradients, blurs, pyramid reduction, bilinear resampling
//! - corners: goodFeaturesToTrack (Shi-Tomasi)
//! - pyr_lk: calcOpticalFlowPyrLK (pyramidal Lucas-Kanade)
//! - farneback: calcOpticalFlowFarneback (dense polynomial expansion flow)

pub mod corners;
pub mod farneback;
pub mod imgproc;
pub mod pyr_lk;
