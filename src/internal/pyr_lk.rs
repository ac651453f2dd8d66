//! Pyramidal Lucas-Kanade point tracking, ported from OpenCV's
//! calcOpticalFlowPyrLK.
//!
//! Each point is tracked coarse-to-fine over a binomial pyramid. At every
//! level a Gauss-Newton iteration solves the 2x2 structure-tensor system
//! built from a rectangular window around the point; iteration stops on the
//! combined count / epsilon criterion. Tracking is binary per point: a
//! singular or ill-conditioned system, a non-finite update, or a final
//! position outside the image marks the point as lost.

use nalgebra::{Matrix2, Vector2};

use crate::frame::Frame;
use crate::internal::imgproc;

/// Systems whose normalized minimum eigenvalue falls below this are treated
/// as untrackable (flat or aperture-dominated neighborhoods).
const MIN_EIGEN_THRESHOLD: f32 = 1e-4;

/// Tracking parameters.
#[derive(Debug, Clone)]
pub struct PyrLkParams {
    /// Search window (width, height).
    pub win_size: (usize, usize),
    /// Number of pyramid reductions below the full-resolution level.
    pub max_level: usize,
    /// Iteration cap per pyramid level.
    pub max_iterations: usize,
    /// Convergence threshold on the update step length.
    pub epsilon: f32,
}

/// Per-point tracking output. `status[i]` reports whether `next_points[i]`
/// is a valid track of `prev_points[i]`.
#[derive(Debug, Clone)]
pub struct PyrLkResult {
    pub next_points: Vec<[f32; 2]>,
    pub status: Vec<bool>,
}

/// Track `prev_points` from `prev` into `next`.
pub fn calc_optical_flow_pyr_lk(
    prev: &Frame,
    next: &Frame,
    prev_points: &[[f32; 2]],
    params: &PyrLkParams,
) -> PyrLkResult {
    let half_w = (params.win_size.0 / 2).max(1);
    let half_h = (params.win_size.1 / 2).max(1);

    // Build pyramids, stopping before a level becomes smaller than the window.
    let min_dim = 2 * half_w.max(half_h) + 3;
    let mut prev_pyr = vec![prev.clone()];
    let mut next_pyr = vec![next.clone()];
    for _ in 0..params.max_level {
        let down_prev = imgproc::pyr_down(&prev_pyr[prev_pyr.len() - 1]);
        if down_prev.width() < min_dim || down_prev.height() < min_dim {
            break;
        }
        let down_next = imgproc::pyr_down(&next_pyr[next_pyr.len() - 1]);
        prev_pyr.push(down_prev);
        next_pyr.push(down_next);
    }
    let top = prev_pyr.len() - 1;

    let grads: Vec<(Frame, Frame)> = prev_pyr.iter().map(imgproc::spatial_gradients).collect();

    let mut next_points = vec![[0.0f32; 2]; prev_points.len()];
    let mut status = vec![false; prev_points.len()];

    for (i, &point) in prev_points.iter().enumerate() {
        let mut flow = Vector2::new(0.0f32, 0.0f32);
        let mut ok = true;

        for level in (0..=top).rev() {
            if level != top {
                // Displacement doubles when moving to the next finer level.
                flow *= 2.0;
            }

            let scale = 1.0 / (1usize << level) as f32;
            let base_x = point[0] * scale;
            let base_y = point[1] * scale;
            let img_prev = &prev_pyr[level];
            let img_next = &next_pyr[level];
            let (gx, gy) = &grads[level];

            for _ in 0..params.max_iterations {
                let mut a = 0.0f32;
                let mut b = 0.0f32;
                let mut c = 0.0f32;
                let mut rx = 0.0f32;
                let mut ry = 0.0f32;

                for wy in -(half_h as i32)..=half_h as i32 {
                    for wx in -(half_w as i32)..=half_w as i32 {
                        let px = base_x + wx as f32;
                        let py = base_y + wy as f32;
                        let gxv = imgproc::sample_bilinear(gx, px, py);
                        let gyv = imgproc::sample_bilinear(gy, px, py);
                        let i0 = imgproc::sample_bilinear(img_prev, px, py);
                        let i1 = imgproc::sample_bilinear(img_next, px + flow.x, py + flow.y);
                        let diff = i0 - i1;

                        a += gxv * gxv;
                        b += gxv * gyv;
                        c += gyv * gyv;
                        rx += gxv * diff;
                        ry += gyv * diff;
                    }
                }

                let count = ((2 * half_w + 1) * (2 * half_h + 1)) as f32;
                let lambda_min = 0.5 * ((a + c) - ((a - c) * (a - c) + 4.0 * b * b).sqrt());
                if lambda_min / count < MIN_EIGEN_THRESHOLD {
                    ok = false;
                    break;
                }

                let system = Matrix2::new(a, b, b, c);
                let delta = match system.try_inverse() {
                    Some(inv) => inv * Vector2::new(rx, ry),
                    None => {
                        ok = false;
                        break;
                    }
                };
                if !delta.x.is_finite() || !delta.y.is_finite() {
                    ok = false;
                    break;
                }

                flow += delta;
                if delta.norm_squared() < params.epsilon * params.epsilon {
                    break;
                }
            }

            if !ok {
                break;
            }
        }

        let tracked = [point[0] + flow.x, point[1] + flow.y];
        let inside = tracked[0] >= 0.0
            && tracked[1] >= 0.0
            && tracked[0] <= (next.width() - 1) as f32
            && tracked[1] <= (next.height() - 1) as f32;

        if ok && inside && tracked[0].is_finite() && tracked[1].is_finite() {
            next_points[i] = tracked;
            status[i] = true;
        }
    }

    PyrLkResult { next_points, status }
}
