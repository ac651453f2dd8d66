//! Shi-Tomasi corner detection, ported from OpenCV's goodFeaturesToTrack.
//!
//! The response at each pixel is the minimum eigenvalue of the structure
//! tensor summed over a `block_size` window. Candidates below
//! `quality_level * max_response` are discarded, the rest are kept strongest
//! first while enforcing `min_distance` between accepted corners.

use crate::frame::Frame;
use crate::internal::imgproc;

/// Detection parameters, mirroring the OpenCV argument set.
#[derive(Debug, Clone)]
pub struct CornerParams {
    /// Maximum number of corners to return.
    pub max_points: usize,
    /// Relative quality threshold in (0, 1], against the strongest response.
    pub quality_level: f32,
    /// Minimum Euclidean distance between accepted corners.
    pub min_distance: f32,
    /// Window size for the structure tensor sums.
    pub block_size: usize,
}

/// Detect up to `max_points` well-separated corners on `frame`.
///
/// Returns corner positions in pixel coordinates, strongest first. A frame
/// with no structure (for instance a constant image) yields an empty vector;
/// that is a valid outcome, not an error.
pub fn good_features_to_track(frame: &Frame, params: &CornerParams) -> Vec<[f32; 2]> {
    let (w, h) = frame.dimensions();
    let radius = (params.block_size / 2).max(1);
    if params.max_points == 0 || w < 2 * radius + 3 || h < 2 * radius + 3 {
        return Vec::new();
    }

    let (gx, gy) = imgproc::spatial_gradients(frame);

    // Structure tensor entries summed over the block window. The box filter
    // normalizes by window area; the factor cancels in the relative threshold.
    let ixx = product_frame(&gx, &gx);
    let ixy = product_frame(&gx, &gy);
    let iyy = product_frame(&gy, &gy);
    let sxx = imgproc::box_blur(&ixx, radius, radius);
    let sxy = imgproc::box_blur(&ixy, radius, radius);
    let syy = imgproc::box_blur(&iyy, radius, radius);

    // Minimum eigenvalue response, excluding a border margin where the
    // window and the gradients are degenerate.
    let margin = radius + 1;
    let mut response = vec![0.0f32; w * h];
    let mut max_response = 0.0f32;
    for y in margin..h - margin {
        for x in margin..w - margin {
            let a = sxx.get(x, y);
            let b = sxy.get(x, y);
            let c = syy.get(x, y);
            let lambda_min = 0.5 * ((a + c) - ((a - c) * (a - c) + 4.0 * b * b).sqrt());
            response[y * w + x] = lambda_min;
            if lambda_min > max_response {
                max_response = lambda_min;
            }
        }
    }

    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = params.quality_level * max_response;

    // 3x3 non-maximum suppression, then strongest-first ordering.
    let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
    for y in margin..h - margin {
        for x in margin..w - margin {
            let r = response[y * w + x];
            if r < threshold {
                continue;
            }
            let mut is_local_max = true;
            'window: for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = (x as i32 + dx) as usize;
                    let ny = (y as i32 + dy) as usize;
                    if response[ny * w + nx] > r {
                        is_local_max = false;
                        break 'window;
                    }
                }
            }
            if is_local_max {
                candidates.push((r, x, y));
            }
        }
    }

    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    // Greedy min-distance acceptance in response order.
    let min_dist_sq = params.min_distance * params.min_distance;
    let mut accepted: Vec<[f32; 2]> = Vec::new();
    for (_, x, y) in candidates {
        let px = x as f32;
        let py = y as f32;
        let far_enough = accepted
            .iter()
            .all(|p| (p[0] - px) * (p[0] - px) + (p[1] - py) * (p[1] - py) >= min_dist_sq);
        if far_enough {
            accepted.push([px, py]);
            if accepted.len() >= params.max_points {
                break;
            }
        }
    }

    accepted
}

fn product_frame(a: &Frame, b: &Frame) -> Frame {
    let (w, h) = a.dimensions();
    let data = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&x, &y)| x * y)
        .collect();
    Frame::from_raw_parts(w, h, data)
}
