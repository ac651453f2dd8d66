//! Dense two-frame motion estimation, ported from OpenCV's
//! calcOpticalFlowFarneback.
//!
//! Each frame is approximated per pixel by a quadratic polynomial
//! `f(x + u) ~ c + b'u + u'Au` fitted over a Gaussian-weighted `poly_n`
//! neighborhood (Farneback's polynomial expansion). For a displacement `d`
//! between the two expansions, `A d = -0.5 (b2 - b1)` holds locally; the
//! per-pixel 2x2 systems are aggregated over `winsize` windows and solved,
//! iterating with displaced coefficient lookups over an image pyramid with
//! an arbitrary per-level scale factor.

use nalgebra::{Matrix6, Vector6};

use crate::frame::Frame;
use crate::internal::imgproc;
use crate::{Error, Result};

/// Estimation parameters, mirroring the OpenCV argument set.
#[derive(Debug, Clone)]
pub struct FarnebackParams {
    /// Pyramid scale factor in (0, 1); each level shrinks by this factor.
    pub pyr_scale: f32,
    /// Number of pyramid layers including the full-resolution one.
    pub levels: usize,
    /// Aggregation window size for the per-pixel flow systems.
    pub winsize: usize,
    /// Iterations per pyramid level.
    pub iterations: usize,
    /// Polynomial expansion neighborhood size (odd).
    pub poly_n: usize,
    /// Gaussian weighting sigma for the polynomial expansion.
    pub poly_sigma: f32,
    /// Aggregate with a Gaussian window instead of a box window.
    pub gaussian_window: bool,
}

/// Per-pixel displacement field between two frames, same dimensions as the
/// input frames.
#[derive(Debug, Clone)]
pub struct FlowField {
    width: usize,
    height: usize,
    dx: Vec<f32>,
    dy: Vec<f32>,
}

impl FlowField {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Horizontal displacement plane, row-major.
    pub fn dx(&self) -> &[f32] {
        &self.dx
    }

    /// Vertical displacement plane, row-major.
    pub fn dy(&self) -> &[f32] {
        &self.dy
    }
}

/// Quadratic expansion coefficient planes for one image.
struct PolyExpansion {
    bx: Frame,
    by: Frame,
    axx: Frame,
    ayy: Frame,
    /// Off-diagonal A entry (half the fitted xy coefficient).
    axy: Frame,
}

/// Estimate the dense displacement field from `prev` to `next`.
///
/// The frames must have identical dimensions; the caller checks this and
/// reports a dimension mismatch before calling in here.
pub fn calc_optical_flow_farneback(
    prev: &Frame,
    next: &Frame,
    params: &FarnebackParams,
) -> Result<FlowField> {
    let (width, height) = prev.dimensions();
    let g_inv = gram_inverse(params.poly_n, params.poly_sigma)?;

    // Coarse-to-fine level sizes. Level 0 (full resolution) is always
    // processed; coarser levels too small for the expansion window are
    // skipped.
    let mut level_sizes = Vec::with_capacity(params.levels.max(1));
    for k in (0..params.levels.max(1)).rev() {
        let scale = params.pyr_scale.powi(k as i32);
        let lw = ((width as f32 * scale).round() as usize).max(1);
        let lh = ((height as f32 * scale).round() as usize).max(1);
        if k > 0 && (lw < 2 * params.poly_n + 1 || lh < 2 * params.poly_n + 1) {
            continue;
        }
        level_sizes.push((lw, lh));
    }

    let mut flow: Option<FlowField> = None;
    for &(lw, lh) in &level_sizes {
        let prev_level = imgproc::resize_bilinear(prev, lw, lh);
        let next_level = imgproc::resize_bilinear(next, lw, lh);
        let exp1 = poly_exp(&prev_level, params.poly_n, params.poly_sigma, &g_inv);
        let exp2 = poly_exp(&next_level, params.poly_n, params.poly_sigma, &g_inv);

        let (mut dx, mut dy) = match flow.take() {
            None => (vec![0.0f32; lw * lh], vec![0.0f32; lw * lh]),
            Some(coarse) => upscale_flow(&coarse, lw, lh),
        };

        for _ in 0..params.iterations.max(1) {
            update_flow(&exp1, &exp2, &mut dx, &mut dy, params);
        }

        flow = Some(FlowField { width: lw, height: lh, dx, dy });
    }

    // Level 0 is unconditionally in `level_sizes`, so the field exists.
    flow.ok_or_else(|| Error::InvalidConfig("pyramid produced no levels".into()))
}

/// Inverse Gram matrix of the weighted quadratic basis over the expansion
/// window. Depends only on the window geometry, so it is computed once and
/// shared by every pixel and pyramid level.
fn gram_inverse(poly_n: usize, poly_sigma: f32) -> Result<Matrix6<f32>> {
    let radius = (poly_n / 2).max(1);
    let kernel = imgproc::gaussian_kernel(poly_sigma, radius);

    let mut gram = Matrix6::<f64>::zeros();
    let r = radius as i32;
    for j in -r..=r {
        for i in -r..=r {
            let w = (kernel[(i + r) as usize] * kernel[(j + r) as usize]) as f64;
            let basis = Vector6::new(
                1.0,
                i as f64,
                j as f64,
                (i * i) as f64,
                (j * j) as f64,
                (i * j) as f64,
            );
            gram += w * basis * basis.transpose();
        }
    }

    gram.try_inverse()
        .map(|inv| inv.map(|v| v as f32))
        .ok_or_else(|| {
            Error::InvalidConfig("polynomial expansion basis is degenerate".into())
        })
}

/// Fit the quadratic expansion at every pixel via separable moment
/// correlations, then apply the shared inverse Gram matrix.
fn poly_exp(frame: &Frame, poly_n: usize, poly_sigma: f32, g_inv: &Matrix6<f32>) -> PolyExpansion {
    let radius = (poly_n / 2).max(1);
    let g = imgproc::gaussian_kernel(poly_sigma, radius);
    let xg: Vec<f32> = g
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f32 - radius as f32) * v)
        .collect();
    let xxg: Vec<f32> = g
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let d = i as f32 - radius as f32;
            d * d * v
        })
        .collect();

    let t0 = imgproc::correlate_rows(frame, &g);
    let t1 = imgproc::correlate_rows(frame, &xg);
    let t2 = imgproc::correlate_rows(frame, &xxg);

    let m00 = imgproc::correlate_cols(&t0, &g);
    let m10 = imgproc::correlate_cols(&t1, &g);
    let m01 = imgproc::correlate_cols(&t0, &xg);
    let m20 = imgproc::correlate_cols(&t2, &g);
    let m02 = imgproc::correlate_cols(&t0, &xxg);
    let m11 = imgproc::correlate_cols(&t1, &xg);

    let (w, h) = frame.dimensions();
    let n = w * h;
    let mut bx = vec![0.0f32; n];
    let mut by = vec![0.0f32; n];
    let mut axx = vec![0.0f32; n];
    let mut ayy = vec![0.0f32; n];
    let mut axy = vec![0.0f32; n];

    for (i, (((((v00, v10), v01), v20), v02), v11)) in m00
        .as_slice()
        .iter()
        .zip(m10.as_slice())
        .zip(m01.as_slice())
        .zip(m20.as_slice())
        .zip(m02.as_slice())
        .zip(m11.as_slice())
        .enumerate()
    {
        let moments = Vector6::new(*v00, *v10, *v01, *v20, *v02, *v11);
        let coeffs = g_inv * moments;
        bx[i] = coeffs[1];
        by[i] = coeffs[2];
        axx[i] = coeffs[3];
        ayy[i] = coeffs[4];
        axy[i] = coeffs[5] * 0.5;
    }

    PolyExpansion {
        bx: Frame::from_raw_parts(w, h, bx),
        by: Frame::from_raw_parts(w, h, by),
        axx: Frame::from_raw_parts(w, h, axx),
        ayy: Frame::from_raw_parts(w, h, ayy),
        axy: Frame::from_raw_parts(w, h, axy),
    }
}

/// One displacement refinement pass at a single pyramid level.
fn update_flow(
    exp1: &PolyExpansion,
    exp2: &PolyExpansion,
    dx: &mut [f32],
    dy: &mut [f32],
    params: &FarnebackParams,
) {
    let (w, h) = exp1.bx.dimensions();
    let n = w * h;

    let mut g11 = vec![0.0f32; n];
    let mut g12 = vec![0.0f32; n];
    let mut g22 = vec![0.0f32; n];
    let mut h1 = vec![0.0f32; n];
    let mut h2 = vec![0.0f32; n];

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let fx = dx[i];
            let fy = dy[i];
            // Coefficients of the second frame, looked up at the displaced
            // position the current estimate predicts.
            let sx = x as f32 + fx;
            let sy = y as f32 + fy;
            let a11 = 0.5 * (exp1.axx.get(x, y) + imgproc::sample_bilinear(&exp2.axx, sx, sy));
            let a12 = 0.5 * (exp1.axy.get(x, y) + imgproc::sample_bilinear(&exp2.axy, sx, sy));
            let a22 = 0.5 * (exp1.ayy.get(x, y) + imgproc::sample_bilinear(&exp2.ayy, sx, sy));
            let dbx = -0.5 * (imgproc::sample_bilinear(&exp2.bx, sx, sy) - exp1.bx.get(x, y))
                + a11 * fx
                + a12 * fy;
            let dby = -0.5 * (imgproc::sample_bilinear(&exp2.by, sx, sy) - exp1.by.get(x, y))
                + a12 * fx
                + a22 * fy;

            // Normal equations of A d = db; A is symmetric.
            g11[i] = a11 * a11 + a12 * a12;
            g12[i] = a12 * (a11 + a22);
            g22[i] = a12 * a12 + a22 * a22;
            h1[i] = a11 * dbx + a12 * dby;
            h2[i] = a12 * dbx + a22 * dby;
        }
    }

    let radius = (params.winsize / 2).max(1);
    let aggregate = |plane: Vec<f32>| -> Frame {
        let frame = Frame::from_raw_parts(w, h, plane);
        if params.gaussian_window {
            imgproc::gaussian_blur(&frame, params.winsize as f32 * 0.3, radius)
        } else {
            imgproc::box_blur(&frame, radius, radius)
        }
    };
    let g11 = aggregate(g11);
    let g12 = aggregate(g12);
    let g22 = aggregate(g22);
    let h1 = aggregate(h1);
    let h2 = aggregate(h2);

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let a = g11.get(x, y);
            let b = g12.get(x, y);
            let c = g22.get(x, y);
            let det = a * c - b * b;
            // Textureless neighborhoods keep their previous estimate.
            if det.abs() > 1e-9 {
                let r1 = h1.get(x, y);
                let r2 = h2.get(x, y);
                dx[i] = (c * r1 - b * r2) / det;
                dy[i] = (a * r2 - b * r1) / det;
            }
        }
    }
}

/// Resize a coarse-level field to the next finer level, rescaling the
/// displacement values by the per-axis size ratio.
fn upscale_flow(coarse: &FlowField, new_w: usize, new_h: usize) -> (Vec<f32>, Vec<f32>) {
    let rx = new_w as f32 / coarse.width as f32;
    let ry = new_h as f32 / coarse.height as f32;

    let dx_frame = Frame::from_raw_parts(coarse.width, coarse.height, coarse.dx.clone());
    let dy_frame = Frame::from_raw_parts(coarse.width, coarse.height, coarse.dy.clone());
    let dx = imgproc::resize_bilinear(&dx_frame, new_w, new_h)
        .into_samples()
        .into_iter()
        .map(|v| v * rx)
        .collect();
    let dy = imgproc::resize_bilinear(&dy_frame, new_w, new_h)
        .into_samples()
        .into_iter()
        .map(|v| v * ry)
        .collect();
    (dx, dy)
}
