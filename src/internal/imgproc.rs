//! Image-processing primitives shared by the flow estimators.
//!
//! Borders are handled by clamping to the nearest edge pixel throughout,
//! matching OpenCV's BORDER_REPLICATE behavior.

use crate::frame::Frame;

/// Central-difference spatial gradients (df/dx, df/dy), half-pixel scaled.
pub fn spatial_gradients(frame: &Frame) -> (Frame, Frame) {
    let (w, h) = frame.dimensions();
    let mut gx = vec![0.0f32; w * h];
    let mut gy = vec![0.0f32; w * h];

    for y in 0..h {
        for x in 0..w {
            let xp = if x + 1 < w { x + 1 } else { x };
            let xm = x.saturating_sub(1);
            let yp = if y + 1 < h { y + 1 } else { y };
            let ym = y.saturating_sub(1);

            gx[y * w + x] = (frame.get(xp, y) - frame.get(xm, y)) * 0.5;
            gy[y * w + x] = (frame.get(x, yp) - frame.get(x, ym)) * 0.5;
        }
    }

    (from_raw(w, h, gx), from_raw(w, h, gy))
}

/// Normalized 1-D Gaussian kernel of length `2 * radius + 1`.
pub fn gaussian_kernel(sigma: f32, radius: usize) -> Vec<f32> {
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-d * d / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Correlate each row with a centered 1-D kernel.
pub fn correlate_rows(frame: &Frame, kernel: &[f32]) -> Frame {
    let (w, h) = frame.dimensions();
    let radius = kernel.len() / 2;
    let mut out = vec![0.0f32; w * h];

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (i, &k) in kernel.iter().enumerate() {
                let sx = clamp_index(x as isize + i as isize - radius as isize, w);
                acc += k * frame.get(sx, y);
            }
            out[y * w + x] = acc;
        }
    }

    from_raw(w, h, out)
}

/// Correlate each column with a centered 1-D kernel.
pub fn correlate_cols(frame: &Frame, kernel: &[f32]) -> Frame {
    let (w, h) = frame.dimensions();
    let radius = kernel.len() / 2;
    let mut out = vec![0.0f32; w * h];

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (i, &k) in kernel.iter().enumerate() {
                let sy = clamp_index(y as isize + i as isize - radius as isize, h);
                acc += k * frame.get(x, sy);
            }
            out[y * w + x] = acc;
        }
    }

    from_raw(w, h, out)
}

/// Separable filter: rows with `kx`, then columns with `ky`.
pub fn separable_filter(frame: &Frame, kx: &[f32], ky: &[f32]) -> Frame {
    correlate_cols(&correlate_rows(frame, kx), ky)
}

/// Gaussian blur with an explicit kernel radius.
pub fn gaussian_blur(frame: &Frame, sigma: f32, radius: usize) -> Frame {
    let kernel = gaussian_kernel(sigma, radius);
    separable_filter(frame, &kernel, &kernel)
}

/// Normalized box (mean) filter with a rectangular window.
pub fn box_blur(frame: &Frame, radius_x: usize, radius_y: usize) -> Frame {
    let kx = vec![1.0 / (2 * radius_x + 1) as f32; 2 * radius_x + 1];
    let ky = vec![1.0 / (2 * radius_y + 1) as f32; 2 * radius_y + 1];
    separable_filter(frame, &kx, &ky)
}

/// Bilinear sample at a fractional position, clamped to the frame bounds.
#[inline]
pub fn sample_bilinear(frame: &Frame, x: f32, y: f32) -> f32 {
    let (w, h) = frame.dimensions();
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = frame.get(x0, y0) * (1.0 - fx) + frame.get(x1, y0) * fx;
    let bottom = frame.get(x0, y1) * (1.0 - fx) + frame.get(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Resize with bilinear interpolation, pixel-center aligned.
pub fn resize_bilinear(frame: &Frame, new_width: usize, new_height: usize) -> Frame {
    let (w, h) = frame.dimensions();
    if (w, h) == (new_width, new_height) {
        return frame.clone();
    }

    let sx = w as f32 / new_width as f32;
    let sy = h as f32 / new_height as f32;
    let mut out = Vec::with_capacity(new_width * new_height);

    for y in 0..new_height {
        for x in 0..new_width {
            let src_x = (x as f32 + 0.5) * sx - 0.5;
            let src_y = (y as f32 + 0.5) * sy - 0.5;
            out.push(sample_bilinear(frame, src_x, src_y));
        }
    }

    from_raw(new_width, new_height, out)
}

/// Downsample by 2 with a 5-tap binomial pre-filter.
pub fn pyr_down(frame: &Frame) -> Frame {
    const KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

    let blurred = separable_filter(frame, &KERNEL, &KERNEL);
    let (w, h) = frame.dimensions();
    let nw = w.div_ceil(2);
    let nh = h.div_ceil(2);

    let mut out = Vec::with_capacity(nw * nh);
    for y in 0..nh {
        for x in 0..nw {
            out.push(blurred.get((2 * x).min(w - 1), (2 * y).min(h - 1)));
        }
    }

    from_raw(nw, nh, out)
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Frame {
    Frame::from_raw_parts(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_kernel_normalized() {
        let kernel = gaussian_kernel(1.2, 3);
        assert_eq!(kernel.len(), 7);
        let sum: f32 = kernel.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
        // Symmetric around the center
        assert_relative_eq!(kernel[0], kernel[6], epsilon = 1e-6);
    }

    #[test]
    fn test_gradients_of_ramp() {
        let frame = Frame::from_fn(8, 8, |x, _| 2.0 * x as f32);
        let (gx, gy) = spatial_gradients(&frame);
        // Interior of a linear ramp has constant slope
        assert_relative_eq!(gx.get(4, 4), 2.0, epsilon = 1e-5);
        assert_relative_eq!(gy.get(4, 4), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_blur_preserves_constant() {
        let frame = Frame::from_fn(10, 10, |_, _| 7.0);
        let blurred = gaussian_blur(&frame, 1.5, 4);
        assert_relative_eq!(blurred.get(5, 5), 7.0, epsilon = 1e-4);
        assert_relative_eq!(blurred.get(0, 0), 7.0, epsilon = 1e-4);
    }

    #[test]
    fn test_box_blur_mean() {
        let frame = Frame::from_fn(5, 5, |x, y| if (x, y) == (2, 2) { 9.0 } else { 0.0 });
        let blurred = box_blur(&frame, 1, 1);
        assert_relative_eq!(blurred.get(2, 2), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sample_bilinear_midpoint() {
        let frame = Frame::from_samples(2, 1, vec![0.0, 10.0]).unwrap();
        assert_relative_eq!(sample_bilinear(&frame, 0.5, 0.0), 5.0, epsilon = 1e-5);
        // Out-of-bounds positions clamp to the border
        assert_relative_eq!(sample_bilinear(&frame, -3.0, 0.0), 0.0, epsilon = 1e-5);
        assert_relative_eq!(sample_bilinear(&frame, 5.0, 0.0), 10.0, epsilon = 1e-5);
    }

    #[test]
    fn test_resize_dimensions() {
        let frame = Frame::from_fn(16, 12, |x, y| (x + y) as f32);
        let resized = resize_bilinear(&frame, 8, 6);
        assert_eq!(resized.dimensions(), (8, 6));
        let same = resize_bilinear(&frame, 16, 12);
        assert_eq!(same, frame);
    }

    #[test]
    fn test_pyr_down_dimensions() {
        let frame = Frame::from_fn(9, 6, |x, y| (x * y) as f32);
        let down = pyr_down(&frame);
        assert_eq!(down.dimensions(), (5, 3));
    }
}
