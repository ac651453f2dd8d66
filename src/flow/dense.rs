//! Dense (Farneback) flow engine.

use std::f32::consts::PI;

use crate::config::FarnebackConfig;
use crate::export;
use crate::flow::FlowEngine;
use crate::frame::Frame;
use crate::internal::farneback::{self, FarnebackParams};
use crate::records::DenseMotionRecord;
use crate::{Error, Result};

/// Whole-field motion estimation between the reference frame and each
/// sampled frame.
///
/// Emits exactly one record per sample: the maximum magnitude, mean
/// magnitude, and mean direction of the displacement field in polar form.
/// When `image_dir` is configured, the per-pixel magnitude and direction
/// grids are also written out as grayscale rasters keyed by frame index.
pub struct DenseFlowEngine {
    config: FarnebackConfig,
    reference: Option<Frame>,
}

impl DenseFlowEngine {
    pub fn new(config: FarnebackConfig) -> Self {
        Self {
            config,
            reference: None,
        }
    }

    fn params(&self) -> FarnebackParams {
        FarnebackParams {
            pyr_scale: self.config.pyr_scale,
            levels: self.config.levels,
            winsize: self.config.winsize,
            iterations: self.config.iterations,
            poly_n: self.config.poly_n,
            poly_sigma: self.config.poly_sigma,
            gaussian_window: self.config.gaussian_window(),
        }
    }
}

impl FlowEngine for DenseFlowEngine {
    type Record = DenseMotionRecord;

    fn seed(&mut self, first: &Frame) -> Result<()> {
        self.reference = Some(first.clone());
        Ok(())
    }

    fn estimate(&mut self, frame_index: u64, current: &Frame) -> Result<Vec<DenseMotionRecord>> {
        let reference = self.reference.take().ok_or_else(|| {
            Error::InvalidConfig("flow engine must be seeded before estimating".into())
        })?;

        if reference.dimensions() != current.dimensions() {
            let (ew, eh) = reference.dimensions();
            let (gw, gh) = current.dimensions();
            return Err(Error::DimensionMismatch {
                expected_width: ew,
                expected_height: eh,
                width: gw,
                height: gh,
            });
        }

        let field = farneback::calc_optical_flow_farneback(&reference, current, &self.params())?;
        let (magnitude, direction) = to_polar(field.dx(), field.dy());

        let mut magnitude_max = 0.0f32;
        let mut magnitude_sum = 0.0f64;
        let mut direction_sum = 0.0f64;
        for (&m, &d) in magnitude.iter().zip(&direction) {
            if m > magnitude_max {
                magnitude_max = m;
            }
            magnitude_sum += m as f64;
            direction_sum += d as f64;
        }
        let count = magnitude.len().max(1) as f64;
        let record = DenseMotionRecord {
            magnitude_max,
            magnitude_mean: (magnitude_sum / count) as f32,
            direction_mean: (direction_sum / count) as f32,
        };

        if let Some(dir) = &self.config.image_dir {
            export::write_field_images(
                dir,
                frame_index,
                field.width(),
                field.height(),
                &magnitude,
                &direction,
            )?;
        }

        self.reference = Some(current.clone());
        Ok(vec![record])
    }
}

/// Convert displacement planes to polar form. Angles are in [0, 2*pi), the
/// cartToPolar convention; a zero vector maps to angle 0.
fn to_polar(dx: &[f32], dy: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let mut magnitude = Vec::with_capacity(dx.len());
    let mut direction = Vec::with_capacity(dx.len());
    for (&u, &v) in dx.iter().zip(dy) {
        magnitude.push((u * u + v * v).sqrt());
        let mut angle = v.atan2(u);
        if angle < 0.0 {
            angle += 2.0 * PI;
        }
        direction.push(angle);
    }
    (magnitude, direction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_frame(size: usize, cx: f32, cy: f32) -> Frame {
        Frame::from_fn(size, size, |x, y| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            150.0 * (-(dx * dx + dy * dy) / 200.0).exp()
        })
    }

    fn engine() -> DenseFlowEngine {
        DenseFlowEngine::new(FarnebackConfig {
            levels: 1,
            winsize: 9,
            stride: 1,
            ..FarnebackConfig::default()
        })
    }

    #[test]
    fn test_static_frames_degenerate_record() {
        let frame = blob_frame(48, 24.0, 24.0);
        let mut engine = engine();
        engine.seed(&frame).unwrap();

        let records = engine.estimate(1, &frame).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].magnitude_max < 1e-2);
        assert!(records[0].magnitude_mean < 1e-2);
        assert_eq!(records[0].direction_mean, 0.0);
    }

    #[test]
    fn test_translation_produces_motion() {
        let mut engine = engine();
        engine.seed(&blob_frame(64, 32.0, 32.0)).unwrap();

        let records = engine.estimate(1, &blob_frame(64, 34.0, 32.0)).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].magnitude_max > 1.0);
        assert!(records[0].magnitude_mean > 0.0);
    }

    #[test]
    fn test_reference_advances_between_samples() {
        let mut engine = engine();
        engine.seed(&blob_frame(64, 32.0, 32.0)).unwrap();

        engine.estimate(1, &blob_frame(64, 34.0, 32.0)).unwrap();
        // Same frame again: reference moved, so the field is now static.
        let records = engine.estimate(2, &blob_frame(64, 34.0, 32.0)).unwrap();
        assert!(records[0].magnitude_max < 1e-2);
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let mut engine = engine();
        engine.seed(&blob_frame(48, 24.0, 24.0)).unwrap();

        let result = engine.estimate(1, &blob_frame(64, 32.0, 32.0));
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_estimate_before_seed_rejected() {
        let mut engine = engine();
        let result = engine.estimate(1, &blob_frame(48, 24.0, 24.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_polar_conventions() {
        let (magnitude, direction) = to_polar(&[3.0, 0.0, -1.0], &[4.0, 0.0, 0.0]);
        assert!((magnitude[0] - 5.0).abs() < 1e-5);
        assert_eq!(magnitude[1], 0.0);
        assert_eq!(direction[1], 0.0);
        // Angles wrap into [0, 2*pi)
        assert!((direction[2] - PI).abs() < 1e-5);
        assert!(direction.iter().all(|&a| (0.0..2.0 * PI).contains(&a)));
    }
}
