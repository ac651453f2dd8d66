//! Sparse (Lucas-Kanade) flow engine.

use tracing::warn;

use crate::config::LucasKanadeConfig;
use crate::flow::FlowEngine;
use crate::frame::Frame;
use crate::internal::corners::{self, CornerParams};
use crate::internal::pyr_lk::{self, PyrLkParams};
use crate::records::SparseMotionRecord;
use crate::{Error, Result};

/// Reference state carried between samples: the baseline frame and the
/// point set being tracked through it.
struct SparseReference {
    frame: Frame,
    points: Vec<[f32; 2]>,
}

/// Feature-point motion estimation between the reference frame and each
/// sampled frame.
///
/// Corners are detected once, on the first decoded frame. Every sample
/// tracks the surviving points into the current frame, drops the ones that
/// failed, and emits one record per survivor. Lost points are never
/// re-detected, so the point count only ever shrinks; an empty point set is
/// valid and simply yields empty record groups.
pub struct SparseFlowEngine {
    config: LucasKanadeConfig,
    state: Option<SparseReference>,
}

impl SparseFlowEngine {
    pub fn new(config: LucasKanadeConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Number of points currently being tracked.
    pub fn tracked_point_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.points.len())
    }

    fn corner_params(&self) -> CornerParams {
        CornerParams {
            max_points: self.config.max_points,
            quality_level: self.config.quality_level,
            min_distance: self.config.min_distance,
            block_size: self.config.block_size,
        }
    }

    fn lk_params(&self) -> PyrLkParams {
        PyrLkParams {
            win_size: self.config.win_size,
            max_level: self.config.max_level,
            max_iterations: self.config.criteria.max_iterations,
            epsilon: self.config.criteria.epsilon,
        }
    }
}

impl FlowEngine for SparseFlowEngine {
    type Record = SparseMotionRecord;

    fn seed(&mut self, first: &Frame) -> Result<()> {
        let points = corners::good_features_to_track(first, &self.corner_params());
        if points.is_empty() {
            warn!("no corners detected on the seed frame; all samples will be empty");
        }
        self.state = Some(SparseReference {
            frame: first.clone(),
            points,
        });
        Ok(())
    }

    fn estimate(&mut self, _frame_index: u64, current: &Frame) -> Result<Vec<SparseMotionRecord>> {
        let SparseReference { frame: reference, points } =
            self.state.take().ok_or_else(|| {
                Error::InvalidConfig("flow engine must be seeded before estimating".into())
            })?;

        if points.is_empty() {
            // Tracking set already exhausted; keep the loop running.
            self.state = Some(SparseReference {
                frame: current.clone(),
                points,
            });
            return Ok(Vec::new());
        }

        let result = pyr_lk::calc_optical_flow_pyr_lk(&reference, current, &points, &self.lk_params());

        let mut records = Vec::new();
        let mut survivors = Vec::new();
        for ((origin, tracked), ok) in points
            .iter()
            .zip(&result.next_points)
            .zip(&result.status)
        {
            if !ok {
                continue;
            }
            let u = tracked[0] - origin[0];
            let v = tracked[1] - origin[1];
            records.push(SparseMotionRecord {
                x_initial: origin[0],
                y_initial: origin[1],
                u_displacement: u,
                v_displacement: v,
                magnitude: (u * u + v * v).sqrt(),
                direction: v.atan2(u),
            });
            survivors.push(*tracked);
        }

        self.state = Some(SparseReference {
            frame: current.clone(),
            points: survivors,
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LucasKanadeConfig {
        LucasKanadeConfig {
            max_points: 10,
            quality_level: 0.2,
            min_distance: 5.0,
            block_size: 3,
            win_size: (21, 21),
            max_level: 2,
            stride: 1,
            ..LucasKanadeConfig::default()
        }
    }

    /// Bright square on a dark background, offset by (ox, oy).
    fn square_frame(ox: i32, oy: i32) -> Frame {
        Frame::from_fn(64, 64, |x, y| {
            let x = x as i32 - ox;
            let y = y as i32 - oy;
            if (20..40).contains(&x) && (20..40).contains(&y) {
                200.0
            } else {
                20.0
            }
        })
    }

    #[test]
    fn test_seed_detects_points() {
        let mut engine = SparseFlowEngine::new(config());
        engine.seed(&square_frame(0, 0)).unwrap();
        assert!(engine.tracked_point_count() > 0);
    }

    #[test]
    fn test_translation_measured_per_point() {
        let mut engine = SparseFlowEngine::new(config());
        engine.seed(&square_frame(0, 0)).unwrap();
        let seeded = engine.tracked_point_count();
        assert!(seeded > 0);

        let records = engine.estimate(1, &square_frame(3, 2)).unwrap();
        assert!(!records.is_empty());
        assert!(records.len() <= seeded);
        for r in &records {
            assert!((r.u_displacement - 3.0).abs() < 0.7, "u = {}", r.u_displacement);
            assert!((r.v_displacement - 2.0).abs() < 0.7, "v = {}", r.v_displacement);
            let expected_mag = (13.0f32).sqrt();
            assert!((r.magnitude - expected_mag).abs() < 1.0);
        }
    }

    #[test]
    fn test_point_count_non_increasing() {
        let mut engine = SparseFlowEngine::new(config());
        engine.seed(&square_frame(0, 0)).unwrap();

        let mut previous = engine.tracked_point_count();
        for step in 1..5 {
            engine.estimate(step, &square_frame(step as i32, 0)).unwrap();
            let now = engine.tracked_point_count();
            assert!(now <= previous, "point count grew: {} -> {}", previous, now);
            previous = now;
        }
    }

    #[test]
    fn test_flat_seed_frame_yields_empty_samples() {
        let flat = Frame::from_fn(64, 64, |_, _| 100.0);
        let mut engine = SparseFlowEngine::new(config());
        engine.seed(&flat).unwrap();
        assert_eq!(engine.tracked_point_count(), 0);

        let records = engine.estimate(1, &square_frame(0, 0)).unwrap();
        assert!(records.is_empty());
        // The loop keeps going; later samples stay empty too.
        let records = engine.estimate(2, &square_frame(1, 0)).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_estimate_before_seed_rejected() {
        let mut engine = SparseFlowEngine::new(config());
        assert!(engine.estimate(1, &square_frame(0, 0)).is_err());
    }
}
