//! The shared estimation loop.
//!
//! Both pipelines are the same sequential loop: read the first frame to
//! seed the engine's reference state, then decode frames one by one,
//! letting the sampler gate which of them trigger an estimation. The loop
//! is single-threaded and run-to-completion; the frame source is released
//! by drop on every exit path, normal or early.

use std::path::Path;

use tracing::{debug, info};

use crate::config::{FarnebackConfig, LucasKanadeConfig};
use crate::flow::{DenseFlowEngine, FlowEngine, SparseFlowEngine};
use crate::records::{DenseMotionRecord, SampleGroup, SparseMotionRecord};
use crate::sampler::FrameSampler;
use crate::source::{FrameSource, ImageSequenceSource};
use crate::{Error, Result};

/// Drive `engine` over `source`, estimating on every `stride`-th frame.
///
/// The first decoded frame seeds the engine and is never sampled. A source
/// that yields no frames at all is `Error::EmptyStream`; a source that runs
/// out mid-loop ends the run normally with whatever was accumulated.
///
/// # Returns
/// One `SampleGroup` per sampled frame, in temporal order.
pub fn run_pipeline<S, E>(
    source: &mut S,
    engine: &mut E,
    stride: usize,
) -> Result<Vec<SampleGroup<E::Record>>>
where
    S: FrameSource,
    E: FlowEngine,
{
    let first = source.read_frame().ok_or(Error::EmptyStream)?;
    engine.seed(&first)?;

    let mut sampler = FrameSampler::new(stride)?;
    let mut groups = Vec::new();

    while let Some(frame) = source.read_frame() {
        if !sampler.advance() {
            continue;
        }

        let records = engine.estimate(sampler.frame_index(), &frame)?;
        debug!(
            frame_index = sampler.frame_index(),
            records = records.len(),
            "estimated sampled frame"
        );
        groups.push(SampleGroup {
            frame_index: sampler.frame_index(),
            records,
        });
    }

    info!(
        frames = sampler.frame_index() + 1,
        samples = groups.len(),
        "stream ended"
    );
    Ok(groups)
}

/// Run the dense (Farneback) pipeline over a frame directory and return the
/// flattened record sequence.
pub fn estimate_dense_flow<P: AsRef<Path>>(
    path: P,
    config: &FarnebackConfig,
) -> Result<Vec<DenseMotionRecord>> {
    config.validate()?;
    let mut source = ImageSequenceSource::open(path)?;
    estimate_dense_flow_from(&mut source, config)
}

/// Run the dense (Farneback) pipeline over any frame source.
pub fn estimate_dense_flow_from<S: FrameSource>(
    source: &mut S,
    config: &FarnebackConfig,
) -> Result<Vec<DenseMotionRecord>> {
    config.validate()?;
    let mut engine = DenseFlowEngine::new(config.clone());
    let groups = run_pipeline(source, &mut engine, config.stride)?;
    Ok(groups.into_iter().flat_map(|g| g.records).collect())
}

/// Run the sparse (Lucas-Kanade) pipeline over a frame directory and return
/// the flattened record sequence.
pub fn estimate_sparse_flow<P: AsRef<Path>>(
    path: P,
    config: &LucasKanadeConfig,
) -> Result<Vec<SparseMotionRecord>> {
    config.validate()?;
    let mut source = ImageSequenceSource::open(path)?;
    estimate_sparse_flow_from(&mut source, config)
}

/// Run the sparse (Lucas-Kanade) pipeline over any frame source.
pub fn estimate_sparse_flow_from<S: FrameSource>(
    source: &mut S,
    config: &LucasKanadeConfig,
) -> Result<Vec<SparseMotionRecord>> {
    config.validate()?;
    let mut engine = SparseFlowEngine::new(config.clone());
    let groups = run_pipeline(source, &mut engine, config.stride)?;
    Ok(groups.into_iter().flat_map(|g| g.records).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::source::MemorySource;

    /// Engine stub that records which frame indices were estimated.
    struct ProbeEngine {
        seeded: bool,
        estimated: Vec<u64>,
    }

    impl ProbeEngine {
        fn new() -> Self {
            Self {
                seeded: false,
                estimated: Vec::new(),
            }
        }
    }

    impl FlowEngine for ProbeEngine {
        type Record = u64;

        fn seed(&mut self, _first: &Frame) -> Result<()> {
            self.seeded = true;
            Ok(())
        }

        fn estimate(&mut self, frame_index: u64, _current: &Frame) -> Result<Vec<u64>> {
            self.estimated.push(frame_index);
            Ok(vec![frame_index])
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n).map(|i| Frame::from_fn(8, 8, move |_, _| i as f32)).collect()
    }

    #[test]
    fn test_empty_source_is_empty_stream_error() {
        let mut source = MemorySource::new(Vec::new());
        let mut engine = ProbeEngine::new();
        let result = run_pipeline(&mut source, &mut engine, 1);
        assert!(matches!(result, Err(Error::EmptyStream)));
        assert!(!engine.seeded);
    }

    #[test]
    fn test_single_frame_seeds_without_sampling() {
        let mut source = MemorySource::new(frames(1));
        let mut engine = ProbeEngine::new();
        let groups = run_pipeline(&mut source, &mut engine, 1).unwrap();
        assert!(engine.seeded);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_sampling_events_match_stride() {
        // 1 seed frame + 45 decoded frames, stride 15 -> samples at 15, 30, 45.
        let mut source = MemorySource::new(frames(46));
        let mut engine = ProbeEngine::new();
        let groups = run_pipeline(&mut source, &mut engine, 15).unwrap();

        assert_eq!(engine.estimated, vec![15, 30, 45]);
        let indices: Vec<u64> = groups.iter().map(|g| g.frame_index).collect();
        assert_eq!(indices, vec![15, 30, 45]);
    }

    #[test]
    fn test_groups_preserve_temporal_order() {
        let mut source = MemorySource::new(frames(10));
        let mut engine = ProbeEngine::new();
        let groups = run_pipeline(&mut source, &mut engine, 2).unwrap();

        let indices: Vec<u64> = groups.iter().map(|g| g.frame_index).collect();
        assert_eq!(indices, vec![2, 4, 6, 8]);
        for group in &groups {
            assert_eq!(group.records, vec![group.frame_index]);
        }
    }

    #[test]
    fn test_invalid_config_rejected_before_reading() {
        let mut source = MemorySource::new(frames(5));
        let config = FarnebackConfig {
            stride: 0,
            ..FarnebackConfig::default()
        };
        let result = estimate_dense_flow_from(&mut source, &config);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        // Nothing was consumed from the source.
        assert!(source.read_frame().is_some());
    }

    #[test]
    fn test_missing_path_is_open_error() {
        let result = estimate_dense_flow("/nonexistent/frames", &FarnebackConfig::default());
        assert!(matches!(result, Err(Error::Open { .. })));
    }
}
