//! Motion measurement records produced by the pipelines.

/// Whole-field summary for one sampled frame of the dense pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseMotionRecord {
    /// Largest displacement magnitude in the field.
    pub magnitude_max: f32,
    /// Mean displacement magnitude over the field.
    pub magnitude_mean: f32,
    /// Mean displacement angle over the field, radians in [0, 2*pi).
    pub direction_mean: f32,
}

/// Per-point measurement for one sampled frame of the sparse pipeline.
///
/// One record per surviving tracked point; a sampled frame contributes as
/// many records as points that tracked successfully, possibly zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseMotionRecord {
    /// Point position in the reference frame.
    pub x_initial: f32,
    pub y_initial: f32,
    /// Displacement from the reference frame into the current frame.
    pub u_displacement: f32,
    pub v_displacement: f32,
    /// Euclidean norm of the displacement.
    pub magnitude: f32,
    /// Displacement angle, radians in (-pi, pi].
    pub direction: f32,
}

/// Records emitted for a single sampled frame.
///
/// Groups keep their sampled-frame cardinality (always one record for the
/// dense pipeline, zero or more for the sparse one); the exporter flattens
/// them in insertion order.
#[derive(Debug, Clone)]
pub struct SampleGroup<R> {
    /// Index of the decoded frame that triggered this estimation.
    pub frame_index: u64,
    /// Measurements for this sample, in emission order.
    pub records: Vec<R>,
}
