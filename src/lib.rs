//! # Optiflow - Video Motion Statistics
//!
//! Rust port of a Python/OpenCV optical-flow analysis tool.
//!
//! The crate samples frames from a video stream and estimates the motion
//! between a reference frame and each sampled frame, exporting per-sample
//! motion statistics as CSV for later visualization.
//!
//! ## Features
//!
//! - Dense whole-field estimation (Farneback polynomial expansion)
//! - Sparse feature-point tracking (pyramidal Lucas-Kanade over
//!   Shi-Tomasi corners)
//! - Configurable frame sampling stride shared by both pipelines
//! - CSV export plus optional per-sample magnitude/direction rasters
//!
//! ## Example
//!
//! ```rust,ignore
//! use optiflow_rs::{estimate_sparse_flow, export_sparse_csv, LucasKanadeConfig};
//!
//! let config = LucasKanadeConfig { max_points: 150, stride: 10, ..Default::default() };
//! let records = estimate_sparse_flow("frames/", &config)?;
//! export_sparse_csv(&records, "resultats_flot_optique.csv")?;
//! ```

// Internal modules (ports of the OpenCV primitives the Python tool called)
pub(crate) mod internal;

// Public modules
pub mod config;
pub mod export;
pub mod flow;
pub mod frame;
pub mod pipeline;
pub mod records;
pub mod sampler;
pub mod source;

// Re-exports for convenience
pub use config::{FarnebackConfig, LucasKanadeConfig, TermCriteria, FARNEBACK_GAUSSIAN_WINDOW};
pub use export::{export_dense_csv, export_sparse_csv, write_field_images};
pub use flow::{DenseFlowEngine, FlowEngine, SparseFlowEngine};
pub use frame::Frame;
pub use pipeline::{
    estimate_dense_flow, estimate_dense_flow_from, estimate_sparse_flow,
    estimate_sparse_flow_from, run_pipeline,
};
pub use records::{DenseMotionRecord, SampleGroup, SparseMotionRecord};
pub use sampler::FrameSampler;
pub use source::{FrameSource, ImageSequenceSource, MemorySource};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use std::path::PathBuf;

    use thiserror::Error;

    /// Errors that can occur in the optiflow library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("cannot open video source {path:?}: {reason}")]
        Open { path: PathBuf, reason: String },

        #[error("video stream contains no frames")]
        EmptyStream,

        #[error("frame dimensions changed mid-stream: expected {expected_width}x{expected_height}, got {width}x{height}")]
        DimensionMismatch {
            expected_width: usize,
            expected_height: usize,
            width: usize,
            height: usize,
        },

        #[error("invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("invalid frame buffer: {width}x{height} requires {expected} samples, got {got}")]
        FrameShape {
            width: usize,
            height: usize,
            expected: usize,
            got: usize,
        },

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),

        #[error("image error: {0}")]
        Image(#[from] image::ImageError),
    }

    /// Result type for optiflow operations
    pub type Result<T> = std::result::Result<T, Error>;
}
