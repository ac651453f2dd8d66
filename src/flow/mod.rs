//! Flow engines: the pluggable estimation step of the pipeline loop.
//!
//! Both pipelines share one loop (see `pipeline`); what differs is the
//! estimation performed on each sampled frame and the reference state
//! carried between samples. `FlowEngine` is that seam.

mod dense;
mod sparse;

pub use dense::DenseFlowEngine;
pub use sparse::SparseFlowEngine;

use crate::frame::Frame;
use crate::Result;

/// One flow estimation strategy plus the reference state it carries.
///
/// The driver calls `seed` exactly once with the first decoded frame, then
/// `estimate` once per sampled frame. Implementations own their reference
/// state exclusively and replace it wholesale after each successful
/// estimation; the reference never advances on skipped frames, so larger
/// strides compare more temporally distant frame pairs by design.
pub trait FlowEngine {
    /// Measurement type emitted per sampled frame.
    type Record;

    /// Install the reference state from the first decoded frame.
    fn seed(&mut self, first: &Frame) -> Result<()>;

    /// Estimate motion between the reference state and `current`, emit the
    /// records for this sample, and advance the reference state.
    ///
    /// # Arguments
    /// * `frame_index` - Decoded-frame index of `current` (used for
    ///   side-channel naming)
    /// * `current` - The sampled frame
    fn estimate(&mut self, frame_index: u64, current: &Frame) -> Result<Vec<Self::Record>>;
}
