//! Configuration bundles for the two estimation pipelines.
//!
//! Defaults mirror the original tool's parameter defaults. `validate` runs
//! before any frame is read, so a bad bundle aborts without touching the
//! video or producing partial output.

use std::path::PathBuf;

use crate::{Error, Result};

/// Aggregate the per-pixel flow systems with a Gaussian window instead of
/// the default box window.
pub const FARNEBACK_GAUSSIAN_WINDOW: u32 = 1;

/// Iteration stop criteria for Lucas-Kanade tracking. Both bounds are always
/// active: iteration ends at `max_iterations` or once the update step drops
/// below `epsilon`, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermCriteria {
    pub max_iterations: usize,
    pub epsilon: f32,
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            epsilon: 0.03,
        }
    }
}

/// Configuration for the dense (Farneback) pipeline.
#[derive(Debug, Clone)]
pub struct FarnebackConfig {
    /// Pyramid scale factor in (0, 1).
    pub pyr_scale: f32,

    /// Number of pyramid layers including the full-resolution layer.
    pub levels: usize,

    /// Averaging window size for flow aggregation.
    pub winsize: usize,

    /// Iterations per pyramid level.
    pub iterations: usize,

    /// Neighborhood size of the polynomial expansion (odd).
    pub poly_n: usize,

    /// Gaussian sigma weighting the polynomial expansion.
    pub poly_sigma: f32,

    /// Option bits; only `FARNEBACK_GAUSSIAN_WINDOW` is recognized.
    pub flags: u32,

    /// Number of decoded frames between successive estimations.
    pub stride: usize,

    /// Directory for the per-sample magnitude/direction raster images.
    /// Must already exist. `None` disables the side-channel.
    pub image_dir: Option<PathBuf>,
}

impl Default for FarnebackConfig {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            winsize: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
            flags: 0,
            stride: 15,
            image_dir: None,
        }
    }
}

impl FarnebackConfig {
    /// Check every parameter range. Returns `Error::InvalidConfig` naming
    /// the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::InvalidConfig("stride must be at least 1".into()));
        }
        if !(self.pyr_scale > 0.0 && self.pyr_scale < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "pyr_scale must be in (0, 1), got {}",
                self.pyr_scale
            )));
        }
        if self.levels == 0 {
            return Err(Error::InvalidConfig("levels must be at least 1".into()));
        }
        if self.winsize == 0 {
            return Err(Error::InvalidConfig("winsize must be at least 1".into()));
        }
        if self.iterations == 0 {
            return Err(Error::InvalidConfig("iterations must be at least 1".into()));
        }
        if self.poly_n < 3 || self.poly_n % 2 == 0 {
            return Err(Error::InvalidConfig(format!(
                "poly_n must be odd and at least 3, got {}",
                self.poly_n
            )));
        }
        if self.poly_sigma <= 0.0 {
            return Err(Error::InvalidConfig("poly_sigma must be positive".into()));
        }
        if self.flags & !FARNEBACK_GAUSSIAN_WINDOW != 0 {
            return Err(Error::InvalidConfig(format!(
                "unrecognized flag bits: {:#x}",
                self.flags & !FARNEBACK_GAUSSIAN_WINDOW
            )));
        }
        Ok(())
    }

    /// Whether the Gaussian aggregation window was requested.
    pub fn gaussian_window(&self) -> bool {
        self.flags & FARNEBACK_GAUSSIAN_WINDOW != 0
    }
}

/// Configuration for the sparse (Lucas-Kanade) pipeline.
#[derive(Debug, Clone)]
pub struct LucasKanadeConfig {
    /// Maximum number of corners to seed on the first frame.
    pub max_points: usize,

    /// Relative corner quality threshold in (0, 1].
    pub quality_level: f32,

    /// Minimum distance between seeded corners.
    pub min_distance: f32,

    /// Block size for the corner detector's structure tensor.
    pub block_size: usize,

    /// Tracking search window (width, height).
    pub win_size: (usize, usize),

    /// Number of pyramid reductions for tracking.
    pub max_level: usize,

    /// Iteration stop criteria.
    pub criteria: TermCriteria,

    /// Number of decoded frames between successive estimations.
    pub stride: usize,
}

impl Default for LucasKanadeConfig {
    fn default() -> Self {
        Self {
            max_points: 100,
            quality_level: 0.3,
            min_distance: 7.0,
            block_size: 7,
            win_size: (15, 15),
            max_level: 2,
            criteria: TermCriteria::default(),
            stride: 15,
        }
    }
}

impl LucasKanadeConfig {
    /// Check every parameter range. Returns `Error::InvalidConfig` naming
    /// the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::InvalidConfig("stride must be at least 1".into()));
        }
        if self.max_points == 0 {
            return Err(Error::InvalidConfig("max_points must be at least 1".into()));
        }
        if !(self.quality_level > 0.0 && self.quality_level <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "quality_level must be in (0, 1], got {}",
                self.quality_level
            )));
        }
        if self.min_distance < 0.0 {
            return Err(Error::InvalidConfig("min_distance must be non-negative".into()));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be at least 1".into()));
        }
        if self.win_size.0 < 3 || self.win_size.1 < 3 {
            return Err(Error::InvalidConfig(format!(
                "win_size must be at least 3x3, got {}x{}",
                self.win_size.0, self.win_size.1
            )));
        }
        if self.criteria.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "criteria.max_iterations must be at least 1".into(),
            ));
        }
        if self.criteria.epsilon <= 0.0 {
            return Err(Error::InvalidConfig("criteria.epsilon must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(FarnebackConfig::default().validate().is_ok());
        assert!(LucasKanadeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_stride_rejected() {
        let mut dense = FarnebackConfig::default();
        dense.stride = 0;
        assert!(dense.validate().is_err());

        let mut sparse = LucasKanadeConfig::default();
        sparse.stride = 0;
        assert!(sparse.validate().is_err());
    }

    #[test]
    fn test_pyr_scale_bounds() {
        let mut config = FarnebackConfig::default();
        config.pyr_scale = 1.0;
        assert!(config.validate().is_err());
        config.pyr_scale = 0.0;
        assert!(config.validate().is_err());
        config.pyr_scale = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_even_poly_n_rejected() {
        let mut config = FarnebackConfig::default();
        config.poly_n = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_flags_rejected() {
        let mut config = FarnebackConfig::default();
        config.flags = FARNEBACK_GAUSSIAN_WINDOW;
        assert!(config.validate().is_ok());
        assert!(config.gaussian_window());
        config.flags = 0x8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sparse_quality_level_bounds() {
        let mut config = LucasKanadeConfig::default();
        config.quality_level = 0.0;
        assert!(config.validate().is_err());
        config.quality_level = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sparse_window_bounds() {
        let mut config = LucasKanadeConfig::default();
        config.win_size = (2, 15);
        assert!(config.validate().is_err());
    }
}
