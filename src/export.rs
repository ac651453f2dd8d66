//! CSV export and the dense pipeline's raster side-channel.
//!
//! Writers are plain buffered text output with fixed formatting, so
//! exporting the same record sequence twice produces byte-identical files.
//! CSV files are only ever written from fully materialized sequences after
//! a pipeline run completes; an aborted run writes nothing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::GrayImage;

use crate::records::{DenseMotionRecord, SparseMotionRecord};
use crate::Result;

/// Write dense records as CSV: one row per sampled frame.
pub fn export_dense_csv<P: AsRef<Path>>(records: &[DenseMotionRecord], path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "magnitude_max,magnitude_moyenne,direction_moyenne")?;
    for record in records {
        writeln!(
            writer,
            "{:.6},{:.6},{:.6}",
            record.magnitude_max, record.magnitude_mean, record.direction_mean
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Write sparse records as CSV: one row per surviving tracked point per
/// sampled frame.
pub fn export_sparse_csv<P: AsRef<Path>>(records: &[SparseMotionRecord], path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "x_initial,y_initial,u_deplacement,v_deplacement,magnitude,direction"
    )?;
    for record in records {
        writeln!(
            writer,
            "{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            record.x_initial,
            record.y_initial,
            record.u_displacement,
            record.v_displacement,
            record.magnitude,
            record.direction
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Persist the per-pixel magnitude and direction grids of one sampled frame
/// as grayscale images, named `mag<idx>.png` and `dir<idx>.png`.
///
/// Each grid is min-max normalized to the 8-bit range. The target directory
/// must already exist; it is never created here.
pub fn write_field_images(
    dir: &Path,
    frame_index: u64,
    width: usize,
    height: usize,
    magnitude: &[f32],
    direction: &[f32],
) -> Result<()> {
    let mag_image = grid_to_gray(width, height, magnitude);
    let dir_image = grid_to_gray(width, height, direction);

    mag_image.save(dir.join(format!("mag{}.png", frame_index)))?;
    dir_image.save(dir.join(format!("dir{}.png", frame_index)))?;
    Ok(())
}

/// Min-max normalize a grid into an 8-bit grayscale image. A constant grid
/// renders black.
fn grid_to_gray(width: usize, height: usize, grid: &[f32]) -> GrayImage {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in grid {
        min = min.min(v);
        max = max.max(v);
    }
    let span = max - min;
    let scale = if span > 0.0 { 255.0 / span } else { 0.0 };

    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let v = grid[y as usize * width + x as usize];
        image::Luma([((v - min) * scale).round().clamp(0.0, 255.0) as u8])
    })
}
