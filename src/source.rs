//! Frame sources: sequential access to decoded grayscale frames.
//!
//! Container decoding stays behind the `FrameSource` trait; any decoder can
//! implement it. The shipped implementations read a directory of image
//! files (a decoded video surrogate) or an in-memory frame list.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::frame::Frame;
use crate::{Error, Result};

/// Sequential-only access to the frames of one video.
///
/// `read_frame` yields decoded frames in order and `None` at end of stream.
/// Opening is the implementor's constructor; release happens on drop, so
/// every exit path of a pipeline closes the source exactly once.
pub trait FrameSource {
    /// Read the next frame, or `None` when the stream is exhausted.
    fn read_frame(&mut self) -> Option<Frame>;
}

/// Frame source over a directory of image files, ordered by file name.
///
/// Each file is decoded and converted to grayscale on read. A file that
/// fails to decode mid-run ends the stream; it is not an error, matching
/// how a truncated video simply stops yielding frames.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm"];

impl ImageSequenceSource {
    /// Open a frame directory.
    ///
    /// Fails with `Error::Open` when the directory cannot be read. A
    /// readable directory with no image files opens successfully and
    /// reports end of stream on the first read.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| Error::Open {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        let ext = ext.to_ascii_lowercase();
                        IMAGE_EXTENSIONS.iter().any(|&e| e == ext)
                    })
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        Ok(Self { paths, cursor: 0 })
    }

    /// Number of frame files discovered at open time.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the directory contained no frame files.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Option<Frame> {
        let path = self.paths.get(self.cursor)?;
        self.cursor += 1;
        let image = image::open(path).ok()?;
        Some(Frame::from_gray_image(&image.to_luma8()))
    }
}

/// Frame source over a pre-built frame list. Used by tests and by callers
/// that decode frames themselves.
pub struct MemorySource {
    frames: VecDeque<Frame>,
}

impl MemorySource {
    pub fn new<I: IntoIterator<Item = Frame>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}
