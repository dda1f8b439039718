//! Access to the decoded frames of a video file.

use crate::video_store::MediaInfo;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("No such file or directory: {0:?}")]
    NotFound(PathBuf),

    #[error("Video file is empty: {0:?}")]
    EmptyFile(PathBuf),

    #[error("Reading video info failed: {0}")]
    InspectFailed(String),

    #[error("Frame decode failed: {0}")]
    DecodeFailed(String),

    #[error("Invalid video format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Container-level facts needed to sample a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub frame_count: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Seconds.
    pub duration: f64,
}

impl VideoInfo {
    pub fn validate(&self) -> Result<(), FrameSourceError> {
        if self.frame_count == 0 {
            return Err(FrameSourceError::InvalidFormat(
                "video reports no frames".to_string(),
            ));
        }
        if !(self.fps > 0.0) {
            return Err(FrameSourceError::InvalidFormat(format!(
                "invalid frame rate {}",
                self.fps
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(FrameSourceError::InvalidFormat(format!(
                "invalid resolution {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    pub fn timestamp_of(&self, index: u64) -> f64 {
        if self.fps > 0.0 {
            index as f64 / self.fps
        } else {
            0.0
        }
    }

    pub fn media_info(&self) -> MediaInfo {
        MediaInfo {
            duration: self.duration,
            fps: self.fps,
            width: self.width as i64,
            height: self.height as i64,
            frame_count: self.frame_count as i64,
        }
    }
}

/// A decoded frame as packed 8-bit RGB.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameSourceError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameSourceError::DecodeFailed(format!(
                "expected {} bytes for {}x{} rgb24, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with a single color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        self.data[offset..offset + 3].copy_from_slice(&rgb);
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Decodes frames of a video file. The default implementation drives ffmpeg.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn video_info(&self, path: &Path) -> Result<VideoInfo, FrameSourceError>;

    async fn read_frame(
        &self,
        path: &Path,
        index: u64,
        info: &VideoInfo,
    ) -> Result<RgbFrame, FrameSourceError>;

    /// Write frame `index` as a JPEG at `dest`.
    async fn save_frame_image(
        &self,
        path: &Path,
        index: u64,
        info: &VideoInfo,
        dest: &Path,
    ) -> Result<(), FrameSourceError>;
}
