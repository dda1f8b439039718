//! Test fixtures: synthetic video bytes and fake analysis collaborators
//!
//! The server is wired with these instead of ffmpeg and HTTP detectors, so
//! analyses finish in milliseconds and always see the same street scene: a
//! person in a red top and blue trousers next to a car.

use async_trait::async_trait;
use std::path::Path;
use video_chat_server::analysis::{
    AttributeAnalyzer, AttributeEstimate, Detection, DetectorError, FrameSource,
    FrameSourceError, ObjectDetector, RgbFrame, VideoInfo,
};

const FRAME_SIZE: u32 = 200;

/// Smallest byte prefix recognized as an MP4 container.
pub fn mp4_bytes() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    data.extend_from_slice(b"isomiso2avc1mp41");
    data.extend_from_slice(&[0u8; 64]);
    data
}

/// JFIF header followed by padding; enough for content sniffing.
pub fn jpeg_bytes() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    data.extend_from_slice(b"JFIF\0");
    data.extend_from_slice(&[0u8; 32]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// A gray street with one person: red shirt over blue trousers in the
/// middle third of the frame.
pub struct StreetFrameSource {
    pub frame_count: u64,
    pub fps: f64,
}

#[async_trait]
impl FrameSource for StreetFrameSource {
    async fn video_info(&self, _path: &Path) -> Result<VideoInfo, FrameSourceError> {
        Ok(VideoInfo {
            frame_count: self.frame_count,
            fps: self.fps,
            width: FRAME_SIZE,
            height: FRAME_SIZE,
            duration: self.frame_count as f64 / self.fps,
        })
    }

    async fn read_frame(
        &self,
        _path: &Path,
        _index: u64,
        info: &VideoInfo,
    ) -> Result<RgbFrame, FrameSourceError> {
        let mut frame = RgbFrame::solid(info.width, info.height, [128, 128, 128]);
        let half = info.height / 2;
        for y in 0..info.height {
            for x in info.width / 4..info.width * 3 / 4 {
                let rgb = if y < half { [200, 20, 20] } else { [20, 20, 200] };
                frame.set_pixel(x, y, rgb);
            }
        }
        Ok(frame)
    }

    async fn save_frame_image(
        &self,
        _path: &Path,
        _index: u64,
        _info: &VideoInfo,
        dest: &Path,
    ) -> Result<(), FrameSourceError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, jpeg_bytes()).await?;
        Ok(())
    }
}

/// Sees the person and a parked car in every frame.
pub struct StreetDetector;

#[async_trait]
impl ObjectDetector for StreetDetector {
    fn name(&self) -> &str {
        "street"
    }

    async fn detect(
        &self,
        _jpeg: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<Detection>, DetectorError> {
        Ok(vec![
            Detection {
                class_name: "person".to_string(),
                confidence: 0.92,
                bbox: [0.25, 0.0, 0.75, 1.0],
            },
            Detection {
                class_name: "car".to_string(),
                confidence: 0.81,
                bbox: [0.0, 0.6, 0.2, 1.0],
            },
        ])
    }
}

/// Judges every person a man in his thirties.
pub struct FixedAttributes;

#[async_trait]
impl AttributeAnalyzer for FixedAttributes {
    async fn analyze(
        &self,
        _jpeg: &[u8],
        _bbox: [f64; 4],
    ) -> Result<AttributeEstimate, DetectorError> {
        Ok(AttributeEstimate {
            gender: "Man".to_string(),
            gender_confidence: 0.9,
            age: 34.0,
        })
    }
}
