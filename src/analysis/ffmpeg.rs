//! Frame access through the ffmpeg/ffprobe command line tools.

use super::frame_source::{FrameSource, FrameSourceError, RgbFrame, VideoInfo};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub struct FfmpegFrameSource {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegFrameSource {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Check if ffmpeg and ffprobe can be executed.
    pub async fn check_available(&self) -> Result<(), FrameSourceError> {
        for binary in [&self.ffprobe, &self.ffmpeg] {
            let status = Command::new(binary)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(status) if status.success() => {}
                _ => {
                    return Err(FrameSourceError::InspectFailed(format!(
                        "{} not found or not working",
                        binary
                    )))
                }
            }
        }
        Ok(())
    }

    /// Arguments seeking to the frame at `index`.
    fn seek_args(index: u64, info: &VideoInfo) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.3}", info.timestamp_of(index)),
        ]
    }
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Parses ffprobe rates such as "30000/1001" or "25".
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value > 0.0).then_some(value)
}

fn parse_ffprobe_output(stdout: &str) -> Result<VideoInfo, FrameSourceError> {
    let parsed: FfprobeOutput = serde_json::from_str(stdout)
        .map_err(|e| FrameSourceError::InspectFailed(format!("JSON parse error: {}", e)))?;

    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| FrameSourceError::InvalidFormat("No video stream found".to_string()))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let duration = stream
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps).round().max(0.0) as u64);

    Ok(VideoInfo {
        frame_count,
        fps,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        duration,
    })
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn video_info(&self, path: &Path) -> Result<VideoInfo, FrameSourceError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameSourceError::InspectFailed(format!(
                "unsupported format or codec: {}",
                stderr.trim()
            )));
        }

        let info = parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            "Read info of {:?}: {} frames at {:.2} fps, {}x{}, {:.1}s",
            path, info.frame_count, info.fps, info.width, info.height, info.duration
        );
        Ok(info)
    }

    async fn read_frame(
        &self,
        path: &Path,
        index: u64,
        info: &VideoInfo,
    ) -> Result<RgbFrame, FrameSourceError> {
        let output = Command::new(&self.ffmpeg)
            .args(Self::seek_args(index, info))
            .arg("-i")
            .arg(path)
            .args([
                "-frames:v",
                "1",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", info.width, info.height),
                "pipe:1",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameSourceError::DecodeFailed(stderr.trim().to_string()));
        }
        if output.stdout.is_empty() {
            return Err(FrameSourceError::DecodeFailed(format!(
                "no data for frame {}",
                index
            )));
        }

        RgbFrame::new(info.width, info.height, output.stdout)
    }

    async fn save_frame_image(
        &self,
        path: &Path,
        index: u64,
        info: &VideoInfo,
        dest: &Path,
    ) -> Result<(), FrameSourceError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = Command::new(&self.ffmpeg)
            .args(Self::seek_args(index, info))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-q:v", "2", "-y"])
            .arg(dest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameSourceError::DecodeFailed(stderr.trim().to_string()));
        }
        Ok(())
    }
}
