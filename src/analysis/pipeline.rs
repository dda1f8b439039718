//! One analysis run over a video: sampling, per-frame analysis and aggregation.

use super::captioner::{CaptionChain, CaptionSource};
use super::detectors::{AttributeAnalyzer, ObjectDetector, PersonAttributes};
use super::frame_source::{FrameSource, FrameSourceError, RgbFrame, VideoInfo};
use super::image_stats::{self, FrameStats};
use super::quality;
use super::sampling::{fallback_indices, sample_frame_indices, SamplingLimits};
use super::scenes::segment_scenes;
use crate::video_store::{
    AnalysisResults, AnalysisSummary, Frame, MediaInfo, ObjectDetection, PersonDetection,
    ProcessingStats, Video,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MIN_PERSON_WIDTH_PX: f64 = 30.0;
const MIN_PERSON_HEIGHT_PX: f64 = 50.0;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Video not found: {0}")]
    VideoNotFound(i64),

    #[error("Analysis already running for video {0}")]
    AlreadyRunning(i64),

    #[error("Video {0} is already analyzed")]
    AlreadyAnalyzed(i64),

    #[error(transparent)]
    FrameSource(#[from] FrameSourceError),

    #[error("No frames could be read from the video")]
    NoFrames,

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AnalysisError {
    /// Short failure category stored with a failed video.
    pub fn kind(&self) -> &'static str {
        classify_error_message(&self.to_string())
    }
}

pub fn classify_error_message(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if lower.contains("no such file") {
        "file_not_found"
    } else if lower.contains("permission denied") {
        "permission_denied"
    } else if lower.contains("codec") || lower.contains("format") {
        "unsupported_format"
    } else if lower.contains("memory") {
        "memory_error"
    } else {
        "analysis_error"
    }
}

/// Receives progress of a running analysis.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, percent: i64, message: &str);

    fn media_info(&self, info: &MediaInfo);
}

/// Name of the JPEG holding sampled frame `image_id` of a video.
pub fn frame_image_name(video_id: i64, image_id: i64) -> String {
    format!("video{}_frame{}.jpg", video_id, image_id)
}

/// Video id encoded in a frame image file name.
pub fn video_id_from_image_name(name: &str) -> Option<i64> {
    name.strip_prefix("video")?
        .split_once("_frame")?
        .0
        .parse()
        .ok()
}

/// Delete every frame image of a video. Returns how many files were removed.
pub async fn remove_frame_images(frames_dir: &Path, video_id: i64) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(frames_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if video_id_from_image_name(&name.to_string_lossy()) == Some(video_id) {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

pub struct AnalysisPipeline {
    frame_source: Arc<dyn FrameSource>,
    detector: Arc<dyn ObjectDetector>,
    attributes: Option<Arc<dyn AttributeAnalyzer>>,
    captions: CaptionChain,
    frames_dir: PathBuf,
    limits: SamplingLimits,
}

impl AnalysisPipeline {
    pub fn new(
        frame_source: Arc<dyn FrameSource>,
        detector: Arc<dyn ObjectDetector>,
        attributes: Option<Arc<dyn AttributeAnalyzer>>,
        captions: CaptionChain,
        frames_dir: PathBuf,
        limits: SamplingLimits,
    ) -> Self {
        Self {
            frame_source,
            detector,
            attributes,
            captions,
            frames_dir,
            limits,
        }
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    pub async fn run(
        &self,
        video: &Video,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResults, AnalysisError> {
        let started = Instant::now();
        let path = PathBuf::from(&video.file_path);

        progress.progress(10, "Opening video file");
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FrameSourceError::NotFound(path.clone())
            } else {
                FrameSourceError::Io(e)
            }
        })?;
        if metadata.len() == 0 {
            return Err(FrameSourceError::EmptyFile(path).into());
        }

        let info = self.frame_source.video_info(&path).await?;
        info.validate()?;
        progress.media_info(&info.media_info());
        progress.progress(
            20,
            &format!(
                "Video info: {} frames, {:.1} fps, {:.1}s",
                info.frame_count, info.fps, info.duration
            ),
        );

        let indices = sample_frame_indices(&info, self.limits);
        progress.progress(25, &format!("Sampled {} frames", indices.len()));
        info!(
            "Analyzing video {} ({} sampled frames of {})",
            video.id,
            indices.len(),
            info.frame_count
        );

        if let Err(e) = remove_frame_images(&self.frames_dir, video.id).await {
            warn!("Failed to remove old frame images of video {}: {}", video.id, e);
        }

        let mut stats = ProcessingStats {
            sampled_frames: indices.len(),
            ..Default::default()
        };
        let mut frames = Vec::with_capacity(indices.len());
        let mut frame_stats = Vec::with_capacity(indices.len());

        for (i, &index) in indices.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }

            let Some((actual_index, rgb)) = self.read_with_fallback(&path, index, &info).await
            else {
                stats.failed_frame_reads += 1;
                continue;
            };

            let image_id = frames.len() as i64 + 1;
            let (rgb, pixel_stats) = tokio::task::spawn_blocking(move || {
                let stats = image_stats::analyze_frame(&rgb);
                (rgb, stats)
            })
            .await
            .map_err(|e| AnalysisError::Worker(e.to_string()))?;

            let frame = self
                .analyze_frame(
                    video.id,
                    image_id,
                    &path,
                    actual_index,
                    &info,
                    &rgb,
                    &pixel_stats,
                    &mut stats,
                )
                .await;
            frames.push(frame);
            frame_stats.push(pixel_stats);

            let percent = 30 + (30 * (i + 1) / indices.len()) as i64;
            progress.progress(
                percent,
                &format!("Analyzed frame {}/{}", i + 1, indices.len()),
            );
        }

        if frames.is_empty() {
            return Err(AnalysisError::NoFrames);
        }
        progress.progress(60, &format!("Analyzed {} frames", frames.len()));

        let quality_assessment = quality::assess_quality(&frame_stats);
        progress.progress(70, "Quality assessed");

        let scene_diversity = quality::scene_diversity(&frames);
        let scenes = segment_scenes(&frames);
        progress.progress(80, &format!("Found {} scenes", scenes.len()));

        let key_insights = quality::key_insights(&frames, &quality_assessment, &scene_diversity);
        let temporal_analysis = quality::temporal_analysis(&frames);
        let total_detections = frames
            .iter()
            .map(|f| f.persons.len() + f.objects.len())
            .sum();
        stats.processing_time_ms = started.elapsed().as_millis() as u64;
        progress.progress(90, "Finalizing results");

        Ok(AnalysisResults {
            summary: AnalysisSummary {
                quality_assessment,
                scene_diversity,
                unique_persons: temporal_analysis.peak_person_count,
                temporal_analysis,
                key_insights,
                total_detections,
                stats,
            },
            frames,
            scenes,
        })
    }

    /// Read frame `index`, trying its neighbours when decoding fails.
    async fn read_with_fallback(
        &self,
        path: &Path,
        index: u64,
        info: &VideoInfo,
    ) -> Option<(u64, RgbFrame)> {
        for candidate in fallback_indices(index, info.frame_count) {
            match self.frame_source.read_frame(path, candidate, info).await {
                Ok(frame) => return Some((candidate, frame)),
                Err(e) => debug!("Failed to read frame {}: {}", candidate, e),
            }
        }
        warn!("Skipping frame {}: it and its neighbours are unreadable", index);
        None
    }

    #[allow(clippy::too_many_arguments)]
    async fn analyze_frame(
        &self,
        video_id: i64,
        image_id: i64,
        path: &Path,
        index: u64,
        info: &VideoInfo,
        rgb: &RgbFrame,
        pixel_stats: &FrameStats,
        stats: &mut ProcessingStats,
    ) -> Frame {
        let image_name = frame_image_name(video_id, image_id);
        let jpeg = match self.save_image(path, index, info, &image_name).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Failed to save image of frame {}: {}", image_id, e);
                None
            }
        };

        let mut persons = Vec::new();
        let mut objects = Vec::new();
        if let Some(jpeg) = &jpeg {
            stats.detector_calls += 1;
            let detections = match self.detector.detect(jpeg, rgb.width, rgb.height).await {
                Ok(detections) => detections,
                Err(e) => {
                    stats.detector_failures += 1;
                    warn!("Detector failed on frame {}: {}", image_id, e);
                    Vec::new()
                }
            };
            for detection in detections {
                if detection.is_person() {
                    let attrs = self.person_attributes(jpeg, detection.bbox, rgb, stats).await;
                    let (upper_color, lower_color) =
                        image_stats::clothing_colors(rgb, detection.bbox);
                    persons.push(PersonDetection {
                        id: 0,
                        frame_id: 0,
                        video_id,
                        person_index: persons.len() as i64,
                        bbox: detection.bbox,
                        confidence: detection.confidence,
                        gender: attrs.gender,
                        gender_confidence: attrs.gender_confidence,
                        age_group: attrs.age_group,
                        age_confidence: attrs.age_confidence,
                        estimated_age: attrs.estimated_age,
                        upper_color,
                        lower_color,
                        analysis_source: attrs.source.to_string(),
                    });
                } else {
                    objects.push(ObjectDetection {
                        id: 0,
                        frame_id: 0,
                        video_id,
                        class_name: detection.class_name,
                        confidence: detection.confidence,
                        bbox: detection.bbox,
                    });
                }
            }
        }

        let mut frame = Frame {
            id: 0,
            video_id,
            image_id,
            timestamp: info.timestamp_of(index),
            image_path: jpeg.as_ref().map(|_| image_name),
            caption: None,
            dominant_colors: pixel_stats.dominant_colors.clone(),
            scene: quality::classify_scene(pixel_stats.brightness, pixel_stats.edge_density),
            brightness: pixel_stats.brightness,
            edge_density: pixel_stats.edge_density,
            persons,
            objects,
        };

        let (caption, source) = self.captions.caption(&frame, jpeg.as_deref()).await;
        match source {
            CaptionSource::Llm => stats.llm_captions += 1,
            CaptionSource::Rules => stats.rule_based_captions += 1,
        }
        frame.caption = Some(caption);
        frame
    }

    async fn person_attributes(
        &self,
        jpeg: &[u8],
        bbox: [f64; 4],
        rgb: &RgbFrame,
        stats: &mut ProcessingStats,
    ) -> PersonAttributes {
        let Some(analyzer) = &self.attributes else {
            return PersonAttributes::default();
        };
        let width_px = (bbox[2] - bbox[0]) * rgb.width as f64;
        let height_px = (bbox[3] - bbox[1]) * rgb.height as f64;
        if width_px < MIN_PERSON_WIDTH_PX || height_px < MIN_PERSON_HEIGHT_PX {
            return PersonAttributes::default();
        }

        match analyzer.analyze(jpeg, bbox).await {
            Ok(estimate) => {
                let attrs = PersonAttributes::from_estimate(&estimate);
                if attrs.source == super::detectors::ATTRIBUTE_SOURCE {
                    stats.attribute_successes += 1;
                } else {
                    stats.attribute_failures += 1;
                }
                attrs
            }
            Err(e) => {
                stats.attribute_failures += 1;
                debug!("Attribute analysis failed: {}", e);
                PersonAttributes::default()
            }
        }
    }

    async fn save_image(
        &self,
        path: &Path,
        index: u64,
        info: &VideoInfo,
        image_name: &str,
    ) -> Result<Vec<u8>, FrameSourceError> {
        let dest = self.frames_dir.join(image_name);
        self.frame_source
            .save_frame_image(path, index, info, &dest)
            .await?;
        Ok(tokio::fs::read(&dest).await?)
    }
}
