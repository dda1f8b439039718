//! Video analysis: frame sampling, per-frame statistics, detections, captions
//! and video-level aggregates, run as one background task per video.

mod captioner;
mod detectors;
mod ffmpeg;
mod frame_source;
mod image_stats;
mod manager;
mod pipeline;
mod quality;
mod sampling;
mod scenes;

pub use captioner::{
    people_phrase, CaptionChain, CaptionError, CaptionSource, Captioner, LlmCaptioner,
    RuleBasedCaptioner,
};
pub use detectors::{
    age_to_group, normalize_gender, AttributeAnalyzer, AttributeEstimate, Detection,
    DetectorError, HttpAttributeAnalyzer, HttpObjectDetector, NoopDetector, ObjectDetector,
    PersonAttributes, ATTRIBUTE_SOURCE,
};
pub use ffmpeg::FfmpegFrameSource;
pub use frame_source::{FrameSource, FrameSourceError, RgbFrame, VideoInfo};
pub use image_stats::{hue_color_name, rgb_to_hsv, UNKNOWN_COLOR};
pub use manager::{AnalysisManager, SyncReport, INTERRUPTED_MESSAGE, NO_RESULTS_MESSAGE};
pub use pipeline::{
    classify_error_message, frame_image_name, remove_frame_images, video_id_from_image_name,
    AnalysisError, AnalysisPipeline, ProgressSink,
};
pub use sampling::{sample_frame_indices, sampling_interval, SamplingLimits};
