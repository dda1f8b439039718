//! Data types persisted by the video store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a video's analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Analyzing => "analyzing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AnalysisStatus::Pending),
            "analyzing" => Some(AnalysisStatus::Analyzing),
            "completed" => Some(AnalysisStatus::Completed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded video and the state of its analysis.
#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub id: i64,
    /// Name of the stored file (unique, derived from the upload).
    pub filename: String,
    /// Name the user uploaded the file with (renamable).
    pub original_name: String,
    pub file_path: String,
    pub file_size: i64,
    /// Hex-encoded SHA-256 of the uploaded bytes.
    pub content_hash: String,
    pub duration: Option<f64>,
    pub fps: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub frame_count: Option<i64>,
    pub analysis_status: AnalysisStatus,
    pub analysis_progress: i64,
    pub analysis_message: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Video {
    pub fn is_analyzed(&self) -> bool {
        self.analysis_status == AnalysisStatus::Completed
    }
}

/// Fields needed to register a freshly uploaded video.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub filename: String,
    pub original_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_hash: String,
}

/// Container-level facts about a video, as reported by the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: f64,
    pub fps: f64,
    pub width: i64,
    pub height: i64,
    pub frame_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    Indoor,
    Outdoor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lighting {
    Bright,
    Normal,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneComplexity {
    Simple,
    Medium,
    Detailed,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Setting { Indoor => "indoor", Outdoor => "outdoor" });
text_enum!(Lighting { Bright => "bright", Normal => "normal", Dark => "dark" });
text_enum!(ActivityLevel { Low => "low", Medium => "medium", High => "high" });
text_enum!(SceneComplexity { Simple => "simple", Medium => "medium", Detailed => "detailed" });

/// Scene-level attributes derived from a frame's pixel statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneAttributes {
    pub setting: Setting,
    pub lighting: Lighting,
    pub activity_level: ActivityLevel,
    pub complexity: SceneComplexity,
}

/// A named color covering part of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorTag {
    pub color: String,
    pub ratio: f64,
    pub confidence: f64,
}

/// A person found in a frame, with classifier attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDetection {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub frame_id: i64,
    #[serde(default)]
    pub video_id: i64,
    pub person_index: i64,
    /// Normalized `[x1, y1, x2, y2]`.
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub gender: String,
    pub gender_confidence: f64,
    pub age_group: String,
    pub age_confidence: f64,
    pub estimated_age: Option<i64>,
    pub upper_color: String,
    pub lower_color: String,
    pub analysis_source: String,
}

/// A non-person object found by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub frame_id: i64,
    #[serde(default)]
    pub video_id: i64,
    pub class_name: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

/// One sampled frame with its detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub video_id: i64,
    /// 1-based position among the sampled frames of the video.
    pub image_id: i64,
    pub timestamp: f64,
    pub image_path: Option<String>,
    pub caption: Option<String>,
    pub dominant_colors: Vec<ColorTag>,
    pub scene: SceneAttributes,
    pub brightness: f64,
    pub edge_density: f64,
    #[serde(default)]
    pub persons: Vec<PersonDetection>,
    #[serde(default)]
    pub objects: Vec<ObjectDetection>,
}

impl Frame {
    pub fn caption_lower(&self) -> String {
        self.caption.as_deref().unwrap_or_default().to_lowercase()
    }
}

/// A contiguous run of frames sharing the same setting and dominant objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub video_id: i64,
    pub scene_index: i64,
    pub start_time: f64,
    pub end_time: f64,
    pub start_frame: i64,
    pub end_frame: i64,
    pub setting: Setting,
    pub lighting: Lighting,
    pub activity_level: ActivityLevel,
    pub dominant_objects: Vec<String>,
    pub caption: Option<String>,
    pub frame_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub overall_score: f64,
    pub status: String,
    pub brightness_score: f64,
    pub contrast_score: f64,
    pub sharpness_score: f64,
    pub color_balance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDiversity {
    pub scene_type_distribution: std::collections::BTreeMap<String, usize>,
    pub activity_level_distribution: std::collections::BTreeMap<String, usize>,
    pub lighting_distribution: std::collections::BTreeMap<String, usize>,
    pub diversity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemporalAnalysis {
    pub peak_time_seconds: f64,
    pub peak_person_count: usize,
    pub average_person_count: f64,
}

/// Counters describing how the collaborators behaved during one analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub sampled_frames: usize,
    pub failed_frame_reads: usize,
    pub detector_calls: usize,
    pub detector_failures: usize,
    pub attribute_successes: usize,
    pub attribute_failures: usize,
    pub llm_captions: usize,
    pub rule_based_captions: usize,
    pub processing_time_ms: u64,
}

/// Video-level results of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub quality_assessment: QualityAssessment,
    pub scene_diversity: SceneDiversity,
    pub temporal_analysis: TemporalAnalysis,
    pub key_insights: Vec<String>,
    pub total_detections: usize,
    pub unique_persons: usize,
    pub stats: ProcessingStats,
}

/// Everything an analysis run produces. Ids inside are assigned by the store.
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    pub frames: Vec<Frame>,
    pub scenes: Vec<Scene>,
    pub summary: AnalysisSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

text_enum!(ChatRole { User => "user", Assistant => "assistant" });

#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub id: String,
    pub video_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    /// Image ids of the frames referenced by this message.
    pub frame_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Analyzing,
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
        ] {
            assert_eq!(AnalysisStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AnalysisStatus::parse("done"), None);
        assert!(AnalysisStatus::Failed.is_terminal());
        assert!(!AnalysisStatus::Analyzing.is_terminal());
    }

    #[test]
    fn scene_attributes_serialize_lowercase() {
        let attrs = SceneAttributes {
            setting: Setting::Outdoor,
            lighting: Lighting::Dark,
            activity_level: ActivityLevel::High,
            complexity: SceneComplexity::Detailed,
        };
        let json = serde_json::to_value(attrs).unwrap();
        assert_eq!(json["setting"], "outdoor");
        assert_eq!(json["lighting"], "dark");
        assert_eq!(json["activity_level"], "high");
        assert_eq!(json["complexity"], "detailed");
    }
}
