//! Text summaries of an analyzed video.

use super::intent::SummaryType;
use crate::video_store::{AnalysisSummary, Frame, Video};
use serde::Serialize;
use std::collections::BTreeMap;

const MAX_KEY_EVENTS: usize = 10;
const MAX_SUMMARY_INSIGHTS: usize = 5;
pub const NOT_ANALYZED_SUMMARY: &str = "No analysis results yet. Analyze the video first.";

/// A moment with at least two people on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEvent {
    pub image_id: i64,
    pub timestamp: f64,
    pub description: String,
    pub person_count: usize,
    pub setting: String,
    pub activity_level: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VideoStatistics {
    pub total_duration: f64,
    pub total_frames: usize,
    pub total_detections: usize,
    pub unique_persons: usize,
    pub quality_score: f64,
    pub scene_diversity: f64,
    pub peak_time: f64,
    pub peak_person_count: usize,
    pub average_person_count: f64,
    pub scene_types: BTreeMap<String, usize>,
    pub activity_levels: BTreeMap<String, usize>,
    pub lighting_types: BTreeMap<String, usize>,
    pub key_insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoSummaryReport {
    pub summary_type: SummaryType,
    pub summary: String,
    pub key_events: Vec<KeyEvent>,
    pub statistics: VideoStatistics,
    pub duration: Option<f64>,
    pub frame_count: usize,
}

pub fn collect_statistics(
    video: &Video,
    frames: &[Frame],
    summary: &AnalysisSummary,
) -> VideoStatistics {
    let mut stats = VideoStatistics {
        total_duration: video.duration.unwrap_or_default(),
        total_frames: frames.len(),
        total_detections: summary.total_detections,
        unique_persons: summary.unique_persons,
        quality_score: summary.quality_assessment.overall_score,
        scene_diversity: summary.scene_diversity.diversity_score,
        peak_time: summary.temporal_analysis.peak_time_seconds,
        peak_person_count: summary.temporal_analysis.peak_person_count,
        average_person_count: summary.temporal_analysis.average_person_count,
        scene_types: summary.scene_diversity.scene_type_distribution.clone(),
        activity_levels: summary.scene_diversity.activity_level_distribution.clone(),
        lighting_types: summary.scene_diversity.lighting_distribution.clone(),
        key_insights: Vec::new(),
    };
    stats.key_insights = summary_insights(&stats);
    stats
}

fn by_count_desc(distribution: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> =
        distribution.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

fn quality_label(score: f64) -> &'static str {
    if score > 0.8 {
        "excellent"
    } else if score > 0.6 {
        "good"
    } else {
        "fair"
    }
}

/// Short statements about cast size, length, quality, settings and activity.
pub fn summary_insights(stats: &VideoStatistics) -> Vec<String> {
    let mut insights = Vec::new();

    if stats.unique_persons > 0 {
        let peak = stats.peak_person_count;
        if peak > 5 {
            insights.push(format!("Many people (up to {} at once)", peak));
        } else if peak > 2 {
            insights.push(format!("Small group activity ({} people)", peak));
        } else {
            insights.push(format!("Few people ({} in total)", stats.unique_persons));
        }
    }

    let duration = stats.total_duration;
    if duration > 300.0 {
        insights.push(format!("Long video ({:.1} min)", duration / 60.0));
    } else if duration > 60.0 {
        insights.push(format!("Medium-length video ({:.1} min)", duration / 60.0));
    } else {
        insights.push(format!("Short video ({:.0}s)", duration));
    }

    if stats.quality_score > 0.0 {
        insights.push(format!(
            "{} quality (score: {:.2})",
            capitalize(quality_label(stats.quality_score)),
            stats.quality_score
        ));
    }

    if stats.scene_types.len() > 3 {
        insights.push(format!("Diverse scenes ({} kinds)", stats.scene_types.len()));
    } else if !stats.scene_types.is_empty() {
        let main: Vec<&str> = by_count_desc(&stats.scene_types)
            .into_iter()
            .take(2)
            .map(|(name, _)| name)
            .collect();
        insights.push(format!("Main settings: {}", main.join(", ")));
    }

    if stats.activity_levels.contains_key("high") {
        insights.push("High activity detected".to_string());
    } else if stats.activity_levels.contains_key("medium") {
        insights.push("Moderate activity".to_string());
    }

    insights.truncate(MAX_SUMMARY_INSIGHTS);
    insights
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Frames with two or more people, in time order.
pub fn key_events(frames: &[Frame]) -> Vec<KeyEvent> {
    let mut events: Vec<KeyEvent> = frames
        .iter()
        .filter(|f| f.persons.len() >= 2)
        .map(|f| KeyEvent {
            image_id: f.image_id,
            timestamp: f.timestamp,
            description: format!("{} people detected", f.persons.len()),
            person_count: f.persons.len(),
            setting: f.scene.setting.to_string(),
            activity_level: f.scene.activity_level.to_string(),
        })
        .collect();
    events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    events.truncate(MAX_KEY_EVENTS);
    events
}

/// `m:ss` rendering of a timestamp in seconds.
pub fn clock_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn join_distribution(distribution: &BTreeMap<String, usize>, limit: usize) -> String {
    by_count_desc(distribution)
        .into_iter()
        .take(limit)
        .map(|(name, count)| format!("{}({})", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn brief_summary(stats: &VideoStatistics) -> String {
    let main = stats
        .key_insights
        .first()
        .map(String::as_str)
        .unwrap_or("Video analysis complete");
    format!(
        "{}. {:.1} min video with {} people.",
        main,
        stats.total_duration / 60.0,
        stats.unique_persons
    )
}

fn detailed_summary(stats: &VideoStatistics, events: &[KeyEvent]) -> String {
    let mut lines = vec![
        format!(
            "This video is {:.1} min long and shows {} people.",
            stats.total_duration / 60.0,
            stats.unique_persons
        ),
        String::new(),
        "Key points:".to_string(),
    ];
    lines.extend(stats.key_insights.iter().take(3).map(|i| format!("  - {}", i)));

    if !events.is_empty() {
        lines.push(String::new());
        lines.push("Key scenes:".to_string());
        for (i, event) in events.iter().take(3).enumerate() {
            lines.push(format!(
                "  {}. [{}] {}",
                i + 1,
                clock_time(event.timestamp),
                truncate_chars(&event.description, 50)
            ));
        }
    }

    if stats.quality_score > 0.0 {
        lines.push(String::new());
        lines.push(format!(
            "Video quality: {} ({:.2}/1.0)",
            quality_label(stats.quality_score),
            stats.quality_score
        ));
    }
    if !stats.scene_types.is_empty() {
        lines.push(format!("Settings: {}", join_distribution(&stats.scene_types, 3)));
    }
    lines.join("\n")
}

fn comprehensive_summary(stats: &VideoStatistics, events: &[KeyEvent]) -> String {
    let mut lines = vec![
        "Video".to_string(),
        format!("  - Length: {:.1} min", stats.total_duration / 60.0),
        format!("  - People: {}", stats.unique_persons),
        format!("  - Analyzed frames: {}", stats.total_frames),
        format!("  - Detected objects: {}", stats.total_detections),
        String::new(),
        "Key insights".to_string(),
    ];
    lines.extend(stats.key_insights.iter().map(|i| format!("  - {}", i)));

    if !events.is_empty() {
        lines.push(String::new());
        lines.push("Timeline:".to_string());
        for (i, event) in events.iter().take(8).enumerate() {
            lines.push(format!(
                "  {}. [{}] {} ({} activity, {} people)",
                i + 1,
                clock_time(event.timestamp),
                truncate_chars(&event.description, 60),
                event.activity_level,
                event.person_count
            ));
        }
    }

    lines.push(String::new());
    lines.push("Statistics:".to_string());
    lines.push(format!("  - Peak people on screen: {}", stats.peak_person_count));
    lines.push(format!(
        "  - Average people on screen: {:.1}",
        stats.average_person_count
    ));
    if stats.quality_score > 0.0 {
        lines.push(format!(
            "  - Video quality: {} ({:.2}/1.0)",
            quality_label(stats.quality_score),
            stats.quality_score
        ));
    }
    if !stats.scene_types.is_empty() {
        lines.push(format!("  - Settings: {}", join_distribution(&stats.scene_types, 5)));
    }
    if !stats.activity_levels.is_empty() {
        lines.push(format!(
            "  - Activity: {}",
            join_distribution(&stats.activity_levels, usize::MAX)
        ));
    }
    if !stats.lighting_types.is_empty() {
        lines.push(format!(
            "  - Lighting: {}",
            join_distribution(&stats.lighting_types, usize::MAX)
        ));
    }
    if stats.scene_diversity > 0.0 {
        lines.push(format!("  - Scene diversity: {:.2}/1.0", stats.scene_diversity));
    }
    lines.join("\n")
}

/// Summarize a video. Without an analysis summary the report only says so.
pub fn summarize_video(
    video: &Video,
    frames: &[Frame],
    summary: Option<&AnalysisSummary>,
    summary_type: SummaryType,
) -> VideoSummaryReport {
    let Some(summary) = summary.filter(|_| !frames.is_empty()) else {
        return VideoSummaryReport {
            summary_type,
            summary: NOT_ANALYZED_SUMMARY.to_string(),
            key_events: Vec::new(),
            statistics: VideoStatistics::default(),
            duration: video.duration,
            frame_count: 0,
        };
    };

    let statistics = collect_statistics(video, frames, summary);
    let events = key_events(frames);
    let text = match summary_type {
        SummaryType::Brief => brief_summary(&statistics),
        SummaryType::Detailed => detailed_summary(&statistics, &events),
        SummaryType::Comprehensive => comprehensive_summary(&statistics, &events),
    };

    VideoSummaryReport {
        summary_type,
        summary: text,
        key_events: events,
        statistics,
        duration: video.duration,
        frame_count: frames.len(),
    }
}
