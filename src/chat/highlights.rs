//! Picking the frames worth showing first.

use crate::video_store::{ActivityLevel, Frame, SceneComplexity};
use serde::{Deserialize, Serialize};

const CHAT_CANDIDATES: usize = 7;
const CHAT_HIGHLIGHTS: usize = 5;
const MIN_HIGHLIGHT_GAP_SECONDS: f64 = 10.0;

/// Highlights for a chat answer: evenly spaced candidates ranked by people
/// and caption length, returned in time order.
pub fn chat_highlights(frames: &[Frame]) -> Vec<&Frame> {
    if frames.is_empty() {
        return Vec::new();
    }
    let wanted = CHAT_CANDIDATES.min(frames.len());
    let step = (frames.len() / wanted).max(1);

    let score = |frame: &Frame| {
        let caption_len = frame.caption.as_deref().map_or(0, |c| c.chars().count());
        frame.persons.len() as f64 + caption_len as f64 / 10.0
    };
    let mut candidates: Vec<&Frame> = frames.iter().step_by(step).take(wanted).collect();
    candidates.sort_by(|a, b| score(b).total_cmp(&score(a)));
    candidates.truncate(CHAT_HIGHLIGHTS);
    candidates.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    candidates
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HighlightCriteria {
    pub min_score: f64,
    pub max_highlights: usize,
}

impl Default for HighlightCriteria {
    fn default() -> Self {
        Self {
            min_score: 2.0,
            max_highlights: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl Significance {
    pub fn from_score(score: f64) -> Self {
        if score >= 4.0 {
            Significance::VeryHigh
        } else if score >= 3.0 {
            Significance::High
        } else if score >= 2.0 {
            Significance::Medium
        } else {
            Significance::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub rank: usize,
    pub image_id: i64,
    pub timestamp: f64,
    pub score: f64,
    pub description: String,
    pub person_count: usize,
    pub significance: Significance,
    pub setting: String,
    pub activity_level: String,
}

fn average_person_confidence(frame: &Frame) -> f64 {
    if frame.persons.is_empty() {
        return 0.0;
    }
    frame.persons.iter().map(|p| p.confidence).sum::<f64>() / frame.persons.len() as f64
}

pub fn highlight_score(frame: &Frame) -> f64 {
    let confidence = average_person_confidence(frame);
    let activity = match frame.scene.activity_level {
        ActivityLevel::High => 1.0,
        ActivityLevel::Medium => 0.5,
        ActivityLevel::Low => 0.0,
    };
    let detail = if frame.scene.complexity == SceneComplexity::Detailed {
        0.3
    } else {
        0.0
    };
    frame.persons.len() as f64 * 0.5 + confidence * 0.3 + activity + detail + confidence * 0.2
}

fn describe(person_count: usize) -> String {
    match person_count {
        0 => "Key scene".to_string(),
        1 => "Scene with one person".to_string(),
        n if n <= 3 => format!("Scene with {} people", n),
        n => format!("Busy scene with {} people", n),
    }
}

/// Best scoring frames at least ten seconds apart, best first.
pub fn extract_highlights(frames: &[Frame], criteria: &HighlightCriteria) -> Vec<Highlight> {
    let mut scored: Vec<(&Frame, f64)> = frames
        .iter()
        .map(|frame| (frame, highlight_score(frame)))
        .filter(|(_, score)| *score >= criteria.min_score)
        .collect();
    scored.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then(a.0.timestamp.total_cmp(&b.0.timestamp))
    });

    let mut selected: Vec<(&Frame, f64)> = Vec::new();
    for (frame, score) in scored.into_iter().take(criteria.max_highlights.saturating_mul(2)) {
        if selected.len() >= criteria.max_highlights {
            break;
        }
        let far_enough = selected
            .iter()
            .all(|(s, _)| (s.timestamp - frame.timestamp).abs() >= MIN_HIGHLIGHT_GAP_SECONDS);
        if far_enough {
            selected.push((frame, score));
        }
    }

    selected
        .into_iter()
        .enumerate()
        .map(|(i, (frame, score))| Highlight {
            rank: i + 1,
            image_id: frame.image_id,
            timestamp: frame.timestamp,
            score,
            description: describe(frame.persons.len()),
            person_count: frame.persons.len(),
            significance: Significance::from_score(score),
            setting: frame.scene.setting.to_string(),
            activity_level: frame.scene.activity_level.to_string(),
        })
        .collect()
}
