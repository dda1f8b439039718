//! Ranking analyzed videos against a free-text query.

use super::persons::{query_colors, wears};
use crate::video_store::{Frame, Lighting, Video};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MIN_RELEVANCE: f64 = 0.1;
pub const MAX_VIDEO_RESULTS: usize = 10;
const MAX_MATCHED_SCENES: usize = 5;

const DARK_WORDS: &[&str] = &["비가", "비 오는", "비오는", "rain", "밤", "night", "어두운", "dark"];

/// Object classes a query can name, with the score each detection adds.
const OBJECT_TERMS: &[(&str, &[&str], f64)] = &[
    ("car", &["자동차", "car", "cars"], 0.3),
    ("person", &["사람", "person", "people"], 0.2),
    ("motorcycle", &["오토바이", "motorcycle", "motorbike"], 0.3),
];

const DARK_FRAME_SCORE: f64 = 0.5;
const COLOR_MATCH_SCORE: f64 = 0.3;

/// The parts of a query the scoring understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossVideoQuery {
    pub wants_dark: bool,
    pub object_classes: Vec<&'static str>,
    pub colors: Vec<&'static str>,
}

impl CrossVideoQuery {
    pub fn parse(query: &str) -> Self {
        let lower = query.to_lowercase();
        let has_word = |word: &str| {
            if word.is_ascii() {
                lower
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .any(|token| token == word)
            } else {
                lower.contains(word)
            }
        };
        Self {
            wants_dark: DARK_WORDS.iter().any(|w| has_word(w)),
            object_classes: OBJECT_TERMS
                .iter()
                .filter(|(_, words, _)| words.iter().any(|w| has_word(w)))
                .map(|(class, _, _)| *class)
                .collect(),
            colors: query_colors(query),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.wants_dark && self.object_classes.is_empty() && self.colors.is_empty()
    }
}

fn object_weight(class: &str) -> f64 {
    OBJECT_TERMS
        .iter()
        .find(|(name, _, _)| *name == class)
        .map_or(0.0, |(_, _, weight)| *weight)
}

fn detections_of<'a>(frame: &'a Frame, class: &'a str) -> usize {
    if class == "person" {
        frame.persons.len()
    } else {
        frame.objects.iter().filter(|o| o.class_name == class).count()
    }
}

/// Relevance of one video's frames, in `[0, 1]`. Each signal is capped at
/// 1.0 on its own before the total is capped.
pub fn relevance_score(frames: &[Frame], query: &CrossVideoQuery) -> f64 {
    let mut score = 0.0;

    if query.wants_dark {
        let dark = frames
            .iter()
            .filter(|f| f.scene.lighting == Lighting::Dark)
            .count();
        score += (dark as f64 * DARK_FRAME_SCORE).min(1.0);
    }

    if !query.object_classes.is_empty() {
        let object_score: f64 = query
            .object_classes
            .iter()
            .map(|class| {
                let count: usize = frames.iter().map(|f| detections_of(f, class)).sum();
                count as f64 * object_weight(class)
            })
            .sum();
        score += object_score.min(1.0);
    }

    if !query.colors.is_empty() {
        let matches = frames
            .iter()
            .flat_map(|f| f.persons.iter())
            .filter(|p| query.colors.iter().any(|c| wears(p, c)))
            .count();
        score += (matches as f64 * COLOR_MATCH_SCORE).min(1.0);
    }

    score.min(1.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchedScene {
    pub image_id: i64,
    pub timestamp: f64,
    pub description: String,
    pub confidence: f64,
}

/// Up to five moments where someone wears one of the queried colors.
pub fn matched_scenes(frames: &[Frame], query: &CrossVideoQuery) -> Vec<MatchedScene> {
    frames
        .iter()
        .flat_map(|frame| {
            frame.persons.iter().filter_map(move |p| {
                let color = query.colors.iter().find(|c| wears(p, c))?;
                Some(MatchedScene {
                    image_id: frame.image_id,
                    timestamp: frame.timestamp,
                    description: format!("Person wearing {} found", color),
                    confidence: p.confidence,
                })
            })
        })
        .take(MAX_MATCHED_SCENES)
        .collect()
}

pub fn video_summary(frames: &[Frame], query: &CrossVideoQuery) -> String {
    let mut parts = vec![format!("{} frames", frames.len())];
    let persons: usize = frames.iter().map(|f| f.persons.len()).sum();
    if persons > 0 {
        parts.push(format!("{} person detections", persons));
    }
    if query.wants_dark {
        let dark = frames
            .iter()
            .filter(|f| f.scene.lighting == Lighting::Dark)
            .count();
        if dark > 0 {
            parts.push(format!("{} dark frames", dark));
        }
    }
    parts.join(" | ")
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoMatch {
    pub video_id: i64,
    pub video_name: String,
    pub filename: String,
    pub relevance_score: f64,
    pub duration: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
    pub matched_scenes: Vec<MatchedScene>,
    pub summary: String,
}

impl VideoMatch {
    pub fn build(video: &Video, frames: &[Frame], query: &CrossVideoQuery) -> Option<Self> {
        let relevance_score = relevance_score(frames, query);
        if relevance_score <= MIN_RELEVANCE {
            return None;
        }
        Some(Self {
            video_id: video.id,
            video_name: video.original_name.clone(),
            filename: video.filename.clone(),
            relevance_score: (relevance_score * 1000.0).round() / 1000.0,
            duration: video.duration,
            uploaded_at: video.uploaded_at,
            matched_scenes: matched_scenes(frames, query),
            summary: video_summary(frames, query),
        })
    }
}

/// Most relevant first, at most ten.
pub fn rank_videos(mut matches: Vec<VideoMatch>) -> Vec<VideoMatch> {
    matches.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then(a.video_id.cmp(&b.video_id))
    });
    matches.truncate(MAX_VIDEO_RESULTS);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::frame;
    use crate::video_store::ObjectDetection;

    fn car() -> ObjectDetection {
        ObjectDetection {
            id: 0,
            frame_id: 0,
            video_id: 0,
            class_name: "car".to_string(),
            confidence: 0.8,
            bbox: [0.0, 0.0, 0.5, 0.5],
        }
    }

    #[test]
    fn query_parsing() {
        let query = CrossVideoQuery::parse("비 오는 밤에 빨간 옷 입은 사람");
        assert!(query.wants_dark);
        assert_eq!(query.object_classes, vec!["person"]);
        assert_eq!(query.colors, vec!["red"]);

        let query = CrossVideoQuery::parse("cars and motorcycles");
        assert_eq!(query.object_classes, vec!["car"]);
        assert!(!query.wants_dark);

        assert!(CrossVideoQuery::parse("a nice day").is_empty());
    }

    #[test]
    fn each_signal_is_capped() {
        let dark = frame(1, 40.0, 0.01, 0);
        assert_eq!(dark.scene.lighting, Lighting::Dark);
        let frames = vec![dark.clone(), dark.clone(), dark];
        let query = CrossVideoQuery::parse("night");
        assert_eq!(relevance_score(&frames, &query), 1.0);

        let mut street = frame(1, 130.0, 0.03, 1);
        street.objects = vec![car()];
        let query = CrossVideoQuery::parse("car");
        assert!((relevance_score(&[street.clone()], &query) - 0.3).abs() < 1e-9);

        let query = CrossVideoQuery::parse("car with a person");
        assert!((relevance_score(&[street.clone()], &query) - 0.5).abs() < 1e-9);

        let query = CrossVideoQuery::parse("blue");
        assert!((relevance_score(&[street], &query) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn only_clothing_colors_make_matched_scenes() {
        let mut parked = frame(1, 40.0, 0.01, 0);
        parked.objects.push(car());
        let frames = vec![parked];

        let query = CrossVideoQuery::parse("red car at night");
        assert!(relevance_score(&frames, &query) > 0.0);
        assert!(matched_scenes(&frames, &query).is_empty());

        let mut worn = frames.clone();
        worn.push(frame(2, 130.0, 0.03, 1));
        let scenes = matched_scenes(&worn, &query);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].image_id, 2);
    }

    #[test]
    fn weak_matches_are_dropped_and_results_ranked() {
        use crate::chat::test_support::analyzed_video;

        let mut first = analyzed_video(30.0);
        first.id = 1;
        let mut second = analyzed_video(30.0);
        second.id = 2;

        let query = CrossVideoQuery::parse("red night");
        let quiet = vec![frame(1, 130.0, 0.03, 0)];
        assert!(VideoMatch::build(&first, &quiet, &query).is_none());

        let one_red = vec![frame(1, 130.0, 0.03, 1)];
        let red_at_night = vec![frame(1, 40.0, 0.01, 2)];
        let matches = vec![
            VideoMatch::build(&first, &one_red, &query).unwrap(),
            VideoMatch::build(&second, &red_at_night, &query).unwrap(),
        ];
        let ranked = rank_videos(matches);
        assert_eq!(ranked[0].video_id, 2);
        assert_eq!(ranked[0].relevance_score, 1.0);
        assert_eq!(ranked[1].relevance_score, 0.3);
        assert_eq!(ranked[0].matched_scenes.len(), 2);
        assert_eq!(ranked[0].matched_scenes[0].description, "Person wearing red found");
        assert_eq!(ranked[0].summary, "1 frames | 2 person detections | 1 dark frames");
    }
}
