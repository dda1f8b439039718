//! Caption and clothing based frame lookup within one video.

use crate::video_store::Frame;
use serde::Serialize;
use std::collections::HashSet;

pub const MAX_FRAME_MATCHES: usize = 5;

const CAPTION_COLOR_WEIGHT: u32 = 3;
const CLOTHING_COLOR_WEIGHT: u32 = 1;

const KOREAN_COLOR_NAMES: &[(&str, &str)] = &[
    ("분홍색", "pink"),
    ("핑크", "pink"),
    ("보라색", "purple"),
    ("보라", "purple"),
    ("자주색", "purple"),
    ("자홍색", "purple"),
    ("파란색", "blue"),
    ("파랑", "blue"),
    ("푸른색", "blue"),
    ("남색", "blue"),
    ("하늘색", "blue"),
    ("초록색", "green"),
    ("초록", "green"),
    ("녹색", "green"),
    ("연두색", "green"),
    ("노란색", "yellow"),
    ("노랑", "yellow"),
    ("황색", "yellow"),
    ("주황색", "orange"),
    ("주황", "orange"),
    ("오렌지", "orange"),
    ("빨간색", "red"),
    ("빨강", "red"),
    ("적색", "red"),
    ("흰색", "white"),
    ("하얀색", "white"),
    ("검은색", "black"),
    ("까만색", "black"),
    ("회색", "gray"),
    ("그레이", "gray"),
    ("은색", "gray"),
    ("은빛", "gray"),
];

/// Words that count as a mention of a base color.
pub fn color_synonyms(color: &str) -> &'static [&'static str] {
    match color {
        "pink" => &["pink", "rose", "fuchsia", "magenta", "rosy"],
        "red" => &["red", "crimson", "scarlet"],
        "orange" => &["orange", "amber", "tangerine"],
        "yellow" => &["yellow", "gold", "golden"],
        "green" => &["green", "lime", "emerald"],
        "blue" => &["blue", "navy", "azure", "teal"],
        "purple" => &["purple", "violet", "lavender"],
        "white" => &["white", "ivory"],
        "black" => &["black"],
        "gray" => &["gray", "grey", "silver"],
        _ => &[],
    }
}

/// Map a Korean color name to its English base color; other input is lowercased.
pub fn normalize_color(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    KOREAN_COLOR_NAMES
        .iter()
        .find(|(korean, _)| *korean == lower)
        .map(|(_, english)| english.to_string())
        .unwrap_or(lower)
}

/// A frame that matched a search, with its score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameMatch<'a> {
    pub frame: &'a Frame,
    pub score: u32,
}

/// Frames whose caption contains the keywords, one point per keyword,
/// best first.
pub fn search_by_keywords<'a>(frames: &'a [Frame], keywords: &[String]) -> Vec<FrameMatch<'a>> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut matches: Vec<FrameMatch> = frames
        .iter()
        .filter_map(|frame| {
            let caption = frame.caption_lower();
            let score = keywords.iter().filter(|k| caption.contains(k.as_str())).count() as u32;
            (score > 0).then_some(FrameMatch { frame, score })
        })
        .collect();

    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(MAX_FRAME_MATCHES);
    matches
}

/// Frames mentioning a color in their caption or in the clothing of a person.
/// Caption matches weigh more; frames at the same whole second are reported once.
pub fn search_by_color<'a>(frames: &'a [Frame], color: &str) -> Vec<FrameMatch<'a>> {
    let query = color.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    let base = normalize_color(&query);
    let mut terms: Vec<String> = color_synonyms(&base).iter().map(|s| s.to_string()).collect();
    if terms.is_empty() {
        terms.push(base);
    }
    if !terms.contains(&query) {
        terms.push(query);
    }
    let mentions = |text: &str| terms.iter().any(|t| text.contains(t.as_str()));

    let mut matches: Vec<FrameMatch> = frames
        .iter()
        .filter_map(|frame| {
            let mut score = 0;
            if mentions(&frame.caption_lower()) {
                score += CAPTION_COLOR_WEIGHT;
            }
            if frame.persons.iter().any(|p| {
                mentions(&p.upper_color.to_lowercase()) || mentions(&p.lower_color.to_lowercase())
            }) {
                score += CLOTHING_COLOR_WEIGHT;
            }
            (score > 0).then_some(FrameMatch { frame, score })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.frame.timestamp.total_cmp(&a.frame.timestamp))
    });

    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert(m.frame.timestamp.round() as i64))
        .take(MAX_FRAME_MATCHES)
        .collect()
}
