//! How many people a video shows, and who they are.

use crate::video_store::Frame;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref COUNT_PATTERN: Regex = Regex::new(
        r"\b(one|two|three|four|five|six|seven|eight|nine|ten)\s+(people|persons?|individuals?|men|women|man|woman)\b",
    )
    .expect("valid people count pattern");
    static ref MALE_PATTERN: Regex =
        Regex::new(r"\b(man|men|male|boy|boys)\b").expect("valid male pattern");
    static ref FEMALE_PATTERN: Regex =
        Regex::new(r"\b(woman|women|female|girl|girls)\b").expect("valid female pattern");
}

fn number_word_value(word: &str) -> usize {
    match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        _ => 10,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PeopleEstimate {
    Exact(usize),
    Range(&'static str),
    Unknown,
}

impl std::fmt::Display for PeopleEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeopleEstimate::Exact(n) => write!(f, "{}", n),
            PeopleEstimate::Range(range) => f.write_str(range),
            PeopleEstimate::Unknown => f.write_str("unknown"),
        }
    }
}

/// A frame whose caption or detections state a head count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountEvidence {
    pub image_id: i64,
    pub timestamp: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeopleCountAnalysis {
    pub estimated_count: PeopleEstimate,
    pub confidence: Confidence,
    pub evidence: Vec<CountEvidence>,
    pub explanation: String,
}

impl PeopleCountAnalysis {
    /// Evidence frames that show the estimated count.
    pub fn peak_evidence(&self) -> impl Iterator<Item = &CountEvidence> {
        let peak = match self.estimated_count {
            PeopleEstimate::Exact(n) => Some(n),
            _ => None,
        };
        self.evidence.iter().filter(move |e| Some(e.count) == peak)
    }
}

/// Largest head count spelled out in a caption ("three people", "two men").
pub fn caption_head_count(caption: &str) -> Option<usize> {
    let lower = caption.to_lowercase();
    COUNT_PATTERN
        .captures_iter(&lower)
        .map(|caps| number_word_value(&caps[1]))
        .max()
}

/// Estimate how many distinct people appear. The same people recur across
/// frames, so the largest per-frame count is the estimate, never the sum.
pub fn analyze_people_count(frames: &[Frame]) -> PeopleCountAnalysis {
    let evidence: Vec<CountEvidence> = frames
        .iter()
        .filter_map(|frame| {
            caption_head_count(frame.caption.as_deref().unwrap_or_default()).map(|count| {
                CountEvidence {
                    image_id: frame.image_id,
                    timestamp: frame.timestamp,
                    count,
                }
            })
        })
        .collect();

    if let Some(max) = evidence.iter().map(|e| e.count).max() {
        return PeopleCountAnalysis {
            estimated_count: PeopleEstimate::Exact(max),
            confidence: Confidence::High,
            evidence,
            explanation: format!(
                "Captions mention at most {} people in a single scene. The same people appear across frames, so the video shows about {} people.",
                max, max
            ),
        };
    }

    let group_mentions = frames
        .iter()
        .filter(|f| {
            let caption = f.caption_lower();
            caption.contains("group") || caption.contains("people")
        })
        .count();
    if group_mentions > 0 {
        return PeopleCountAnalysis {
            estimated_count: PeopleEstimate::Range("3-5"),
            confidence: Confidence::Medium,
            evidence: Vec::new(),
            explanation: "Captions describe a group of people without an exact number, roughly 3-5 people.".to_string(),
        };
    }

    let detected: Vec<CountEvidence> = frames
        .iter()
        .filter(|f| !f.persons.is_empty())
        .map(|f| CountEvidence {
            image_id: f.image_id,
            timestamp: f.timestamp,
            count: f.persons.len(),
        })
        .collect();
    if let Some(max) = detected.iter().map(|e| e.count).max() {
        return PeopleCountAnalysis {
            estimated_count: PeopleEstimate::Exact(max),
            confidence: Confidence::Medium,
            evidence: detected,
            explanation: format!(
                "The person detector found at most {} people in a single frame.",
                max
            ),
        };
    }

    PeopleCountAnalysis {
        estimated_count: PeopleEstimate::Unknown,
        confidence: Confidence::Low,
        evidence: Vec::new(),
        explanation: "The analysis does not show how many people appear in the video.".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderEvidence {
    pub image_id: i64,
    pub timestamp: f64,
    pub males: usize,
    pub females: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderRatioAnalysis {
    pub male_count: usize,
    pub female_count: usize,
    pub total_gendered: usize,
    /// Percent, one decimal.
    pub male_ratio: f64,
    pub female_ratio: f64,
    pub confidence: Confidence,
    pub evidence: Vec<GenderEvidence>,
    pub explanation: String,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Count gendered mentions per frame. A frame contributes the larger of its
/// caption mentions and its classified detections for each gender, so a
/// caption generated from the detections is not counted twice.
pub fn analyze_gender_ratio(frames: &[Frame]) -> GenderRatioAnalysis {
    let evidence: Vec<GenderEvidence> = frames
        .iter()
        .filter_map(|frame| {
            let caption = frame.caption_lower();
            let caption_males = MALE_PATTERN.find_iter(&caption).count();
            let caption_females = FEMALE_PATTERN.find_iter(&caption).count();
            let detected_males = frame.persons.iter().filter(|p| p.gender == "male").count();
            let detected_females = frame.persons.iter().filter(|p| p.gender == "female").count();

            let males = caption_males.max(detected_males);
            let females = caption_females.max(detected_females);
            (males + females > 0).then_some(GenderEvidence {
                image_id: frame.image_id,
                timestamp: frame.timestamp,
                males,
                females,
            })
        })
        .collect();

    let male_count: usize = evidence.iter().map(|e| e.males).sum();
    let female_count: usize = evidence.iter().map(|e| e.females).sum();
    let total = male_count + female_count;

    if total == 0 {
        return GenderRatioAnalysis {
            male_count: 0,
            female_count: 0,
            total_gendered: 0,
            male_ratio: 0.0,
            female_ratio: 0.0,
            confidence: Confidence::Low,
            evidence,
            explanation: "Neither captions nor detections state anyone's gender.".to_string(),
        };
    }

    let male_ratio = percent(male_count, total);
    let female_ratio = percent(female_count, total);
    let confidence = if evidence.len() > 2 {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    GenderRatioAnalysis {
        male_count,
        female_count,
        total_gendered: total,
        male_ratio,
        female_ratio,
        confidence,
        explanation: format!(
            "Gendered people found: {} male, {} female ({:.1}% male, {:.1}% female).",
            male_count, female_count, male_ratio, female_ratio
        ),
        evidence,
    }
}
