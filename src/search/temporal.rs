//! Who and what appears in a time window of a video.

use crate::analysis::UNKNOWN_COLOR;
use crate::video_store::Frame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive `[start, end]` window in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
}

impl TimeRange {
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.start <= self.end
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalAnalysisKind {
    #[default]
    GenderDistribution,
    AgeDistribution,
    ActivityPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderCounts {
    pub male: usize,
    pub female: usize,
    pub unknown: usize,
}

/// Percentages, one decimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderRatios {
    pub male: f64,
    pub female: f64,
    pub unknown: f64,
}

/// A color and how many people wore it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorCount {
    pub color: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderDistribution {
    pub total_persons: usize,
    pub gender_count: GenderCounts,
    pub gender_ratio: GenderRatios,
    /// Most worn first.
    pub upper_clothing_colors: Vec<ColorCount>,
    pub lower_clothing_colors: Vec<ColorCount>,
    pub average_confidence: f64,
    pub accuracy_note: String,
    pub analysis_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeCounts {
    pub child: usize,
    pub teenager: usize,
    pub adult: usize,
    pub elderly: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeDistribution {
    pub total_persons: usize,
    pub age_count: AgeCounts,
    pub analysis_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityPattern {
    pub frames_analyzed: usize,
    pub activity_levels: ActivityCounts,
    pub analysis_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TemporalResult {
    Gender(GenderDistribution),
    Age(AgeDistribution),
    Activity(ActivityPattern),
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

fn color_histogram<'a>(colors: impl Iterator<Item = &'a str>) -> Vec<ColorCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for color in colors.filter(|c| !c.is_empty() && *c != UNKNOWN_COLOR) {
        *counts.entry(color).or_default() += 1;
    }
    let mut histogram: Vec<ColorCount> = counts
        .into_iter()
        .map(|(color, count)| ColorCount {
            color: color.to_string(),
            count,
        })
        .collect();
    // Stable: equal counts stay alphabetical.
    histogram.sort_by(|a, b| b.count.cmp(&a.count));
    histogram
}

pub fn gender_distribution(frames: &[&Frame]) -> GenderDistribution {
    let persons: Vec<_> = frames.iter().flat_map(|f| f.persons.iter()).collect();
    let total = persons.len();

    let male = persons.iter().filter(|p| p.gender == "male").count();
    let female = persons.iter().filter(|p| p.gender == "female").count();
    let unknown = total - male - female;

    let confidences: Vec<f64> = persons
        .iter()
        .map(|p| p.confidence)
        .filter(|c| *c > 0.0)
        .collect();
    let average_confidence = if confidences.is_empty() {
        0.0
    } else {
        let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
        (mean * 1000.0).round() / 1000.0
    };

    let accuracy_note = if total > 0 && unknown as f64 > total as f64 * 0.8 {
        "Most people have no recognized gender; check the video resolution or camera angle."
    } else if average_confidence > 0.7 {
        "Reliable analysis result."
    } else {
        "Moderate confidence."
    };

    let gender_ratio = GenderRatios {
        male: percent(male, total),
        female: percent(female, total),
        unknown: percent(unknown, total),
    };
    let analysis_summary = format!(
        "{} people: {}% male, {}% female. {}",
        total, gender_ratio.male, gender_ratio.female, accuracy_note
    );

    GenderDistribution {
        total_persons: total,
        gender_count: GenderCounts {
            male,
            female,
            unknown,
        },
        gender_ratio,
        upper_clothing_colors: color_histogram(persons.iter().map(|p| p.upper_color.as_str())),
        lower_clothing_colors: color_histogram(persons.iter().map(|p| p.lower_color.as_str())),
        average_confidence,
        accuracy_note: accuracy_note.to_string(),
        analysis_summary,
    }
}

pub fn age_distribution(frames: &[&Frame]) -> AgeDistribution {
    let mut age_count = AgeCounts {
        child: 0,
        teenager: 0,
        adult: 0,
        elderly: 0,
        unknown: 0,
    };
    for person in frames.iter().flat_map(|f| f.persons.iter()) {
        match person.age_group.as_str() {
            "child" => age_count.child += 1,
            "teenager" => age_count.teenager += 1,
            "young_adult" | "adult" | "middle_aged" => age_count.adult += 1,
            "elderly" => age_count.elderly += 1,
            _ => age_count.unknown += 1,
        }
    }
    let total_persons = age_count.child
        + age_count.teenager
        + age_count.adult
        + age_count.elderly
        + age_count.unknown;
    AgeDistribution {
        total_persons,
        age_count,
        analysis_summary: format!("Age distribution of {} people.", total_persons),
    }
}

pub fn activity_pattern(frames: &[&Frame]) -> ActivityPattern {
    use crate::video_store::ActivityLevel;

    let count = |level: ActivityLevel| {
        frames
            .iter()
            .filter(|f| f.scene.activity_level == level)
            .count()
    };
    let activity_levels = ActivityCounts {
        low: count(ActivityLevel::Low),
        medium: count(ActivityLevel::Medium),
        high: count(ActivityLevel::High),
    };
    ActivityPattern {
        frames_analyzed: frames.len(),
        analysis_summary: format!(
            "{} frames: {} high, {} medium, {} low activity.",
            frames.len(),
            activity_levels.high,
            activity_levels.medium,
            activity_levels.low
        ),
        activity_levels,
    }
}

/// Run one kind of analysis over the frames inside `range`.
pub fn analyze_time_range(
    frames: &[Frame],
    range: TimeRange,
    kind: TemporalAnalysisKind,
) -> TemporalResult {
    let in_range: Vec<&Frame> = frames
        .iter()
        .filter(|f| range.contains(f.timestamp))
        .collect();
    match kind {
        TemporalAnalysisKind::GenderDistribution => {
            TemporalResult::Gender(gender_distribution(&in_range))
        }
        TemporalAnalysisKind::AgeDistribution => TemporalResult::Age(age_distribution(&in_range)),
        TemporalAnalysisKind::ActivityPattern => {
            TemporalResult::Activity(activity_pattern(&in_range))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::frame;

    #[test]
    fn ranges() {
        assert!(TimeRange { start: 0.0, end: 10.0 }.is_valid());
        assert!(TimeRange { start: 5.0, end: 5.0 }.is_valid());
        assert!(!TimeRange { start: 6.0, end: 5.0 }.is_valid());
        assert!(!TimeRange { start: -1.0, end: 5.0 }.is_valid());
        assert!(!TimeRange { start: 0.0, end: f64::NAN }.is_valid());
        assert!(TimeRange { start: 1.0, end: 2.0 }.contains(2.0));

        let kind: TemporalAnalysisKind = serde_json::from_str("\"age_distribution\"").unwrap();
        assert_eq!(kind, TemporalAnalysisKind::AgeDistribution);
    }

    #[test]
    fn gender_distribution_within_range() {
        let mut busy = frame(3, 130.0, 0.03, 3);
        busy.persons[1].gender = "female".to_string();
        busy.persons[1].upper_color = "white".to_string();
        busy.persons[2].gender = "person".to_string();
        busy.persons[2].upper_color = UNKNOWN_COLOR.to_string();
        let outside = frame(20, 130.0, 0.03, 4);

        let frames = vec![busy, outside];
        let result = analyze_time_range(
            &frames,
            TimeRange { start: 0.0, end: 10.0 },
            TemporalAnalysisKind::GenderDistribution,
        );
        let TemporalResult::Gender(dist) = result else {
            panic!("expected a gender distribution");
        };
        assert_eq!(dist.total_persons, 3);
        assert_eq!(dist.gender_count, GenderCounts { male: 1, female: 1, unknown: 1 });
        assert_eq!(dist.gender_ratio.male, 33.3);
        assert_eq!(dist.average_confidence, 0.9);
        assert_eq!(dist.accuracy_note, "Reliable analysis result.");
        assert_eq!(
            dist.upper_clothing_colors,
            vec![
                ColorCount { color: "red".to_string(), count: 1 },
                ColorCount { color: "white".to_string(), count: 1 },
            ]
        );
        assert_eq!(dist.lower_clothing_colors[0], ColorCount { color: "blue".to_string(), count: 3 });
    }

    #[test]
    fn mostly_unknown_genders_are_flagged() {
        let mut f = frame(1, 130.0, 0.03, 5);
        for p in &mut f.persons {
            p.gender = "person".to_string();
        }
        let dist = gender_distribution(&[&f]);
        assert_eq!(dist.gender_count.unknown, 5);
        assert!(dist.accuracy_note.starts_with("Most people"));

        let empty = gender_distribution(&[]);
        assert_eq!(empty.total_persons, 0);
        assert_eq!(empty.gender_ratio.male, 0.0);
        assert_eq!(empty.accuracy_note, "Moderate confidence.");
    }

    #[test]
    fn ages_and_activity() {
        let mut f = frame(1, 130.0, 0.06, 4);
        f.persons[0].age_group = "child".to_string();
        f.persons[1].age_group = "elderly".to_string();
        f.persons[2].age_group = "middle_aged".to_string();
        f.persons[3].age_group = "".to_string();
        let calm = frame(2, 130.0, 0.01, 0);

        let ages = age_distribution(&[&f, &calm]);
        assert_eq!(ages.total_persons, 4);
        assert_eq!(ages.age_count.child, 1);
        assert_eq!(ages.age_count.adult, 1);
        assert_eq!(ages.age_count.unknown, 1);

        let activity = activity_pattern(&[&f, &calm]);
        assert_eq!(activity.activity_levels.high, 1);
        assert_eq!(activity.activity_levels.low, 1);
        assert_eq!(activity.frames_analyzed, 2);
    }
}
