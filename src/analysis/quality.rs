//! Per-frame scene classification and video-level aggregates.

use super::image_stats::{std_dev, FrameStats};
use crate::video_store::{
    ActivityLevel, Frame, Lighting, QualityAssessment, SceneAttributes, SceneComplexity,
    SceneDiversity, Setting, TemporalAnalysis,
};
use std::collections::{BTreeMap, HashSet};

const MAX_INSIGHTS: usize = 5;

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

pub fn classify_scene(brightness: f64, edge_density: f64) -> SceneAttributes {
    let setting = if brightness > 120.0 {
        Setting::Outdoor
    } else {
        Setting::Indoor
    };
    let lighting = if brightness > 150.0 {
        Lighting::Bright
    } else if brightness > 100.0 {
        Lighting::Normal
    } else {
        Lighting::Dark
    };
    let activity_level = if edge_density > 0.04 {
        ActivityLevel::High
    } else if edge_density > 0.02 {
        ActivityLevel::Medium
    } else {
        ActivityLevel::Low
    };
    let complexity = if edge_density > 0.05 {
        SceneComplexity::Detailed
    } else if edge_density > 0.02 {
        SceneComplexity::Medium
    } else {
        SceneComplexity::Simple
    };
    SceneAttributes {
        setting,
        lighting,
        activity_level,
        complexity,
    }
}

fn quality_status(overall: f64) -> &'static str {
    match overall {
        s if s >= 0.7 => "excellent",
        s if s >= 0.5 => "good",
        s if s >= 0.3 => "fair",
        _ => "poor",
    }
}

pub fn assess_quality(stats: &[FrameStats]) -> QualityAssessment {
    if stats.is_empty() {
        return QualityAssessment {
            overall_score: 0.0,
            status: "unknown".to_string(),
            brightness_score: 0.0,
            contrast_score: 0.0,
            sharpness_score: 0.0,
            color_balance_score: 0.0,
        };
    }
    let n = stats.len() as f64;
    let mean_of = |f: &dyn Fn(&FrameStats) -> f64| stats.iter().map(f).sum::<f64>() / n;

    let brightness_score = clamp01((mean_of(&|s| s.brightness) - 50.0) / 100.0);
    let contrast_score = clamp01(mean_of(&|s| s.color_spread()) / 50.0);
    let sharpness_score = clamp01(mean_of(&|s| s.edge_density) * 10.0);
    let color_balance_score = mean_of(&|s| {
        let mean = s.mean_color.iter().sum::<f64>() / 3.0;
        if mean > 0.0 {
            clamp01(1.0 - std_dev(&s.mean_color) / mean)
        } else {
            0.0
        }
    });

    let overall =
        (brightness_score + contrast_score + sharpness_score + color_balance_score) / 4.0;

    QualityAssessment {
        overall_score: round3(overall),
        status: quality_status(overall).to_string(),
        brightness_score: round3(brightness_score),
        contrast_score: round3(contrast_score),
        sharpness_score: round3(sharpness_score),
        color_balance_score: round3(color_balance_score),
    }
}

pub fn scene_diversity(frames: &[Frame]) -> SceneDiversity {
    if frames.is_empty() {
        return SceneDiversity::default();
    }
    let mut diversity = SceneDiversity::default();
    let mut types = HashSet::new();
    for frame in frames {
        let scene = &frame.scene;
        *diversity
            .scene_type_distribution
            .entry(scene.complexity.to_string())
            .or_default() += 1;
        *diversity
            .activity_level_distribution
            .entry(scene.activity_level.to_string())
            .or_default() += 1;
        *diversity
            .lighting_distribution
            .entry(scene.lighting.to_string())
            .or_default() += 1;
        types.insert(scene.complexity);
    }
    diversity.diversity_score = round3(types.len() as f64 / frames.len() as f64);
    diversity
}

pub fn temporal_analysis(frames: &[Frame]) -> TemporalAnalysis {
    if frames.is_empty() {
        return TemporalAnalysis::default();
    }
    let mut peak = &frames[0];
    for frame in frames {
        if frame.persons.len() > peak.persons.len() {
            peak = frame;
        }
    }
    let total: usize = frames.iter().map(|f| f.persons.len()).sum();
    TemporalAnalysis {
        peak_time_seconds: peak.timestamp,
        peak_person_count: peak.persons.len(),
        average_person_count: round3(total as f64 / frames.len() as f64),
    }
}

fn most_common(distribution: &BTreeMap<String, usize>) -> Option<&str> {
    let mut best: Option<(&str, usize)> = None;
    for (key, count) in distribution {
        if best.map_or(true, |(_, c)| *count > c) {
            best = Some((key.as_str(), *count));
        }
    }
    best.map(|(key, _)| key)
}

pub fn key_insights(
    frames: &[Frame],
    quality: &QualityAssessment,
    diversity: &SceneDiversity,
) -> Vec<String> {
    let mut insights = Vec::new();

    insights.push(
        match quality.status.as_str() {
            "excellent" => "Video quality is excellent",
            "good" => "Video quality is good",
            "fair" => "Video quality is fair",
            _ => "Video quality needs improvement",
        }
        .to_string(),
    );

    if let Some(scene_type) = most_common(&diversity.scene_type_distribution) {
        insights.push(format!("Main scene type: {}", scene_type));
    }
    if let Some(activity) = most_common(&diversity.activity_level_distribution) {
        insights.push(format!("Main activity level: {}", activity));
    }

    if !frames.is_empty() {
        let avg = frames.iter().map(|f| f.brightness).sum::<f64>() / frames.len() as f64;
        insights.push(
            if avg > 150.0 {
                "The video is bright"
            } else if avg < 100.0 {
                "The video is dark"
            } else {
                "The video has moderate brightness"
            }
            .to_string(),
        );
    }

    insights.truncate(MAX_INSIGHTS);
    insights
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::video_store::PersonDetection;

    pub(crate) fn person(index: i64) -> PersonDetection {
        PersonDetection {
            id: 0,
            frame_id: 0,
            video_id: 0,
            person_index: index,
            bbox: [0.1, 0.1, 0.4, 0.9],
            confidence: 0.9,
            gender: "male".to_string(),
            gender_confidence: 0.8,
            age_group: "young_adult".to_string(),
            age_confidence: 0.8,
            estimated_age: Some(28),
            upper_color: "red".to_string(),
            lower_color: "blue".to_string(),
            analysis_source: "detector".to_string(),
        }
    }

    pub(crate) fn frame(image_id: i64, brightness: f64, edge_density: f64, persons: usize) -> Frame {
        Frame {
            id: 0,
            video_id: 0,
            image_id,
            timestamp: image_id as f64,
            image_path: None,
            caption: None,
            dominant_colors: Vec::new(),
            scene: classify_scene(brightness, edge_density),
            brightness,
            edge_density,
            persons: (0..persons as i64).map(person).collect(),
            objects: Vec::new(),
        }
    }

    fn stats(mean_color: [f64; 3], edge_density: f64) -> FrameStats {
        FrameStats {
            mean_color,
            brightness: mean_color.iter().sum::<f64>() / 3.0,
            edge_density,
            dominant_colors: Vec::new(),
        }
    }

    #[test]
    fn scene_thresholds() {
        let attrs = classify_scene(160.0, 0.06);
        assert_eq!(attrs.setting, Setting::Outdoor);
        assert_eq!(attrs.lighting, Lighting::Bright);
        assert_eq!(attrs.activity_level, ActivityLevel::High);
        assert_eq!(attrs.complexity, SceneComplexity::Detailed);

        let attrs = classify_scene(110.0, 0.03);
        assert_eq!(attrs.setting, Setting::Indoor);
        assert_eq!(attrs.lighting, Lighting::Normal);
        assert_eq!(attrs.activity_level, ActivityLevel::Medium);
        assert_eq!(attrs.complexity, SceneComplexity::Medium);

        let attrs = classify_scene(130.0, 0.045);
        assert_eq!(attrs.setting, Setting::Outdoor);
        assert_eq!(attrs.activity_level, ActivityLevel::High);
        assert_eq!(attrs.complexity, SceneComplexity::Medium);

        let attrs = classify_scene(100.0, 0.02);
        assert_eq!(attrs.lighting, Lighting::Dark);
        assert_eq!(attrs.activity_level, ActivityLevel::Low);
        assert_eq!(attrs.complexity, SceneComplexity::Simple);
    }

    #[test]
    fn quality_of_a_balanced_bright_video() {
        let q = assess_quality(&[stats([150.0, 150.0, 150.0], 0.1)]);
        assert_eq!(q.brightness_score, 1.0);
        assert_eq!(q.contrast_score, 0.0);
        assert_eq!(q.sharpness_score, 1.0);
        assert_eq!(q.color_balance_score, 1.0);
        assert_eq!(q.overall_score, 0.75);
        assert_eq!(q.status, "excellent");
    }

    #[test]
    fn quality_scores_are_rounded_and_clamped() {
        let q = assess_quality(&[stats([10.0, 20.0, 30.0], 0.001)]);
        assert_eq!(q.brightness_score, 0.0);
        // std of (10, 20, 30) is 8.165
        assert_eq!(q.contrast_score, 0.163);
        assert_eq!(q.sharpness_score, 0.01);
        assert_eq!(q.color_balance_score, 0.592);
        assert_eq!(q.status, "poor");

        assert_eq!(assess_quality(&[]).status, "unknown");
    }

    #[test]
    fn diversity_counts_types_per_frame() {
        let frames = vec![
            frame(1, 160.0, 0.06, 0),
            frame(2, 160.0, 0.06, 0),
            frame(3, 90.0, 0.01, 0),
            frame(4, 110.0, 0.03, 0),
        ];
        let d = scene_diversity(&frames);
        assert_eq!(d.scene_type_distribution["detailed"], 2);
        assert_eq!(d.scene_type_distribution["simple"], 1);
        assert_eq!(d.lighting_distribution["bright"], 2);
        assert_eq!(d.activity_level_distribution["high"], 2);
        assert_eq!(d.diversity_score, 0.75);
    }

    #[test]
    fn temporal_peak_and_average() {
        let frames = vec![frame(1, 100.0, 0.0, 1), frame(2, 100.0, 0.0, 3), frame(3, 100.0, 0.0, 0)];
        let t = temporal_analysis(&frames);
        assert_eq!(t.peak_person_count, 3);
        assert_eq!(t.peak_time_seconds, 2.0);
        assert_eq!(t.average_person_count, 1.333);
    }

    #[test]
    fn insights_mention_quality_scene_activity_and_brightness() {
        let frames = vec![frame(1, 160.0, 0.06, 0), frame(2, 170.0, 0.06, 0)];
        let q = assess_quality(&[stats([160.0, 160.0, 160.0], 0.1)]);
        let d = scene_diversity(&frames);
        let insights = key_insights(&frames, &q, &d);
        assert_eq!(
            insights,
            vec![
                "Video quality is excellent",
                "Main scene type: detailed",
                "Main activity level: high",
                "The video is bright",
            ]
        );
    }
}
