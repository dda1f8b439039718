//! Structured search over analysis results: frames and people inside one
//! video, relevance across videos, and time window statistics.

mod cross_video;
mod persons;
mod temporal;

pub use cross_video::{
    matched_scenes, rank_videos, relevance_score, CrossVideoQuery, MatchedScene, VideoMatch,
    MAX_VIDEO_RESULTS, MIN_RELEVANCE,
};
pub use persons::{
    describe_person, query_colors, search_persons, AgeFilter, PersonCriteria, PersonMatch,
};
pub use temporal::{
    activity_pattern, age_distribution, analyze_time_range, gender_distribution, ActivityPattern,
    AgeDistribution, GenderDistribution, TemporalAnalysisKind, TemporalResult, TimeRange,
};

use crate::chat::{
    detect_color, extract_keywords, search_by_color, search_by_keywords, ReferencedFrame,
};
use crate::video_store::{AnalysisStatus, Video, VideoStore};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search query is empty")]
    EmptyQuery,

    #[error("Query names no color, gender or age to search for")]
    NoCriteria,

    #[error("Invalid time range: start must be >= 0 and <= end")]
    InvalidTimeRange,

    #[error("Video not found: {0}")]
    VideoNotFound(i64),

    #[error("Video {0} has not been analyzed yet")]
    NotAnalyzed(i64),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// How frames of one video are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameQuery {
    Color(String),
    Keywords(Vec<String>),
}

impl FrameQuery {
    /// A color named in the text wins over plain keywords.
    pub fn from_text(text: &str) -> Option<Self> {
        if let Some(color) = detect_color(text) {
            return Some(FrameQuery::Color(color.to_string()));
        }
        let keywords = extract_keywords(text);
        (!keywords.is_empty()).then_some(FrameQuery::Keywords(keywords))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FrameQuery::Color(_) => "color",
            FrameQuery::Keywords(_) => "keywords",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameSearchResponse {
    pub video_id: i64,
    pub query: String,
    pub search_type: &'static str,
    pub results: Vec<ReferencedFrame>,
    pub total_results: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonSearchResponse {
    pub video_id: i64,
    pub video_name: String,
    pub query: String,
    pub criteria: PersonCriteria,
    pub results: Vec<PersonMatch>,
    pub total_results: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossVideoResponse {
    pub query: String,
    pub results: Vec<VideoMatch>,
    pub total_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemporalResponse {
    pub video_id: i64,
    pub video_name: String,
    pub time_range: TimeRange,
    pub analysis_type: TemporalAnalysisKind,
    pub result: TemporalResult,
}

/// Runs searches against the video store.
pub struct VideoSearch {
    store: Arc<dyn VideoStore>,
}

impl VideoSearch {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    fn analyzed_video(&self, video_id: i64) -> Result<Video, SearchError> {
        let video = self
            .store
            .get_video(video_id)?
            .ok_or(SearchError::VideoNotFound(video_id))?;
        if !video.is_analyzed() {
            return Err(SearchError::NotAnalyzed(video_id));
        }
        Ok(video)
    }

    /// Frames of a video matching a color or caption keywords. An explicit
    /// color overrides whatever the text names.
    pub fn search_frames(
        &self,
        video_id: i64,
        query: &str,
        color: Option<&str>,
    ) -> Result<FrameSearchResponse, SearchError> {
        let frame_query = match color.map(str::trim).filter(|c| !c.is_empty()) {
            Some(color) => FrameQuery::Color(color.to_string()),
            None => FrameQuery::from_text(query).ok_or(SearchError::EmptyQuery)?,
        };
        self.analyzed_video(video_id)?;
        let frames = self.store.get_frames(video_id)?;

        let matches = match &frame_query {
            FrameQuery::Color(color) => search_by_color(&frames, color),
            FrameQuery::Keywords(keywords) => search_by_keywords(&frames, keywords),
        };
        let results: Vec<ReferencedFrame> = matches
            .iter()
            .map(|m| ReferencedFrame::new(video_id, m.frame, Some(m.score)))
            .collect();
        debug!(
            "Frame search in video {} ({}): {} results",
            video_id,
            frame_query.kind(),
            results.len()
        );

        Ok(FrameSearchResponse {
            video_id,
            query: query.to_string(),
            search_type: frame_query.kind(),
            total_results: results.len(),
            results,
        })
    }

    pub fn search_persons(
        &self,
        video_id: i64,
        query: &str,
    ) -> Result<PersonSearchResponse, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let criteria = PersonCriteria::parse(query);
        if criteria.is_empty() {
            return Err(SearchError::NoCriteria);
        }
        let video = self.analyzed_video(video_id)?;
        let frames = self.store.get_frames(video_id)?;
        let results = search_persons(&frames, &criteria);
        info!(
            "Person search in video {} for {:?}: {} matches",
            video_id,
            query,
            results.len()
        );

        Ok(PersonSearchResponse {
            video_id,
            video_name: video.original_name,
            query: query.to_string(),
            criteria,
            total_results: results.len(),
            results,
        })
    }

    /// Rank every completed video. Videos whose frames cannot be read are
    /// skipped.
    pub fn search_videos(&self, query: &str) -> Result<CrossVideoResponse, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let videos = self.store.list_videos_by_status(AnalysisStatus::Completed)?;
        if videos.is_empty() {
            return Ok(CrossVideoResponse {
                query: query.to_string(),
                results: Vec::new(),
                total_results: 0,
                message: Some("No analyzed videos yet.".to_string()),
            });
        }

        let parsed = CrossVideoQuery::parse(query);
        let mut matches = Vec::new();
        for video in &videos {
            match self.store.get_frames(video.id) {
                Ok(frames) => matches.extend(VideoMatch::build(video, &frames, &parsed)),
                Err(err) => warn!("Skipping video {} in cross-video search: {:#}", video.id, err),
            }
        }
        let results = rank_videos(matches);
        info!(
            "Cross-video search for {:?}: {} of {} videos relevant",
            query,
            results.len(),
            videos.len()
        );

        Ok(CrossVideoResponse {
            query: query.to_string(),
            total_results: results.len(),
            results,
            message: None,
        })
    }

    pub fn analyze_time_range(
        &self,
        video_id: i64,
        range: TimeRange,
        kind: TemporalAnalysisKind,
    ) -> Result<TemporalResponse, SearchError> {
        if !range.is_valid() {
            return Err(SearchError::InvalidTimeRange);
        }
        let video = self.analyzed_video(video_id)?;
        let frames = self.store.get_frames(video_id)?;

        Ok(TemporalResponse {
            video_id,
            video_name: video.original_name,
            time_range: range,
            analysis_type: kind,
            result: analyze_time_range(&frames, range, kind),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::frame;
    use crate::chat::test_support::analysis_summary;
    use crate::video_store::{AnalysisResults, NewVideo, SqliteVideoStore};

    fn store_with_video(frames: Vec<crate::video_store::Frame>) -> (Arc<dyn VideoStore>, i64) {
        let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::in_memory().unwrap());
        let video = store
            .create_video(&NewVideo {
                filename: "a_street.mp4".to_string(),
                original_name: "street.mp4".to_string(),
                file_path: "/tmp/a_street.mp4".to_string(),
                file_size: 10,
                content_hash: "ab".repeat(32),
            })
            .unwrap();
        store
            .save_analysis_results(
                video.id,
                &AnalysisResults {
                    frames,
                    scenes: Vec::new(),
                    summary: analysis_summary(1, 1),
                },
            )
            .unwrap();
        (store, video.id)
    }

    #[test]
    fn frame_queries() {
        assert_eq!(
            FrameQuery::from_text("빨간 옷 입은 사람"),
            Some(FrameQuery::Color("red".to_string()))
        );
        assert!(matches!(
            FrameQuery::from_text("dog park"),
            Some(FrameQuery::Keywords(_))
        ));
        assert_eq!(FrameQuery::from_text("  "), None);
    }

    #[test]
    fn searches_require_an_analyzed_video() {
        let store: Arc<dyn VideoStore> = Arc::new(SqliteVideoStore::in_memory().unwrap());
        let search = VideoSearch::new(store);
        assert!(matches!(
            search.search_persons(42, "red"),
            Err(SearchError::VideoNotFound(42))
        ));
        assert!(matches!(search.search_persons(42, ""), Err(SearchError::EmptyQuery)));
        assert!(matches!(
            search.search_persons(42, "something"),
            Err(SearchError::NoCriteria)
        ));
        assert!(matches!(
            search.analyze_time_range(
                42,
                TimeRange { start: 5.0, end: 1.0 },
                TemporalAnalysisKind::default()
            ),
            Err(SearchError::InvalidTimeRange)
        ));

        let response = search.search_videos("red").unwrap();
        assert_eq!(response.total_results, 0);
        assert!(response.message.is_some());
    }

    #[test]
    fn searches_over_stored_frames() {
        let (store, video_id) = store_with_video(vec![
            frame(1, 130.0, 0.03, 1),
            frame(2, 40.0, 0.01, 2),
        ]);
        let search = VideoSearch::new(store);

        let persons = search.search_persons(video_id, "red male").unwrap();
        assert_eq!(persons.total_results, 3);
        assert_eq!(persons.video_name, "street.mp4");

        let frames = search.search_frames(video_id, "", Some("blue")).unwrap();
        assert_eq!(frames.search_type, "color");
        assert_eq!(frames.total_results, 2);
        assert_eq!(frames.results[0].image_url, format!("/v1/videos/{}/frames/2/image", video_id));

        let videos = search.search_videos("dark night").unwrap();
        assert_eq!(videos.total_results, 1);
        assert_eq!(videos.results[0].relevance_score, 0.5);

        let temporal = search
            .analyze_time_range(
                video_id,
                TimeRange { start: 0.0, end: 1.5 },
                TemporalAnalysisKind::GenderDistribution,
            )
            .unwrap();
        let TemporalResult::Gender(dist) = temporal.result else {
            panic!("expected a gender distribution");
        };
        assert_eq!(dist.total_persons, 1);
    }
}
