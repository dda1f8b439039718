//! Chat about analyzed videos: intent routing, deterministic findings and
//! multi-model answers.

mod frame_search;
mod handler;
mod highlights;
mod intent;
mod memory;
mod people;
mod summary;

pub use frame_search::{
    color_synonyms, normalize_color, search_by_color, search_by_keywords, FrameMatch,
    MAX_FRAME_MATCHES,
};
pub use handler::{frame_image_url, ChatReply, ChatRequest, ReferencedFrame, VideoChatHandler};
pub use highlights::{
    chat_highlights, extract_highlights, highlight_score, Highlight, HighlightCriteria,
    Significance,
};
pub use intent::{classify, detect_color, extract_keywords, is_video_related, ChatIntent, SummaryType};
pub use memory::ConversationMemory;
pub use people::{
    analyze_gender_ratio, analyze_people_count, caption_head_count, Confidence,
    GenderRatioAnalysis, PeopleCountAnalysis, PeopleEstimate,
};
pub use summary::{summarize_video, KeyEvent, VideoStatistics, VideoSummaryReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Video not found: {0}")]
    VideoNotFound(i64),

    #[error("Chat session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
