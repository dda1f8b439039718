//! Keyword routing of chat messages.

use serde::Serialize;

const VIDEO_KEYWORDS: &[&str] = &[
    "영상", "video", "동영상", "비디오", "사람", "people", "person", "남자", "여자", "man",
    "woman", "옷", "clothing", "shirt", "jacket", "색상", "color", "배경", "background",
    "scene", "장면", "몇", "how many", "count", "개수", "있", "is there", "are there", "찾",
    "find", "search", "쇼핑몰", "mall", "shopping", "거리", "street", "밤", "night", "낮",
    "day", "전화", "phone", "걷", "walk", "요약", "summary", "summarize", "하이라이트",
    "highlight",
];

const HIGHLIGHT_KEYWORDS: &[&str] = &["하이라이트", "highlight", "주요 장면", "핵심 장면", "중요한 장면"];
const SUMMARY_KEYWORDS: &[&str] = &["요약", "summary", "summarize", "정리"];
const PEOPLE_COUNT_KEYWORDS: &[&str] =
    &["몇명", "몇 명", "사람 수", "인원", "how many people", "how many person"];
const GENDER_KEYWORDS: &[&str] = &[
    "성비", "남녀비", "성별", "남성", "여성", "남자", "여자", "gender ratio", "male female",
];

/// Color words recognized in chat messages, in matching order.
const CHAT_COLOR_WORDS: &[(&str, &str)] = &[
    ("분홍", "pink"),
    ("핑크", "pink"),
    ("pink", "pink"),
    ("빨강", "red"),
    ("빨간", "red"),
    ("red", "red"),
    ("파랑", "blue"),
    ("파란", "blue"),
    ("blue", "blue"),
    ("노랑", "yellow"),
    ("노란", "yellow"),
    ("yellow", "yellow"),
    ("초록", "green"),
    ("녹색", "green"),
    ("green", "green"),
    ("하양", "white"),
    ("흰", "white"),
    ("white", "white"),
    ("검정", "black"),
    ("검은", "black"),
    ("black", "black"),
    ("주황", "orange"),
    ("오렌지", "orange"),
    ("orange", "orange"),
    ("보라", "purple"),
    ("purple", "purple"),
    ("회색", "gray"),
    ("gray", "gray"),
    ("grey", "gray"),
];

const STOPWORDS: &[&str] = &[
    "보여줘", "알려줘", "있나요", "나와", "등장", "장면", "나오는", "하는", "이", "가", "을",
    "를", "에", "의",
];

/// Extra search terms added when a message mentions one of these words.
const KEYWORD_EXPANSIONS: &[(&str, &[&str])] = &[
    ("모자", &["hat", "cap", "beanie"]),
    ("기타", &["guitar"]),
    ("커피", &["coffee", "cup"]),
];

pub const MAX_SEARCH_KEYWORDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    Brief,
    Detailed,
    Comprehensive,
}

impl SummaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::Brief => "brief",
            SummaryType::Detailed => "detailed",
            SummaryType::Comprehensive => "comprehensive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "brief" => Some(SummaryType::Brief),
            "detailed" => Some(SummaryType::Detailed),
            "comprehensive" => Some(SummaryType::Comprehensive),
            _ => None,
        }
    }

    /// Summary depth asked for in a chat message.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("간단") || lower.contains("brief") {
            SummaryType::Brief
        } else if lower.contains("상세") || lower.contains("detailed") {
            SummaryType::Detailed
        } else {
            SummaryType::Comprehensive
        }
    }
}

/// What a chat message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatIntent {
    /// Not about the video at all.
    General,
    Summary(SummaryType),
    Highlights,
    PeopleCount,
    GenderRatio,
    /// Clothing or caption color search, with the English color name.
    ColorSearch(String),
    KeywordSearch(Vec<String>),
    /// A video question with no searchable keywords.
    Overview,
}

impl ChatIntent {
    pub fn name(&self) -> &'static str {
        match self {
            ChatIntent::General => "general",
            ChatIntent::Summary(_) => "summary",
            ChatIntent::Highlights => "highlights",
            ChatIntent::PeopleCount => "people_count",
            ChatIntent::GenderRatio => "gender_ratio",
            ChatIntent::ColorSearch(_) => "color_search",
            ChatIntent::KeywordSearch(_) => "keyword_search",
            ChatIntent::Overview => "overview",
        }
    }

    pub fn is_video_related(&self) -> bool {
        !matches!(self, ChatIntent::General)
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

pub fn is_video_related(message: &str) -> bool {
    contains_any(&message.to_lowercase(), VIDEO_KEYWORDS)
}

/// English color named in a chat message, if any.
pub fn detect_color(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    CHAT_COLOR_WORDS
        .iter()
        .find(|(word, _)| lower.contains(word))
        .map(|(_, color)| *color)
}

/// Search keywords of a message: stopwords and one-character words dropped,
/// domain expansions appended, capped at [`MAX_SEARCH_KEYWORDS`].
pub fn extract_keywords(message: &str) -> Vec<String> {
    let mut keywords: Vec<String> = message
        .split_whitespace()
        .filter(|word| word.chars().count() > 1 && !STOPWORDS.contains(word))
        .map(|word| word.to_lowercase())
        .collect();

    for (trigger, expansions) in KEYWORD_EXPANSIONS {
        if message.contains(trigger) {
            keywords.extend(expansions.iter().map(|s| s.to_string()));
        }
    }

    keywords.truncate(MAX_SEARCH_KEYWORDS);
    keywords
}

/// Route a message. Checks run in a fixed order and the first match wins.
pub fn classify(message: &str) -> ChatIntent {
    if !is_video_related(message) {
        return ChatIntent::General;
    }
    let lower = message.to_lowercase();

    if contains_any(&lower, HIGHLIGHT_KEYWORDS) {
        return ChatIntent::Highlights;
    }
    if contains_any(&lower, SUMMARY_KEYWORDS) {
        return ChatIntent::Summary(SummaryType::from_message(message));
    }
    if contains_any(&lower, PEOPLE_COUNT_KEYWORDS) {
        return ChatIntent::PeopleCount;
    }
    if contains_any(&lower, GENDER_KEYWORDS) {
        return ChatIntent::GenderRatio;
    }
    if let Some(color) = detect_color(message) {
        return ChatIntent::ColorSearch(color.to_string());
    }

    let keywords = extract_keywords(message);
    if keywords.is_empty() {
        ChatIntent::Overview
    } else {
        ChatIntent::KeywordSearch(keywords)
    }
}
