use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub media_path: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Feature configs
    pub upload: Option<UploadConfig>,
    pub analysis: Option<AnalysisConfig>,
    pub detector: Option<DetectorConfig>,
    pub llm: Option<LlmConfig>,
    pub background_jobs: Option<BackgroundJobsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub max_size_mb: Option<u64>,
    pub allowed_extensions: Option<Vec<String>>,
    pub max_name_length: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_samples: Option<usize>,
    pub min_samples: Option<usize>,
    /// Ask the first LLM provider to caption frames (needs a vision model).
    pub caption_with_llm: Option<bool>,
    /// Start analysis right after a successful upload.
    pub auto_start: Option<bool>,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DetectorConfig {
    pub url: Option<String>,
    pub attribute_url: Option<String>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub providers: Option<Vec<LlmProviderConfig>>,
    pub temperature: Option<f32>,
    pub timeout_sec: Option<u64>,
    pub history_messages: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmProviderConfig {
    /// "openai" or "ollama"
    pub kind: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackgroundJobsConfig {
    pub status_sync_interval_sec: Option<u64>,
    pub orphan_cleanup_interval_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
