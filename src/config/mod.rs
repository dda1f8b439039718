mod file_config;

pub use file_config::{
    AnalysisConfig, BackgroundJobsConfig, DetectorConfig, FileConfig, LlmConfig,
    LlmProviderConfig, UploadConfig,
};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llava";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub max_upload_mb: Option<u64>,
    pub detector_url: Option<String>,
    pub llm_provider: Option<String>,
    pub llm_url: Option<String>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub media_path: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub upload: UploadSettings,
    pub analysis: AnalysisSettings,
    pub detector: DetectorSettings,
    pub llm: LlmSettings,
    pub background_jobs: BackgroundJobsSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .unwrap_or_else(|| db_dir.clone());

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let upload_file = file.upload.unwrap_or_default();
        let upload_defaults = UploadSettings::default();
        let upload = UploadSettings {
            max_size_bytes: upload_file
                .max_size_mb
                .or(cli.max_upload_mb)
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(upload_defaults.max_size_bytes),
            allowed_extensions: upload_file
                .allowed_extensions
                .map(|exts| exts.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect())
                .unwrap_or(upload_defaults.allowed_extensions),
            max_name_length: upload_file
                .max_name_length
                .unwrap_or(upload_defaults.max_name_length),
        };
        if upload.allowed_extensions.is_empty() {
            bail!("upload.allowed_extensions must not be empty");
        }

        let analysis_file = file.analysis.unwrap_or_default();
        let analysis_defaults = AnalysisSettings::default();
        let analysis = AnalysisSettings {
            max_samples: analysis_file
                .max_samples
                .unwrap_or(analysis_defaults.max_samples),
            min_samples: analysis_file
                .min_samples
                .unwrap_or(analysis_defaults.min_samples),
            caption_with_llm: analysis_file
                .caption_with_llm
                .unwrap_or(analysis_defaults.caption_with_llm),
            auto_start: analysis_file
                .auto_start
                .unwrap_or(analysis_defaults.auto_start),
            ffmpeg_path: analysis_file
                .ffmpeg_path
                .unwrap_or(analysis_defaults.ffmpeg_path),
            ffprobe_path: analysis_file
                .ffprobe_path
                .unwrap_or(analysis_defaults.ffprobe_path),
        };
        if analysis.min_samples == 0 || analysis.min_samples > analysis.max_samples {
            bail!(
                "analysis.min_samples must be between 1 and max_samples ({}), got {}",
                analysis.max_samples,
                analysis.min_samples
            );
        }

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            url: detector_file.url.or_else(|| cli.detector_url.clone()),
            attribute_url: detector_file.attribute_url,
            timeout_sec: detector_file.timeout_sec.unwrap_or(30),
        };

        let llm_file = file.llm.unwrap_or_default();
        let providers = match llm_file.providers {
            Some(providers) => providers
                .iter()
                .map(LlmProviderSettings::from_file)
                .collect::<Result<Vec<_>>>()?,
            None => match &cli.llm_provider {
                Some(kind) => vec![LlmProviderSettings::resolve(
                    kind,
                    cli.llm_url.clone(),
                    cli.llm_model.clone(),
                    cli.llm_api_key.clone(),
                )?],
                None => Vec::new(),
            },
        };
        let llm_defaults = LlmSettings::default();
        let llm = LlmSettings {
            providers,
            temperature: llm_file.temperature.unwrap_or(llm_defaults.temperature),
            timeout_sec: llm_file.timeout_sec.unwrap_or(llm_defaults.timeout_sec),
            history_messages: llm_file
                .history_messages
                .unwrap_or(llm_defaults.history_messages),
        };

        let jobs_file = file.background_jobs.unwrap_or_default();
        let jobs_defaults = BackgroundJobsSettings::default();
        let background_jobs = BackgroundJobsSettings {
            status_sync_interval_sec: jobs_file
                .status_sync_interval_sec
                .unwrap_or(jobs_defaults.status_sync_interval_sec),
            orphan_cleanup_interval_sec: jobs_file
                .orphan_cleanup_interval_sec
                .unwrap_or(jobs_defaults.orphan_cleanup_interval_sec),
        };

        Ok(Self {
            db_dir,
            media_path,
            port,
            logging_level,
            frontend_dir_path,
            upload,
            analysis,
            detector,
            llm,
            background_jobs,
        })
    }

    pub fn video_db_path(&self) -> PathBuf {
        self.db_dir.join("videos.db")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.media_path.join("uploads")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.media_path.join("frames")
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_size_bytes: u64,
    /// Lowercase, without the leading dot.
    pub allowed_extensions: Vec<String>,
    pub max_name_length: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_size_bytes: 50 * 1024 * 1024,
            allowed_extensions: ["mp4", "avi", "mov", "mkv", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_name_length: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub max_samples: usize,
    pub min_samples: usize,
    pub caption_with_llm: bool,
    pub auto_start: bool,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_samples: 100,
            min_samples: 5,
            caption_with_llm: false,
            auto_start: true,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetectorSettings {
    /// Object detection service; no detector is used when absent.
    pub url: Option<String>,
    /// Gender/age classification service for person crops.
    pub attribute_url: Option<String>,
    pub timeout_sec: u64,
}

impl DetectorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenAI,
    Ollama,
}

impl LlmProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(LlmProviderKind::OpenAI),
            "ollama" => Some(LlmProviderKind::Ollama),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmProviderSettings {
    pub kind: LlmProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl LlmProviderSettings {
    fn resolve(
        kind: &str,
        base_url: Option<String>,
        model: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let Some(kind) = LlmProviderKind::parse(kind) else {
            bail!("Unknown LLM provider '{}', expected openai or ollama", kind);
        };
        let (default_url, default_model) = match kind {
            LlmProviderKind::OpenAI => (DEFAULT_OPENAI_URL, DEFAULT_OPENAI_MODEL),
            LlmProviderKind::Ollama => (DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL),
        };
        Ok(Self {
            kind,
            base_url: base_url.unwrap_or_else(|| default_url.to_string()),
            model: model.unwrap_or_else(|| default_model.to_string()),
            api_key,
        })
    }

    fn from_file(config: &LlmProviderConfig) -> Result<Self> {
        Self::resolve(
            &config.kind,
            config.base_url.clone(),
            config.model.clone(),
            config.api_key.clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Providers in priority order; the first one integrates multi-model answers.
    pub providers: Vec<LlmProviderSettings>,
    pub temperature: f32,
    pub timeout_sec: u64,
    /// How many previous chat messages are replayed to the model.
    pub history_messages: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            temperature: 0.3,
            timeout_sec: 120,
            history_messages: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackgroundJobsSettings {
    pub status_sync_interval_sec: u64,
    pub orphan_cleanup_interval_sec: u64,
}

impl Default for BackgroundJobsSettings {
    fn default() -> Self {
        Self {
            status_sync_interval_sec: 300,
            orphan_cleanup_interval_sec: 3600,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
