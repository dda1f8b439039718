//! Validation and storage of uploaded video files.

use crate::config::UploadSettings;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Filename too long: {0} characters (max: {1})")]
    NameTooLong(usize, usize),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("File content is not a supported video: {0}")]
    UnsupportedContent(String),

    #[error("File too large: {0} bytes (max: {1})")]
    FileTooLarge(u64, u64),
}

impl UploadError {
    /// Whether the client sent something invalid, as opposed to a server-side failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, UploadError::Io(_))
    }
}

/// An upload written to the uploads directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Unique name of the stored file.
    pub filename: String,
    /// Sanitized name the client uploaded the file with.
    pub original_name: String,
    pub file_path: PathBuf,
    pub size: u64,
    /// Hex SHA-256 of the content.
    pub content_hash: String,
}

pub struct FileHandler {
    uploads_dir: PathBuf,
    settings: UploadSettings,
}

impl FileHandler {
    pub fn new(uploads_dir: impl Into<PathBuf>, settings: UploadSettings) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            settings,
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.settings.max_size_bytes
    }

    pub fn max_name_length(&self) -> usize {
        self.settings.max_name_length
    }

    /// Creates the uploads directory.
    pub async fn init(&self) -> Result<(), UploadError> {
        fs::create_dir_all(&self.uploads_dir).await?;
        Ok(())
    }

    fn extension_of(name: &str) -> Option<String> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// Check name, extension, size and content of an upload.
    /// Returns the sanitized file name.
    pub fn validate(&self, filename: &str, data: &[u8]) -> Result<String, UploadError> {
        let name_length = filename.chars().count();
        if name_length > self.settings.max_name_length {
            return Err(UploadError::NameTooLong(
                name_length,
                self.settings.max_name_length,
            ));
        }
        let safe_name = sanitize_filename(filename)?;

        let extension = Self::extension_of(&safe_name)
            .ok_or_else(|| UploadError::UnsupportedExtension(safe_name.clone()))?;
        if !self.settings.allowed_extensions.contains(&extension) {
            return Err(UploadError::UnsupportedExtension(extension));
        }

        let size = data.len() as u64;
        if size == 0 {
            return Err(UploadError::EmptyFile);
        }
        if size > self.settings.max_size_bytes {
            return Err(UploadError::FileTooLarge(size, self.settings.max_size_bytes));
        }

        match infer::get(data) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Video => {
                debug!("Upload {} sniffed as {}", safe_name, kind.mime_type());
            }
            Some(kind) => {
                return Err(UploadError::UnsupportedContent(kind.mime_type().to_string()))
            }
            None => return Err(UploadError::UnsupportedContent("unknown".to_string())),
        }

        Ok(safe_name)
    }

    /// Validate and write an upload under a unique name.
    pub async fn save_upload(&self, filename: &str, data: &[u8]) -> Result<StoredUpload, UploadError> {
        let original_name = self.validate(filename, data)?;

        fs::create_dir_all(&self.uploads_dir).await?;
        let stored_name = format!("{}_{}", uuid::Uuid::new_v4().simple(), original_name);
        let file_path = self.uploads_dir.join(&stored_name);

        let mut file = fs::File::create(&file_path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(StoredUpload {
            filename: stored_name,
            original_name,
            file_path,
            size: data.len() as u64,
            content_hash: content_hash(data),
        })
    }

    /// Remove a stored upload. A missing file is not an error.
    pub async fn remove_upload(&self, file_path: &Path) -> Result<bool, UploadError> {
        match fs::remove_file(file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {:?} was already gone", file_path);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Sanitize a filename to prevent path traversal attacks.
pub fn sanitize_filename(filename: &str) -> Result<String, UploadError> {
    let name = Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| UploadError::InvalidFilename(filename.to_string()))?;

    if name.contains('\0') || name.starts_with('.') {
        return Err(UploadError::InvalidFilename(filename.to_string()));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();

    if sanitized.is_empty() {
        return Err(UploadError::InvalidFilename(filename.to_string()));
    }
    Ok(sanitized)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Smallest byte prefix recognized as an MP4 container.
    pub(crate) fn mp4_bytes() -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x00, 0x18];
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
        data.extend_from_slice(b"isomiso2avc1mp41");
        data.extend_from_slice(&[0u8; 64]);
        data
    }

    fn handler(dir: &Path) -> FileHandler {
        FileHandler::new(
            dir,
            UploadSettings {
                max_size_bytes: 1024,
                allowed_extensions: vec!["mp4".to_string(), "webm".to_string()],
                max_name_length: 20,
            },
        )
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("clip.mp4").unwrap(), "clip.mp4");
        assert_eq!(sanitize_filename("/tmp/evil/clip.mp4").unwrap(), "clip.mp4");
        assert_eq!(sanitize_filename("a:b*c.mp4").unwrap(), "a_b_c.mp4");
        assert_eq!(sanitize_filename("여행 영상.mp4").unwrap(), "여행 영상.mp4");
        assert!(sanitize_filename(".hidden.mp4").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("").is_err());
    }

    #[test]
    fn validate_checks_every_rule() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let data = mp4_bytes();

        assert_eq!(handler.validate("Clip.MP4", &data).unwrap(), "Clip.MP4");
        assert!(matches!(
            handler.validate("a-very-long-video-name.mp4", &data),
            Err(UploadError::NameTooLong(26, 20))
        ));
        assert!(matches!(
            handler.validate("clip.txt", &data),
            Err(UploadError::UnsupportedExtension(_))
        ));
        assert!(matches!(handler.validate("clip.mp4", &[]), Err(UploadError::EmptyFile)));
        assert!(matches!(
            handler.validate("clip.mp4", &[0u8; 2048]),
            Err(UploadError::FileTooLarge(2048, 1024))
        ));
        assert!(matches!(
            handler.validate("clip.mp4", b"just some text, not a video"),
            Err(UploadError::UnsupportedContent(_))
        ));
    }

    #[tokio::test]
    async fn save_upload_writes_a_uniquely_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(&dir.path().join("uploads"));
        let data = mp4_bytes();

        let first = handler.save_upload("clip.mp4", &data).await.unwrap();
        let second = handler.save_upload("clip.mp4", &data).await.unwrap();
        assert_ne!(first.filename, second.filename);
        assert!(first.filename.ends_with("_clip.mp4"));
        assert_eq!(first.original_name, "clip.mp4");
        assert_eq!(first.size, data.len() as u64);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.content_hash.len(), 64);
        assert_eq!(tokio::fs::read(&first.file_path).await.unwrap(), data);

        assert!(handler.remove_upload(&first.file_path).await.unwrap());
        assert!(!handler.remove_upload(&first.file_path).await.unwrap());
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
