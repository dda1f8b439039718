//! Files on disk: uploaded videos.

mod file_handler;

pub use file_handler::{content_hash, sanitize_filename, FileHandler, StoredUpload, UploadError};

#[cfg(test)]
pub(crate) use file_handler::tests::mp4_bytes;
