//! Shared constants for end-to-end tests

// ============================================================================
// Synthetic video
// ============================================================================

/// Frames in every synthetic test video.
pub const TEST_VIDEO_FRAMES: u64 = 600;

/// Frame rate of the synthetic video, so it lasts 20 seconds.
pub const TEST_VIDEO_FPS: f64 = 30.0;

/// Name the test video is uploaded with.
pub const TEST_VIDEO_NAME: &str = "street_camera.mp4";

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server ready checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// HTTP request timeout (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long a test waits for an analysis to finish (milliseconds)
pub const ANALYSIS_TIMEOUT_MS: u64 = 10_000;
