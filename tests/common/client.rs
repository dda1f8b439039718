//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all video-chat-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post_json(&self, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("POST request failed")
    }

    // ========================================================================
    // Server
    // ========================================================================

    pub async fn get_stats(&self) -> Response {
        self.get("/").await
    }

    // ========================================================================
    // Videos
    // ========================================================================

    /// POST /v1/videos with the bytes under the `video` multipart field
    pub async fn upload_video(&self, filename: &str, data: Vec<u8>) -> Response {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("video/mp4")
            .expect("Invalid mime type");
        let form = Form::new().part("video", part);
        self.client
            .post(self.url("/v1/videos"))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// Uploads a video and returns its id, asserting success.
    pub async fn upload_test_video(&self) -> i64 {
        let response = self
            .upload_video(TEST_VIDEO_NAME, super::fixtures::mp4_bytes())
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let body: Value = response.json().await.expect("Invalid upload response");
        body["video"]["id"].as_i64().expect("Upload response has no id")
    }

    pub async fn list_videos(&self) -> Response {
        self.get("/v1/videos").await
    }

    pub async fn get_video(&self, video_id: i64) -> Response {
        self.get(&format!("/v1/videos/{}", video_id)).await
    }

    pub async fn rename_video(&self, video_id: i64, name: &str) -> Response {
        self.client
            .put(self.url(&format!("/v1/videos/{}/name", video_id)))
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("PUT request failed")
    }

    pub async fn delete_video(&self, video_id: i64) -> Response {
        self.client
            .delete(self.url(&format!("/v1/videos/{}", video_id)))
            .send()
            .await
            .expect("DELETE request failed")
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    pub async fn get_analysis(&self, video_id: i64) -> Response {
        self.get(&format!("/v1/videos/{}/analysis", video_id)).await
    }

    pub async fn start_analysis(&self, video_id: i64, force: bool) -> Response {
        self.client
            .post(self.url(&format!(
                "/v1/videos/{}/analysis?force={}",
                video_id, force
            )))
            .send()
            .await
            .expect("POST request failed")
    }

    /// Polls the analysis status until it leaves `pending`/`analyzing`.
    pub async fn wait_for_analysis(&self, video_id: i64) -> Value {
        let start = std::time::Instant::now();
        loop {
            let status: Value = self
                .get_analysis(video_id)
                .await
                .json()
                .await
                .expect("Invalid analysis status");
            if status["status"] != "pending" && status["status"] != "analyzing" {
                return status;
            }
            if start.elapsed() > Duration::from_millis(ANALYSIS_TIMEOUT_MS) {
                panic!("Analysis of video {} did not finish: {}", video_id, status);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Uploads the test video and waits until it is analyzed.
    pub async fn analyzed_test_video(&self) -> i64 {
        let video_id = self.upload_test_video().await;
        let status = self.wait_for_analysis(video_id).await;
        assert_eq!(status["status"], "completed", "analysis failed: {}", status);
        video_id
    }

    // ========================================================================
    // Results
    // ========================================================================

    pub async fn get_frames(&self, video_id: i64, limit: usize, offset: usize) -> Response {
        self.get(&format!(
            "/v1/videos/{}/frames?limit={}&offset={}",
            video_id, limit, offset
        ))
        .await
    }

    pub async fn get_frame_image(&self, video_id: i64, image_id: i64) -> Response {
        self.get(&format!("/v1/videos/{}/frames/{}/image", video_id, image_id))
            .await
    }

    pub async fn get_scenes(&self, video_id: i64) -> Response {
        self.get(&format!("/v1/videos/{}/scenes", video_id)).await
    }

    pub async fn get_summary(&self, video_id: i64) -> Response {
        self.get(&format!("/v1/videos/{}/summary", video_id)).await
    }

    pub async fn post_summary(&self, video_id: i64, summary_type: &str) -> Response {
        self.post_json(
            &format!("/v1/videos/{}/summary", video_id),
            json!({ "summary_type": summary_type }),
        )
        .await
    }

    pub async fn post_highlights(&self, video_id: i64, criteria: Value) -> Response {
        self.post_json(&format!("/v1/videos/{}/highlights", video_id), criteria)
            .await
    }

    // ========================================================================
    // Chat
    // ========================================================================

    pub async fn chat(
        &self,
        message: &str,
        video_id: Option<i64>,
        session_id: Option<&str>,
    ) -> Response {
        self.post_json(
            "/v1/chat",
            json!({
                "message": message,
                "video_id": video_id,
                "session_id": session_id,
            }),
        )
        .await
    }

    pub async fn get_chat_session(&self, session_id: &str) -> Response {
        self.get(&format!("/v1/chat/{}", session_id)).await
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub async fn search_frames(&self, video_id: i64, query: &str, color: Option<&str>) -> Response {
        self.post_json(
            "/v1/search/frames",
            json!({ "video_id": video_id, "query": query, "color": color }),
        )
        .await
    }

    pub async fn search_intra(&self, video_id: i64, query: &str) -> Response {
        self.post_json(
            "/v1/search/intra",
            json!({ "video_id": video_id, "query": query }),
        )
        .await
    }

    pub async fn search_inter(&self, query: &str) -> Response {
        self.post_json("/v1/search/inter", json!({ "query": query }))
            .await
    }

    pub async fn search_temporal(
        &self,
        video_id: i64,
        start: f64,
        end: f64,
        analysis_type: &str,
    ) -> Response {
        self.post_json(
            "/v1/search/temporal",
            json!({
                "video_id": video_id,
                "time_range": { "start": start, "end": end },
                "analysis_type": analysis_type,
            }),
        )
        .await
    }
}
