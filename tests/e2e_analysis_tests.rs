//! End-to-end tests for video analysis and its results
//!
//! Tests starting analyses, status reporting, scenes, summaries, highlights
//! and the background jobs reported on the home endpoint.

mod common;

use common::{TestClient, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_upload_starts_analysis_automatically() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .upload_video(common::TEST_VIDEO_NAME, common::mp4_bytes())
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["analysis_started"], true);
    let video_id = body["video"]["id"].as_i64().unwrap();

    let status = client.wait_for_analysis(video_id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"], 100);
    assert_eq!(status["is_running"], false);
    assert!(status["analyzed_at"].is_string());

    let video: Value = client.get_video(video_id).await.json().await.unwrap();
    assert_eq!(video["analysis_status"], "completed");
    assert_eq!(video["frame_count"], common::TEST_VIDEO_FRAMES);
    assert_eq!(video["duration"].as_f64().unwrap(), 20.0);
}

#[tokio::test]
async fn test_manual_analysis_start() {
    let server = TestServer::spawn_without_auto_analysis().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.upload_test_video().await;

    let status: Value = client.get_analysis(video_id).await.json().await.unwrap();
    assert_eq!(status["status"], "pending");
    assert_eq!(status["progress"], 0);

    // Results are not available before the analysis ran
    let response = client.get_summary(video_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client.start_analysis(video_id, false).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let status = client.wait_for_analysis(video_id).await;
    assert_eq!(status["status"], "completed");
}

#[tokio::test]
async fn test_analysis_rerun_requires_force() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;
    let first_frames: Value = client.get_frames(video_id, 500, 0).await.json().await.unwrap();

    let response = client.start_analysis(video_id, false).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client.start_analysis(video_id, true).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let status = client.wait_for_analysis(video_id).await;
    assert_eq!(status["status"], "completed");

    // A rerun replaces the stored frames instead of appending to them
    let frames: Value = client.get_frames(video_id, 500, 0).await.json().await.unwrap();
    assert_eq!(frames["total"], first_frames["total"]);
}

#[tokio::test]
async fn test_analysis_of_unknown_video() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(
        client.start_analysis(777, false).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(client.get_analysis(777).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_frames_carry_detections() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let frames: Value = client.get_frames(video_id, 1, 0).await.json().await.unwrap();
    let frame = &frames["frames"][0];
    let person = &frame["persons"][0];
    assert_eq!(person["upper_color"], "red");
    assert_eq!(person["lower_color"], "blue");
    assert_eq!(person["gender"], "male");
    assert_eq!(person["age_group"], "young_adult");
    assert_eq!(frame["objects"][0]["class_name"], "car");
    assert!(frame["caption"].as_str().unwrap().contains("person"));
}

#[tokio::test]
async fn test_scenes_and_stored_summary() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let response = client.get_scenes(video_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let scenes: Value = response.json().await.unwrap();
    // Every frame looks the same, so the video is a single scene
    assert_eq!(scenes["scenes"].as_array().unwrap().len(), 1);

    let response = client.get_summary(video_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["video_name"], common::TEST_VIDEO_NAME);
    assert!(summary["summary"]["quality_assessment"].is_object());
}

#[tokio::test]
async fn test_text_summaries() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    for summary_type in ["brief", "detailed", "comprehensive"] {
        let response = client.post_summary(video_id, summary_type).await;
        assert_eq!(response.status(), StatusCode::OK);
        let report: Value = response.json().await.unwrap();
        assert_eq!(report["summary_type"], summary_type);
        assert!(!report["summary"].as_str().unwrap().is_empty());
        assert_eq!(report["statistics"]["peak_person_count"], 1);
    }

    let response = client.post_summary(video_id, "haiku").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_highlights() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let response = client
        .post_highlights(video_id, json!({ "min_score": 0.0, "max_highlights": 2 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let highlights = body["highlights"].as_array().unwrap();
    assert!(!highlights.is_empty());
    assert!(highlights.len() <= 2);
    assert_eq!(highlights[0]["rank"], 1);
    assert_eq!(body["total_highlights"].as_u64().unwrap() as usize, highlights.len());

    let response = client
        .post_highlights(video_id, json!({ "min_score": 1000.0 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_highlights"], 0);

    let response = client
        .post_highlights(video_id, json!({ "max_highlights": 0 }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_home_reports_videos_and_jobs() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    client.analyzed_test_video().await;

    let response = client.get_stats().await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["video_count"], 1);
    assert_eq!(stats["llm_enabled"], false);

    let job_ids: Vec<&str> = stats["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["id"].as_str().unwrap())
        .collect();
    assert!(job_ids.contains(&"analysis_status_sync"));
    assert!(job_ids.contains(&"orphan_frame_cleanup"));
}
