//! End-to-end tests for the search endpoints
//!
//! Every test video shows a man in a red top and blue trousers next to a
//! parked car, in every sampled frame.

mod common;

use common::{TestClient, TestServer};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_frame_search_by_color() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let response = client.search_frames(video_id, "someone in red", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["search_type"], "color");
    assert!(body["total_results"].as_u64().unwrap() > 0);

    // An explicit color overrides the query text
    let body: Value = client
        .search_frames(video_id, "someone in red", Some("purple"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_results"], 0);
}

#[tokio::test]
async fn test_frame_search_without_terms() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let response = client.search_frames(video_id, "   ", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_intra_video_person_search() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let response = client.search_intra(video_id, "red man").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["criteria"]["gender"], "male");
    assert_eq!(body["criteria"]["colors"][0], "red");
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["upper_color"], "red");
    assert_eq!(results[0]["gender"], "male");

    // Criteria of different kinds must all hold
    let body: Value = client
        .search_intra(video_id, "red woman")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_results"], 0);

    // Lower clothing counts too
    let body: Value = client
        .search_intra(video_id, "파란 옷 남자")
        .await
        .json()
        .await
        .unwrap();
    assert!(body["total_results"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_intra_video_search_errors() {
    let server = TestServer::spawn_without_auto_analysis().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.upload_test_video().await;

    let response = client.search_intra(video_id, "something vague").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client.search_intra(video_id, "red man").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client.search_intra(404_404, "red man").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inter_video_search_ranks_matching_videos() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    // Nothing analyzed yet
    let body: Value = client.search_inter("red car").await.json().await.unwrap();
    assert_eq!(body["total_results"], 0);
    assert!(body["message"].is_string());

    let video_id = client.analyzed_test_video().await;

    let response = client.search_inter("red car").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["video_id"], video_id);
    assert!(results[0]["relevance_score"].as_f64().unwrap() > 0.1);
    assert!(!results[0]["matched_scenes"].as_array().unwrap().is_empty());

    // Nothing in the video is yellow
    let body: Value = client.search_inter("yellow").await.json().await.unwrap();
    assert_eq!(body["total_results"], 0);

    let response = client.search_inter(" ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_temporal_gender_distribution() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let response = client
        .search_temporal(video_id, 0.0, 20.0, "gender_distribution")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["analysis_type"], "gender_distribution");
    let result = &body["result"];
    let total = result["total_persons"].as_u64().unwrap();
    assert!(total > 0);
    assert_eq!(result["gender_count"]["male"].as_u64().unwrap(), total);
    assert_eq!(result["gender_count"]["female"], 0);
    assert_eq!(result["gender_ratio"]["male"].as_f64().unwrap(), 100.0);
}

#[tokio::test]
async fn test_temporal_age_and_activity() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let body: Value = client
        .search_temporal(video_id, 0.0, 20.0, "age_distribution")
        .await
        .json()
        .await
        .unwrap();
    let result = &body["result"];
    assert_eq!(
        result["age_count"]["adult"].as_u64().unwrap(),
        result["total_persons"].as_u64().unwrap()
    );

    let body: Value = client
        .search_temporal(video_id, 0.0, 20.0, "activity_pattern")
        .await
        .json()
        .await
        .unwrap();
    assert!(body["result"]["frames_analyzed"].as_u64().unwrap() > 0);

    // A window past the end of the video holds no frames
    let body: Value = client
        .search_temporal(video_id, 100.0, 200.0, "activity_pattern")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"]["frames_analyzed"], 0);
}

#[tokio::test]
async fn test_temporal_rejects_invalid_range() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let video_id = client.analyzed_test_video().await;

    let response = client
        .search_temporal(video_id, 10.0, 5.0, "gender_distribution")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .search_temporal(video_id, -1.0, 5.0, "gender_distribution")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
