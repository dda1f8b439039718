//! Object detection and person attribute collaborators.
//!
//! Both are remote inference services reached over HTTP. The server only
//! depends on the traits, so deployments without a detector still produce
//! pixel statistics and rule-based captions.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Detections below this confidence are dropped.
pub const DETECTION_CONFIDENCE_THRESHOLD: f64 = 0.25;
/// Attribute estimates at or below this confidence fall back to defaults.
pub const ATTRIBUTE_CONFIDENCE_THRESHOLD: f64 = 0.7;

pub const ATTRIBUTE_SOURCE: &str = "attribute_model";
pub const FALLBACK_SOURCE: &str = "fallback";

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector request failed: {0}")]
    Request(String),

    #[error("Detector returned status {0}")]
    Status(u16),

    #[error("Invalid detector response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for DetectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DetectorError::InvalidResponse(e.to_string())
        } else {
            DetectorError::Request(e.to_string())
        }
    }
}

/// One detected object with a normalized `[x1, y1, x2, y2]` box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(alias = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

impl Detection {
    pub fn is_person(&self) -> bool {
        self.class_name == "person"
    }
}

#[async_trait]
pub trait ObjectDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Detect objects in a JPEG-encoded frame of `width` x `height` pixels.
    async fn detect(
        &self,
        jpeg: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, DetectorError>;
}

/// Detector used when no inference service is configured.
pub struct NoopDetector;

#[async_trait]
impl ObjectDetector for NoopDetector {
    fn name(&self) -> &str {
        "none"
    }

    async fn detect(&self, _: &[u8], _: u32, _: u32) -> Result<Vec<Detection>, DetectorError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Posts JPEG bytes to `{url}` and expects `{"detections": [{class_name, confidence, bbox}]}`.
/// Boxes may be normalized or in pixels.
pub struct HttpObjectDetector {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpObjectDetector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

/// Convert pixel boxes to normalized ones; already normalized boxes pass through.
fn normalize_bbox(bbox: [f64; 4], width: u32, height: u32) -> [f64; 4] {
    if bbox.iter().all(|v| *v <= 1.0) || width == 0 || height == 0 {
        return bbox.map(|v| v.clamp(0.0, 1.0));
    }
    let (w, h) = (width as f64, height as f64);
    [bbox[0] / w, bbox[1] / h, bbox[2] / w, bbox[3] / h].map(|v| v.clamp(0.0, 1.0))
}

#[async_trait]
impl ObjectDetector for HttpObjectDetector {
    fn name(&self) -> &str {
        "http"
    }

    async fn detect(
        &self,
        jpeg: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, DetectorError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("conf", DETECTION_CONFIDENCE_THRESHOLD)])
            .header("Content-Type", "image/jpeg")
            .body(jpeg.to_vec())
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DetectorError::Status(response.status().as_u16()));
        }

        let parsed: DetectResponse = response.json().await?;
        let detections: Vec<Detection> = parsed
            .detections
            .into_iter()
            .filter(|d| d.confidence >= DETECTION_CONFIDENCE_THRESHOLD)
            .map(|d| Detection {
                bbox: normalize_bbox(d.bbox, width, height),
                ..d
            })
            .collect();
        debug!("Detector returned {} detections", detections.len());
        Ok(detections)
    }
}

/// Raw estimate returned by an attribute service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeEstimate {
    pub gender: String,
    pub gender_confidence: f64,
    pub age: f64,
}

#[async_trait]
pub trait AttributeAnalyzer: Send + Sync {
    /// Estimate gender and age of the person inside `bbox` of a JPEG frame.
    async fn analyze(
        &self,
        jpeg: &[u8],
        bbox: [f64; 4],
    ) -> Result<AttributeEstimate, DetectorError>;
}

#[derive(Serialize)]
struct AttributeRequest<'a> {
    image: &'a str,
    bbox: [f64; 4],
}

pub struct HttpAttributeAnalyzer {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpAttributeAnalyzer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AttributeAnalyzer for HttpAttributeAnalyzer {
    async fn analyze(
        &self,
        jpeg: &[u8],
        bbox: [f64; 4],
    ) -> Result<AttributeEstimate, DetectorError> {
        let image = base64::engine::general_purpose::STANDARD.encode(jpeg);
        let response = self
            .client
            .post(&self.url)
            .json(&AttributeRequest {
                image: &image,
                bbox,
            })
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DetectorError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

pub fn age_to_group(age: f64) -> &'static str {
    match age {
        a if a < 13.0 => "child",
        a if a < 20.0 => "teenager",
        a if a < 35.0 => "young_adult",
        a if a < 60.0 => "middle_aged",
        _ => "elderly",
    }
}

pub fn normalize_gender(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "man" | "male" => "male".to_string(),
        "woman" | "female" => "female".to_string(),
        other => other.to_string(),
    }
}

/// Gender and age fields attached to a person detection.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonAttributes {
    pub gender: String,
    pub gender_confidence: f64,
    pub age_group: String,
    pub age_confidence: f64,
    pub estimated_age: Option<i64>,
    pub source: &'static str,
}

impl Default for PersonAttributes {
    fn default() -> Self {
        Self {
            gender: "person".to_string(),
            gender_confidence: 0.5,
            age_group: "adult".to_string(),
            age_confidence: 0.5,
            estimated_age: None,
            source: FALLBACK_SOURCE,
        }
    }
}

impl PersonAttributes {
    /// Keep a confident estimate, otherwise fall back to defaults.
    pub fn from_estimate(estimate: &AttributeEstimate) -> Self {
        if estimate.gender_confidence <= ATTRIBUTE_CONFIDENCE_THRESHOLD {
            return Self::default();
        }
        Self {
            gender: normalize_gender(&estimate.gender),
            gender_confidence: estimate.gender_confidence,
            age_group: age_to_group(estimate.age).to_string(),
            age_confidence: 0.8,
            estimated_age: Some(estimate.age.round() as i64),
            source: ATTRIBUTE_SOURCE,
        }
    }
}
