//! Recognition service HTTP client.

use std::time::Duration;

use image::{GrayImage, RgbImage};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use t7md_media::DetectionRequest;
use t7md_models::RawDetections;

use crate::error::{MlError, MlResult};
use crate::types::{encode_frame, DepthBody, DepthResponse, DetectBody, HealthResponse};

/// Default service address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";

/// Configuration for the ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of the service
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// First retry delay, doubled on each attempt
    pub retry_base_delay: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("T7MD_ML_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("T7MD_ML_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("T7MD_ML_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_base_delay: defaults.retry_base_delay,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Client for the recognition and depth service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url(), endpoint)
    }

    /// Check if the service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = self.url("/health");

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.is_healthy())
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Run the enabled detectors on one frame.
    pub async fn detect(&self, frame: &RgbImage, request: &DetectionRequest) -> MlResult<RawDetections> {
        let body = DetectBody::new(encode_frame(frame)?, request);
        let response = self.post("/detect", &body).await?;
        Ok(response.json().await?)
    }

    /// Dense depth map for one frame.
    pub async fn estimate_depth(&self, frame: &RgbImage) -> MlResult<GrayImage> {
        let body = DepthBody {
            image: encode_frame(frame)?,
        };
        let response = self.post("/depth", &body).await?;
        let depth: DepthResponse = response.json().await?;
        depth.decode()
    }

    async fn post<B: Serialize + Sync>(&self, endpoint: &str, body: &B) -> MlResult<Response> {
        let url = self.url(endpoint);
        debug!("Sending request to {}", url);

        self.with_retry(|| async {
            let response = self
                .http
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| self.classify(e))?;
            check_status(response).await
        })
        .await
    }

    fn classify(&self, error: reqwest::Error) -> MlError {
        if error.is_timeout() {
            MlError::Timeout(self.config.timeout.as_secs())
        } else {
            MlError::Network(error)
        }
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt);
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MlError::RequestFailed("Unknown error".to_string())))
    }
}

async fn check_status(response: Response) -> MlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("ML service returned {}: {}", status, body);
    match status {
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            Err(MlError::ServiceUnavailable(message))
        }
        _ => Err(MlError::RequestFailed(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use image::{ImageFormat, Luma, Rgb};
    use serde_json::json;
    use std::io::Cursor;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> MlClient {
        MlClient::new(MlClientConfig {
            retry_base_delay: Duration::from_millis(5),
            ..MlClientConfig::default().with_base_url(server.uri())
        })
        .unwrap()
    }

    fn frame() -> RgbImage {
        RgbImage::from_pixel(8, 8, Rgb([100, 100, 100]))
    }

    fn request() -> DetectionRequest {
        DetectionRequest {
            faces: true,
            persons: false,
            objects: true,
            custom_classes: vec!["laptop".to_string()],
            face_confidence: 0.4,
            person_confidence: 0.5,
            object_confidence: 0.3,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;

        assert!(client(&server).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check_unhealthy_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(!client(&server).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_detect_parses_categories() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .and(body_partial_json(json!({"faces": true, "persons": false, "custom_classes": ["laptop"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "faces": [{"bbox": [1.0, 2.0, 5.0, 6.0], "label": "face", "confidence": 0.9, "center": [3.0, 4.0]}],
                "objects": [{"bbox": [0.0, 0.0, 4.0, 4.0], "label": "laptop", "confidence": 0.6}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let raw = client(&server).detect(&frame(), &request()).await.unwrap();
        assert_eq!(raw.faces.len(), 1);
        assert!(raw.persons.is_empty());
        assert_eq!(raw.objects[0].label, "laptop");
        assert_eq!(raw.faces[0].center, Some([3.0, 4.0]));
    }

    #[tokio::test]
    async fn test_retries_unavailable_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let raw = client(&server).detect(&frame(), &request()).await.unwrap();
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad frame"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).detect(&frame(), &request()).await.unwrap_err();
        assert!(matches!(err, MlError::RequestFailed(ref m) if m.contains("bad frame")));
    }

    #[tokio::test]
    async fn test_estimate_depth() {
        let server = MockServer::start().await;
        let map = GrayImage::from_pixel(4, 4, Luma([128]));
        let mut png = Vec::new();
        map.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();

        Mock::given(method("POST"))
            .and(path("/depth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"depth": STANDARD.encode(png)})))
            .mount(&server)
            .await;

        let depth = client(&server).estimate_depth(&frame()).await.unwrap();
        assert_eq!(depth, map);
    }
}
