// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Face detection service seam and its HTTP implementation.

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use scanwerk_core::config::FaceServiceConfig;
use scanwerk_core::error::{Result, ScanwerkError};

/// Face rectangle in pixels of the submitted image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRectangle {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// One face as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    #[serde(default)]
    pub face_id: Option<String>,
    pub face_rectangle: FaceRectangle,
    #[serde(default)]
    pub face_attributes: serde_json::Value,
}

/// Anything that can find faces on a JPEG image.
pub trait FaceDetectionService: Send + Sync {
    /// Detect faces. An empty list is a valid answer.
    fn detect(&self, jpeg: Vec<u8>) -> impl Future<Output = Result<Vec<DetectedFace>>> + Send;
}

/// Client for a Cognitive-Services-style `/detect` endpoint.
pub struct HttpFaceDetector {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl HttpFaceDetector {
    pub fn new(config: &FaceServiceConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanwerkError::FaceService(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build a client with the key from the environment variable named in
    /// the config. `Ok(None)` when the variable is unset or empty.
    pub fn from_env(config: &FaceServiceConfig) -> Result<Option<Self>> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Self::new(config, key.trim().to_string()).map(Some),
            _ => Ok(None),
        }
    }
}

impl FaceDetectionService for HttpFaceDetector {
    #[instrument(skip_all, fields(bytes = jpeg.len()))]
    async fn detect(&self, jpeg: Vec<u8>) -> Result<Vec<DetectedFace>> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("returnFaceId", "true"),
                ("returnFaceLandmarks", "false"),
                ("returnFaceAttributes", "age,gender"),
            ])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(jpeg)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ScanwerkError::FaceService(format!("cannot connect to {}", self.endpoint))
                } else if e.is_timeout() {
                    ScanwerkError::FaceService(format!(
                        "request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    ScanwerkError::FaceService(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanwerkError::FaceServiceStatus {
                status: status.as_u16(),
                body,
            });
        }

        let faces: Vec<DetectedFace> = response
            .json()
            .await
            .map_err(|e| ScanwerkError::FaceServiceResponse(e.to_string()))?;
        debug!(faces = faces.len(), "face service answered");
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one request with a canned response; yields the raw
    /// request head.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let head_end = loop {
                let n = socket.read(&mut chunk).await.expect("read");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                if n == 0 {
                    break buf.len();
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|l| {
                    let lower = l.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .and_then(|v| v.trim().parse::<usize>().ok())
                })
                .unwrap_or(0);
            while buf.len() < head_end + content_length {
                let n = socket.read(&mut chunk).await.expect("read body");
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.expect("write");
            head
        });
        (format!("http://{addr}/face/v1.0/detect"), handle)
    }

    fn config(endpoint: String) -> FaceServiceConfig {
        FaceServiceConfig {
            endpoint,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn parses_service_payload() {
        let json = r#"[{
            "faceId": "c5c24a82-6845-4031-9d5d-978df9175426",
            "faceRectangle": { "top": 54, "left": 394, "width": 78, "height": 78 },
            "faceAttributes": { "age": 31.0, "gender": "female" }
        }]"#;
        let faces: Vec<DetectedFace> = serde_json::from_str(json).expect("parse");
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].face_rectangle.left, 394.0);
        assert_eq!(faces[0].face_attributes["gender"], "female");
    }

    #[tokio::test]
    async fn posts_jpeg_with_key_and_parameters() {
        let (endpoint, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"[{"faceRectangle":{"top":1,"left":2,"width":3,"height":4}}]"#,
        )
        .await;
        let detector = HttpFaceDetector::new(&config(endpoint), "secret".into()).expect("client");

        let faces = detector.detect(vec![0xff, 0xd8, 0xff]).await.expect("detect");
        assert_eq!(faces.len(), 1);
        assert!(faces[0].face_id.is_none());

        let head = server.await.expect("server").to_ascii_lowercase();
        assert!(head.starts_with("post /face/v1.0/detect?"));
        assert!(head.contains("returnfaceid=true"));
        assert!(head.contains("returnfacelandmarks=false"));
        assert!(head.contains("ocp-apim-subscription-key: secret"));
        assert!(head.contains("content-type: application/octet-stream"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (endpoint, server) = serve_once(
            "HTTP/1.1 429 Too Many Requests",
            r#"{"error":{"code":"429"}}"#,
        )
        .await;
        let detector = HttpFaceDetector::new(&config(endpoint), "k".into()).expect("client");

        let err = detector.detect(vec![1, 2, 3]).await.expect_err("must fail");
        assert!(matches!(err, ScanwerkError::FaceServiceStatus { status: 429, .. }));
        server.await.expect("server");
    }

    #[tokio::test]
    async fn malformed_body_is_a_response_error() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", r#"{"not":"a list"}"#).await;
        let detector = HttpFaceDetector::new(&config(endpoint), "k".into()).expect("client");

        let err = detector.detect(vec![1]).await.expect_err("must fail");
        assert!(matches!(err, ScanwerkError::FaceServiceResponse(_)));
        server.await.expect("server");
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let detector =
            HttpFaceDetector::new(&config(format!("http://{addr}/detect")), "k".into()).expect("client");
        let err = detector.detect(vec![1]).await.expect_err("must fail");
        assert!(matches!(err, ScanwerkError::FaceService(_)));
    }

    #[test]
    fn missing_key_disables_detector() {
        let config = FaceServiceConfig {
            api_key_env: "SCANWERK_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        assert!(HttpFaceDetector::from_env(&config).expect("from_env").is_none());
    }
}
