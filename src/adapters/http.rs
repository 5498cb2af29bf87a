use crate::domain::model::{Extraction, FileHandle, MetadataRecord, SignatureRefs};
use crate::domain::ports::{ConfigProvider, ExtractionClient};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_EXTRACT_PATH: &str = "/api/ocr";

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    #[serde(default)]
    patient_signature: Option<String>,
    #[serde(default)]
    physician_signature: Option<String>,
}

/// Uploads documents as multipart forms to the OCR service.
pub struct HttpExtractionClient {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
    timeout: Duration,
}

impl HttpExtractionClient {
    pub fn new(endpoint: &str, extract_path: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: format!("{}{}", endpoint.trim_end_matches('/'), extract_path),
            headers: HashMap::new(),
            timeout,
        }
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        let mut client = Self::new(
            config.service_endpoint(),
            config.extract_path(),
            config.submit_timeout(),
        );
        if let Some(headers) = config.request_headers() {
            client.headers = headers.clone();
        }
        client
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn parse_response(json_data: serde_json::Value) -> Result<Extraction> {
        if !json_data.is_object() {
            return Err(EtlError::MalformedPayload {
                message: format!("expected a JSON object, got {}", json_type(&json_data)),
            });
        }
        let response: OcrResponse =
            serde_json::from_value(json_data).map_err(|e| EtlError::MalformedPayload {
                message: e.to_string(),
            })?;

        let metadata = match response.metadata {
            None | Some(serde_json::Value::Null) => MetadataRecord::new(),
            Some(serde_json::Value::Object(map)) => MetadataRecord::from(map),
            Some(other) => {
                return Err(EtlError::MalformedPayload {
                    message: format!("'metadata' must be an object, got {}", json_type(&other)),
                })
            }
        };

        Ok(Extraction {
            metadata,
            signatures: SignatureRefs {
                subject: response.patient_signature,
                counterpart: response.physician_signature,
            },
        })
    }
}

#[async_trait]
impl ExtractionClient for HttpExtractionClient {
    async fn submit(&self, file: &FileHandle) -> Result<Extraction> {
        let bytes = tokio::fs::read(&file.path).await?;
        tracing::debug!(
            "Uploading {} ({} bytes) to {}",
            file.name,
            bytes.len(),
            self.url
        );

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let mut request = self.client.post(&self.url).multipart(form).timeout(self.timeout);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        tracing::debug!("Extraction response status: {}", response.status());

        if !response.status().is_success() {
            return Err(EtlError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: self.url.clone(),
            });
        }

        let json_data: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| EtlError::MalformedPayload {
                    message: e.to_string(),
                })?;
        Self::parse_response(json_data)
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MetadataValue;
    use httpmock::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pdf_file(name: &str) -> (NamedTempFile, FileHandle) {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"%PDF-1.4 test document").unwrap();
        let handle = FileHandle::new(name, temp.path());
        (temp, handle)
    }

    #[tokio::test]
    async fn test_submit_uploads_multipart_and_parses_response() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/ocr")
                .header("x-api-key", "secret")
                .body_contains("name=\"file\"")
                .body_contains("filename=\"intake.pdf\"");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "metadata": {"Patient Name": "Jane Roe", "Procedure": {"Code": "A12"}},
                    "patient_signature": "/signatures/intake_patient.png",
                    "physician_signature": null
                }));
        });

        let (_temp, file) = pdf_file("intake.pdf");
        let client = HttpExtractionClient::new(&server.base_url(), DEFAULT_EXTRACT_PATH, Duration::from_secs(5))
            .with_header("x-api-key", "secret");

        let extraction = client.submit(&file).await.unwrap();

        api_mock.assert();
        assert_eq!(
            extraction.metadata.get("Patient Name"),
            Some(&MetadataValue::Text("Jane Roe".to_string()))
        );
        assert_eq!(
            extraction.signatures.subject.as_deref(),
            Some("/signatures/intake_patient.png")
        );
        assert_eq!(extraction.signatures.counterpart, None);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/api/ocr");
            then.status(502);
        });

        let (_temp, file) = pdf_file("a.pdf");
        let client = HttpExtractionClient::new(&server.base_url(), DEFAULT_EXTRACT_PATH, Duration::from_secs(5));

        let err = client.submit(&file).await.unwrap_err();

        api_mock.assert();
        assert!(matches!(err, EtlError::UnexpectedStatus { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_request() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/api/ocr");
            then.status(200).json_body(serde_json::json!({}));
        });

        let client = HttpExtractionClient::new(&server.base_url(), DEFAULT_EXTRACT_PATH, Duration::from_secs(5));
        let file = FileHandle::new("gone.pdf", "/definitely/not/here/gone.pdf");

        let err = client.submit(&file).await.unwrap_err();

        assert!(matches!(err, EtlError::IoError(_)));
        api_mock.assert_hits(0);
    }

    #[test]
    fn test_missing_metadata_becomes_empty_record() {
        let extraction = HttpExtractionClient::parse_response(serde_json::json!({
            "patient_signature": "/signatures/p.png"
        }))
        .unwrap();
        assert!(extraction.metadata.is_empty());
        assert_eq!(extraction.signatures.subject.as_deref(), Some("/signatures/p.png"));

        let extraction =
            HttpExtractionClient::parse_response(serde_json::json!({"metadata": null})).unwrap();
        assert!(extraction.metadata.is_empty());
    }

    #[test]
    fn test_malformed_payloads() {
        for payload in [
            serde_json::json!([1, 2, 3]),
            serde_json::json!({"metadata": "text"}),
            serde_json::json!({"metadata": {}, "patient_signature": 42}),
        ] {
            let err = HttpExtractionClient::parse_response(payload).unwrap_err();
            assert!(matches!(err, EtlError::MalformedPayload { .. }));
        }
    }

    #[test]
    fn test_url_joins_endpoint_and_path() {
        let client = HttpExtractionClient::new("http://ocr.local:5000/", "/api/ocr", Duration::from_secs(1));
        assert_eq!(client.url(), "http://ocr.local:5000/api/ocr");
    }
}
