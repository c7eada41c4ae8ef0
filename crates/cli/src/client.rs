//! API client for the dashboard backend

use anyhow::{Context, Result};
use dashboard_lib::{ClusterAssignment, ResourceRecord, ScoredResource};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Non-success response from the backend
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
    },
}

impl ClientError {
    pub fn is_model_unavailable(&self) -> bool {
        match self {
            ClientError::Api { code, .. } => code.as_deref() == Some("model_unavailable"),
        }
    }
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body).into());
        }

        response.json().await.context("Failed to parse response")
    }
}

fn api_error(status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => ClientError::Api {
            status,
            message: err.error,
            code: err.code,
        },
        Err(_) => ClientError::Api {
            status,
            message: body.to_string(),
            code: None,
        },
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleResources {
    pub idle_resources: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveIdleReport {
    pub idle_resources: Vec<ScoredResource>,
    pub total_analyzed: usize,
    pub potential_savings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub recommendations: Vec<ClusterAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_json_body() {
        let err = api_error(
            500,
            r#"{"error":"model unavailable: no current generation","code":"model_unavailable"}"#,
        );
        assert!(err.is_model_unavailable());
        assert_eq!(
            err.to_string(),
            "API error (500): model unavailable: no current generation"
        );
    }

    #[test]
    fn test_api_error_from_plain_body() {
        let err = api_error(404, "not found");
        assert!(!err.is_model_unavailable());
        assert_eq!(err.to_string(), "API error (404): not found");
    }

    #[test]
    fn test_live_report_deserializes_flattened_records() {
        let body = r#"{
            "idle_resources": [
                {"id": "i-1234", "resource_type": "VM", "status": "Idle",
                 "cpu_usage": 3.5, "memory_usage": 2.0,
                 "is_idle": true, "anomaly_score": 0.71, "confidence": 0.82}
            ],
            "total_analyzed": 10,
            "potential_savings": 100.0
        }"#;
        let report: LiveIdleReport = serde_json::from_str(body).unwrap();

        assert_eq!(report.total_analyzed, 10);
        let first = &report.idle_resources[0];
        assert!(first.is_idle);
        assert_eq!(first.record.id, "i-1234");
        assert_eq!(first.record.metric("cpu_usage"), Some(3.5));
    }

    #[test]
    fn test_client_rejects_bad_url() {
        assert!(ApiClient::new("not a url").is_err());
        let client = ApiClient::new("http://localhost:8000").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/");
    }
}
