//! HTTP client for one ArcGIS REST map service.

use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::error::ConfigError;
use crate::options::{ExtractionOptions, normalize_base_url};

/// Client bound to the base address of one map service.
///
/// Service discovery and feature queries are implemented on top of it in
/// [`crate::discovery`] and [`crate::query`]. Requests are never retried.
#[derive(Debug, Clone)]
pub struct MapServiceClient {
    http: reqwest::Client,
    base_url: String,
    pub(crate) metadata_timeout: Duration,
    pub(crate) query_timeout: Duration,
}

impl MapServiceClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the address is invalid or the HTTP client
    /// cannot be built from the options.
    pub fn new(base_url: &str, options: &ExtractionOptions) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .user_agent(options.user_agent.as_str())
            .build()
            .map_err(|e| ConfigError::InvalidOption {
                option: "user-agent".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url,
            metadata_timeout: options.metadata_timeout,
            query_timeout: options.query_timeout,
        })
    }

    /// The service base address, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Address of a layer below the service.
    #[must_use]
    pub fn layer_url(&self, layer_id: i64) -> String {
        format!("{}/{layer_id}", self.base_url)
    }

    /// Issues a GET request and decodes the body as JSON.
    ///
    /// Non-2xx statuses are turned into errors before the body is read.
    pub(crate) async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> reqwest::Result<Value> {
        debug!("GET {url} {params:?}");
        let response = self
            .http
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        response.json::<Value>().await
    }
}

/// The `error` object ArcGIS services return with a 200 status.
///
/// Services disagree on its shape (`code` as number or string, `details` as
/// list, string or null), so only `message` is interpreted.
#[derive(Debug, Clone, Default)]
pub(crate) struct ServerErrorBody {
    pub code: Option<Value>,
    pub message: Option<String>,
    pub details: Option<Value>,
}

impl ServerErrorBody {
    /// Extracts the error object of a response body, if it carries one.
    pub fn from_body(body: &Value) -> Option<Self> {
        let error = body.as_object()?.get("error")?;
        Some(Self {
            code: error.get("code").filter(|v| !v.is_null()).cloned(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            details: error.get("details").filter(|v| !v.is_null()).cloned(),
        })
    }

    /// The message as sent by the server.
    pub fn message(&self) -> String {
        self.message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// Describes a transport failure for log and error messages.
pub(crate) fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if let Some(status) = error.status() {
        format!("HTTP status {status}")
    } else if error.is_decode() {
        format!("response is not valid JSON: {error}")
    } else {
        error.to_string()
    }
}
