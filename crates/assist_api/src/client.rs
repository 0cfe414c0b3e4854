use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ApiConfig;
use crate::error::{parse_error_message, ApiError};
use crate::headers::build_headers;
use crate::payload::{ExecuteRequest, ExecuteResponse, ExplainRequest, ExplainResponse};
use crate::url::{endpoint_url, normalize_base_url, stream_url, EXECUTE_PATH, EXPLAIN_PATH};

#[derive(Debug, Clone)]
pub struct AssistApiClient {
    http: Client,
    config: ApiConfig,
}

impl AssistApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        validate_base_url(&config.base_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn execute_url(&self) -> String {
        endpoint_url(&self.config.base_url, EXECUTE_PATH)
    }

    pub fn explain_url(&self) -> String {
        endpoint_url(&self.config.base_url, EXPLAIN_PATH)
    }

    /// Streaming channel URL derived from the same base.
    pub fn stream_url(&self) -> String {
        stream_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config) {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| ApiError::InvalidHeader(format!("invalid value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_execute_request(
        &self,
        request: &ExecuteRequest,
    ) -> Result<RequestBuilder, ApiError> {
        self.build_post(self.execute_url(), request)
    }

    pub fn build_explain_request(
        &self,
        request: &ExplainRequest,
    ) -> Result<RequestBuilder, ApiError> {
        self.build_post(self.explain_url(), request)
    }

    pub async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, ApiError> {
        self.send_json(self.build_execute_request(request)?).await
    }

    pub async fn explain(&self, request: &ExplainRequest) -> Result<ExplainResponse, ApiError> {
        self.send_json(self.build_explain_request(request)?).await
    }

    fn build_post<T: Serialize>(&self, url: String, body: &T) -> Result<RequestBuilder, ApiError> {
        let headers = self.build_headers()?;
        Ok(self.http.post(url).headers(headers).json(body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status(status, parse_error_message(status, &body)));
        }

        serde_json::from_str::<T>(&body).map_err(|error| ApiError::Decode(error.to_string()))
    }
}

fn validate_base_url(base_url: &str) -> Result<(), ApiError> {
    let normalized = normalize_base_url(base_url);
    let parsed = Url::parse(&normalized)
        .map_err(|error| ApiError::InvalidBaseUrl(format!("{normalized}: {error}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ApiError::InvalidBaseUrl(format!(
            "{normalized}: unsupported scheme '{scheme}'"
        ))),
    }
}
