//! HTTP transport to ServiceNow.
//!
//! The processor talks to ServiceNow through the [`Transport`] trait so the
//! pipeline can run against an in-memory transport in tests.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::error::{Result, SnowgateError};

/// Path of the incident table API.
pub const INCIDENT_PATH: &str = "/api/now/table/incident";

/// Path of the event management JSON API.
pub const EVENT_PATH: &str = "/api/global/em/jsonv2";

/// HTTP methods used against ServiceNow and the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Request credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// No `Authorization` header.
    None,
    Bearer(String),
    Basic { user: String, password: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bearer(_) => write!(f, "Bearer(<redacted>)"),
            Self::Basic { user, .. } => write!(f, "Basic {{ user: {:?}, password: <redacted> }}", user),
        }
    }
}

impl Auth {
    /// Credentials from settings: the OAuth token wins over user/password.
    pub fn from_settings(settings: &Settings) -> Self {
        if let Some(token) = &settings.oauth_token {
            return Self::Bearer(token.clone());
        }
        match &settings.user {
            Some(user) => Self::Basic {
                user: user.clone(),
                password: settings.password.clone().unwrap_or_default(),
            },
            None => Self::None,
        }
    }
}

/// Status code and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// ServiceNow treats anything from 300 up as a failed write.
    pub fn is_success(&self) -> bool {
        self.status < 300
    }
}

/// Sends one JSON request and returns the response.
pub trait Transport {
    fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&serde_json::Value>,
        auth: &Auth,
    ) -> Result<HttpResponse>;
}

/// Prepend `https://` unless the instance already carries it.
pub fn instance_with_protocol(instance: &str) -> String {
    if instance.starts_with("https://") {
        instance.to_string()
    } else {
        format!("https://{}", instance)
    }
}

/// Full URL of an API path on an instance.
pub fn endpoint(instance: &str, path: &str) -> String {
    format!("{}{}", instance_with_protocol(instance).trim_end_matches('/'), path)
}

/// Blocking reqwest client for ServiceNow.
pub struct ServiceNowClient {
    client: reqwest::blocking::Client,
}

impl ServiceNowClient {
    pub fn new(timeout: Duration, skip_certificate_validation: bool) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_certificate_validation)
            .build()
            .map_err(|e| SnowgateError::transport(format!("cannot create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            Duration::from_secs(settings.http_timeout_secs),
            settings.skip_certificate_validation,
        )
    }
}

impl Transport for ServiceNowClient {
    fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&serde_json::Value>,
        auth: &Auth,
    ) -> Result<HttpResponse> {
        let mut request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        }
        .header("Content-Type", "application/json")
        .header("Accept", "application/json");

        request = match auth {
            Auth::None => request,
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, url, "sending request");
        let start = Instant::now();
        let response = request.send().map_err(|e| {
            SnowgateError::transport(format!(
                "{} {} failed after {}ms: {}",
                method,
                url,
                start.elapsed().as_millis(),
                e
            ))
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| SnowgateError::transport(format!("failed to read response from {}: {}", url, e)))?;
        tracing::debug!(status, elapsed_ms = start.elapsed().as_millis() as u64, "request completed");

        Ok(HttpResponse { status, body })
    }
}
