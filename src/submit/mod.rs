//! Report submission
//!
//! Builds the outbound POST and hands it to a transport. Two transports
//! exist: the real HTTPS one, and an inspect transport for debug mode that
//! performs no network I/O and only surfaces what would have been sent.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::config::ReportConfig;
use crate::error::ReportError;

/// Everything needed to issue (or inspect) one HTTPS POST.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundRequest {
    pub hostname: String,
    pub port: u16,
    pub path: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    pub body: String,
}

/// What a transport did with the request.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    Sent { status: u16, body: String },
    /// Debug mode: nothing left the machine.
    Suppressed,
}

/// Build the POST for a serialized report: computed `Content-Type` and
/// `Content-Length` defaults, with configured headers merged over them
/// (same name wins).
pub fn build_request(config: &ReportConfig, body: String) -> OutboundRequest {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Content-Length".to_string(), body.len().to_string());
    for (name, value) in &config.headers {
        headers.insert(name.clone(), value.clone());
    }

    OutboundRequest {
        hostname: config.hostname.clone(),
        port: config.port,
        path: config.path.clone(),
        method: "POST".to_string(),
        headers,
        body,
    }
}

/// Delivery strategy for one outbound request.
pub trait Transport {
    fn deliver(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<DeliveryOutcome, ReportError>>;
}

/// Real transport: one HTTPS POST, response status and body logged, no
/// retry, no body parsing. The client lives for a single request cycle.
pub struct HttpsTransport {
    client: reqwest::Client,
}

impl HttpsTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, ReportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpsTransport {
    async fn deliver(&self, request: &OutboundRequest) -> Result<DeliveryOutcome, ReportError> {
        let url = format!(
            "https://{}:{}{}",
            request.hostname, request.port, request.path
        );

        let mut post = self.client.post(&url);
        for (name, value) in &request.headers {
            post = post.header(name, value);
        }

        let response = post.body(request.body.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        info!("Delivery status: {status}");
        if !body.is_empty() {
            info!("Delivery response: {body}");
        }

        Ok(DeliveryOutcome::Sent { status, body })
    }
}

/// Debug transport: logs the request head and payload, records the request
/// for inspection, sends nothing.
#[derive(Default)]
pub struct InspectTransport {
    seen: Mutex<Vec<OutboundRequest>>,
}

impl InspectTransport {
    /// Requests that would have been sent, in submission order.
    pub fn recorded(&self) -> Vec<OutboundRequest> {
        self.seen.lock().clone()
    }
}

impl Transport for InspectTransport {
    async fn deliver(&self, request: &OutboundRequest) -> Result<DeliveryOutcome, ReportError> {
        let head = serde_json::to_string_pretty(request).unwrap_or_default();
        let payload = serde_json::from_str::<serde_json::Value>(&request.body)
            .and_then(|v| serde_json::to_string_pretty(&v))
            .unwrap_or_else(|_| request.body.clone());

        info!("post-to {head}");
        info!("post-data {payload}");

        self.seen.lock().push(request.clone());
        Ok(DeliveryOutcome::Suppressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_headers(headers: &[(&str, &str)]) -> ReportConfig {
        let mut config = ReportConfig::default();
        for (name, value) in headers {
            config
                .headers
                .insert(name.to_string(), value.to_string());
        }
        config
    }

    #[test]
    fn test_computed_default_headers() {
        let request = build_request(&ReportConfig::default(), "{\"a\":1}".to_string());
        assert_eq!(request.method, "POST");
        assert_eq!(
            request.headers.get("Content-Type").unwrap(),
            "application/json"
        );
        assert_eq!(request.headers.get("Content-Length").unwrap(), "7");
    }

    #[test]
    fn test_configured_header_overrides_default() {
        let config =
            config_with_headers(&[("Content-Type", "application/json; charset=utf-8")]);
        let request = build_request(&config, "{}".to_string());
        assert_eq!(
            request.headers.get("Content-Type").unwrap(),
            "application/json; charset=utf-8"
        );
        // Content-Length stays computed.
        assert_eq!(request.headers.get("Content-Length").unwrap(), "2");
    }

    #[test]
    fn test_extra_headers_pass_through() {
        let config = config_with_headers(&[("X-Api-Key", "secret")]);
        let request = build_request(&config, "{}".to_string());
        assert_eq!(request.headers.get("X-Api-Key").unwrap(), "secret");
        assert_eq!(request.headers.len(), 3);
    }

    #[tokio::test]
    async fn test_inspect_transport_records_without_sending() {
        let transport = InspectTransport::default();
        let request = build_request(&ReportConfig::default(), "{\"x\":true}".to_string());

        let outcome = transport.deliver(&request).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Suppressed));

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].body, "{\"x\":true}");
    }

    #[test]
    fn test_request_head_serialization_skips_body() {
        let request = build_request(&ReportConfig::default(), "{}".to_string());
        let head = serde_json::to_value(&request).unwrap();
        assert!(head.get("hostname").is_some());
        assert!(head.get("body").is_none());
    }
}
