//! API Gateway control-plane client.
//!
//! Wire types for the REST control plane plus the `Gateway` trait the sweep
//! runs against. The real implementation is a blocking ureq client that signs
//! every request with SigV4; tests substitute an in-memory gateway.
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use ureq::Agent;

use crate::config::Credentials;
use crate::sigv4;

/// Method-settings key covering all resources and HTTP methods.
pub const WILDCARD_PATTERN: &str = "*/*";

/// Execution logging levels the sweep cares about.
pub const LEVEL_INFO: &str = "INFO";
pub const LEVEL_OFF: &str = "OFF";

const SERVICE: &str = "apigateway";
const PAGE_LIMIT: &str = "500";

/// One REST API visible to the account/region.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestApi {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Per-method-pattern stage settings; only the logging level is consulted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodSetting {
    pub logging_level: Option<String>,
    pub metrics_enabled: Option<bool>,
    pub data_trace_enabled: Option<bool>,
}

/// One deployment stage of a REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub stage_name: String,
    #[serde(default)]
    pub method_settings: BTreeMap<String, MethodSetting>,
}

impl Stage {
    /// Logging level of the `*/*` entry, if that entry exists and has one.
    pub fn wildcard_logging_level(&self) -> Option<&str> {
        self.method_settings
            .get(WILDCARD_PATTERN)
            .and_then(|setting| setting.logging_level.as_deref())
    }
}

/// Snapshot created by `CreateDeployment`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestApiPage {
    #[serde(rename = "item", default)]
    items: Vec<RestApi>,
    #[serde(default)]
    position: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StagePage {
    #[serde(rename = "item", default)]
    items: Vec<Stage>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: Option<String>,
}

/// The four control-plane operations the sweep needs.
pub trait Gateway {
    /// All REST APIs in the account/region, in provider order.
    fn rest_apis(&self) -> Result<Vec<RestApi>>;
    /// All stages of one REST API.
    fn stages(&self, rest_api_id: &str) -> Result<Vec<Stage>>;
    /// Patch the stage's wildcard logging level to INFO.
    fn enable_info_logging(&self, rest_api_id: &str, stage_name: &str) -> Result<Stage>;
    /// Deploy the API to the stage so the settings change takes effect.
    fn create_deployment(&self, rest_api_id: &str, stage_name: &str) -> Result<Deployment>;
}

/// Signed blocking client against `apigateway.{region}.amazonaws.com`.
pub struct RestClient {
    agent: Agent,
    host: String,
    signer: sigv4::Signer,
}

impl RestClient {
    pub fn new(region: &str, credentials: Credentials) -> Self {
        // Non-2xx responses carry a JSON error body worth surfacing, so status
        // errors are handled here rather than by the agent.
        let config = Agent::config_builder().http_status_as_error(false).build();
        let host = format!("apigateway.{region}.amazonaws.com");
        Self {
            agent: config.new_agent(),
            signer: sigv4::Signer::new(credentials, region, SERVICE, &host),
            host,
        }
    }

    fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let payload = match body {
            Some(value) => serde_json::to_vec(value).context("encode request body")?,
            None => Vec::new(),
        };
        let signed = self.signer.sign(method, path, query, &payload, Utc::now())?;

        let mut url = format!("https://{}{path}", self.host);
        let query_string = sigv4::canonical_query(query);
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }

        let mut response = match method {
            "GET" => {
                let mut request = self
                    .agent
                    .get(&url)
                    .header("x-amz-date", signed.amz_date.as_str())
                    .header("authorization", signed.authorization.as_str());
                if let Some(token) = &signed.security_token {
                    request = request.header("x-amz-security-token", token.as_str());
                }
                request
                    .call()
                    .with_context(|| format!("{method} {path}"))?
            }
            "PATCH" | "POST" => {
                let builder = if method == "PATCH" {
                    self.agent.patch(&url)
                } else {
                    self.agent.post(&url)
                };
                let mut request = builder
                    .header("content-type", "application/json")
                    .header("x-amz-date", signed.amz_date.as_str())
                    .header("authorization", signed.authorization.as_str());
                if let Some(token) = &signed.security_token {
                    request = request.header("x-amz-security-token", token.as_str());
                }
                request
                    .send(&payload[..])
                    .with_context(|| format!("{method} {path}"))?
            }
            other => bail!("unsupported method {other}"),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            bail!("{method} {path} returned {status}: {}", provider_message(&body));
        }
        response
            .body_mut()
            .read_json::<T>()
            .with_context(|| format!("decode {method} {path} response"))
    }
}

/// Pull the human-readable message out of a provider error body.
fn provider_message(body: &str) -> String {
    match serde_json::from_str::<ProviderError>(body) {
        Ok(ProviderError { message: Some(message) }) => message,
        _ if body.trim().is_empty() => "no error body".to_string(),
        _ => body.trim().to_string(),
    }
}

impl Gateway for RestClient {
    fn rest_apis(&self) -> Result<Vec<RestApi>> {
        // The provider pages this listing with an opaque cursor; exhaust it so
        // large accounts are fully swept.
        let mut apis = Vec::new();
        let mut position: Option<String> = None;
        loop {
            let mut query = vec![("limit".to_string(), PAGE_LIMIT.to_string())];
            if let Some(cursor) = &position {
                query.push(("position".to_string(), cursor.clone()));
            }
            let page: RestApiPage = self.request("GET", "/restapis", &query, None)?;
            tracing::debug!(page_items = page.items.len(), "fetched REST API page");
            apis.extend(page.items);
            match page.position {
                Some(cursor) => position = Some(cursor),
                None => return Ok(apis),
            }
        }
    }

    fn stages(&self, rest_api_id: &str) -> Result<Vec<Stage>> {
        let path = format!("/restapis/{}/stages", sigv4::uri_encode(rest_api_id));
        let page: StagePage = self.request("GET", &path, &[], None)?;
        Ok(page.items)
    }

    fn enable_info_logging(&self, rest_api_id: &str, stage_name: &str) -> Result<Stage> {
        let path = format!(
            "/restapis/{}/stages/{}",
            sigv4::uri_encode(rest_api_id),
            sigv4::uri_encode(stage_name),
        );
        let body = serde_json::json!({
            "patchOperations": [{
                "op": "replace",
                "path": "/*/*/logging/loglevel",
                "value": LEVEL_INFO,
            }],
        });
        self.request("PATCH", &path, &[], Some(&body))
    }

    fn create_deployment(&self, rest_api_id: &str, stage_name: &str) -> Result<Deployment> {
        let path = format!("/restapis/{}/deployments", sigv4::uri_encode(rest_api_id));
        let body = serde_json::json!({ "stageName": stage_name });
        self.request("POST", &path, &[], Some(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_api_page_uses_item_key() {
        let json = r#"{
            "item": [
                {"id": "abc123", "name": "orders", "createdDate": 1700000000},
                {"id": "def456"}
            ],
            "position": "bmV4dA=="
        }"#;
        let page: RestApiPage = serde_json::from_str(json).expect("parse page");
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "abc123");
        assert_eq!(page.items[0].name.as_deref(), Some("orders"));
        assert_eq!(page.position.as_deref(), Some("bmV4dA=="));
    }

    #[test]
    fn stage_page_parses_method_settings() {
        let json = r#"{
            "item": [{
                "stageName": "prod",
                "deploymentId": "dep1",
                "methodSettings": {
                    "*/*": {
                        "loggingLevel": "ERROR",
                        "metricsEnabled": true,
                        "throttlingRateLimit": 1000.0
                    }
                }
            }]
        }"#;
        let page: StagePage = serde_json::from_str(json).expect("parse page");
        assert_eq!(page.items[0].stage_name, "prod");
        assert_eq!(page.items[0].wildcard_logging_level(), Some("ERROR"));
    }

    #[test]
    fn stage_without_settings_parses_empty() {
        let json = r#"{"item": [{"stageName": "dev"}]}"#;
        let page: StagePage = serde_json::from_str(json).expect("parse page");
        assert!(page.items[0].method_settings.is_empty());
        assert_eq!(page.items[0].wildcard_logging_level(), None);
    }

    #[test]
    fn empty_listing_parses() {
        let page: RestApiPage = serde_json::from_str("{}").expect("parse empty page");
        assert!(page.items.is_empty());
        assert!(page.position.is_none());
    }

    #[test]
    fn provider_message_prefers_json_message() {
        assert_eq!(
            provider_message(r#"{"message": "Too Many Requests"}"#),
            "Too Many Requests"
        );
        assert_eq!(provider_message(""), "no error body");
        assert_eq!(provider_message("gateway timeout"), "gateway timeout");
    }
}
