use crate::constants::{limits::ERROR_BODY_PREVIEW_BYTES, network, pagination, retry};
use crate::errors::CrmError;
use crate::services::custom_fields::{
    EntityKind, FieldDefinition, FieldUpdate, FieldValueSnapshot, PopulatedField,
};
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use crate::services::transport::CrmTransport;
use crate::utils::text::{looks_like_html, summarize_html, truncate_utf8_prefix};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

#[derive(Debug, Deserialize)]
struct EntityEnvelope {
    #[serde(default)]
    custom_fields_values: Option<Vec<PopulatedField>>,
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(rename = "_embedded", default)]
    embedded: Option<CatalogEmbedded>,
    #[serde(rename = "_links", default)]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct CatalogEmbedded {
    #[serde(default)]
    custom_fields: Vec<FieldDefinition>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<Value>,
}

impl CatalogPage {
    fn has_next(&self) -> bool {
        self.links
            .as_ref()
            .and_then(|links| links.next.as_ref())
            .and_then(|next| next.get("href"))
            .and_then(|href| href.as_str())
            .is_some_and(|href| !href.trim().is_empty())
    }
}

/// Kommo API v4 over HTTPS with a long-lived bearer token.
#[derive(Clone)]
pub struct KommoClient {
    logger: Logger,
    settings: Settings,
    client: Client,
}

impl KommoClient {
    pub fn new(logger: Logger, settings: Settings) -> Result<Self, CrmError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(network::USER_AGENT));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(settings.timeout_ms))
            .connect_timeout(Duration::from_millis(network::TIMEOUT_CONNECTION_MS))
            .build()
            .map_err(|err| {
                CrmError::NotConfigured(format!("failed to build HTTP client: {}", err))
            })?;
        Ok(Self {
            logger: logger.child("transport"),
            settings,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CrmError> {
        let base = self.settings.base_url.as_ref().ok_or_else(|| {
            CrmError::NotConfigured("KOMMO_BASE_URL or KOMMO_SUBDOMAIN is not set".to_string())
        })?;
        base.join(&format!("{}{}", network::API_PREFIX, path))
            .map_err(|err| CrmError::NotConfigured(format!("invalid API path {}: {}", path, err)))
    }

    fn token(&self) -> Result<&str, CrmError> {
        self.settings
            .access_token
            .as_deref()
            .ok_or_else(|| CrmError::NotConfigured("KOMMO_ACCESS_TOKEN is not set".to_string()))
    }

    /// One HTTP exchange. `Ok(None)` means 204 No Content.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, CrmError> {
        let url = self.endpoint(path)?;
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(self.token()?)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                CrmError::Timeout {
                    method: method.to_string(),
                    path: path.to_string(),
                }
            } else {
                CrmError::Network {
                    method: method.to_string(),
                    path: path.to_string(),
                    source: err,
                }
            }
        })?;
        let status = response.status();
        self.logger.debug(
            "Kommo response",
            Some(&serde_json::json!({
                "method": method.as_str(),
                "path": path,
                "status": status.as_u16(),
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response.text().await.map_err(|err| CrmError::Network {
            method: method.to_string(),
            path: path.to_string(),
            source: err,
        })?;

        if !status.is_success() {
            return Err(CrmError::Status {
                status: status.as_u16(),
                method: method.to_string(),
                path: path.to_string(),
                detail: describe_error_body(status, &content_type, &text),
            });
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| CrmError::Decode {
                path: path.to_string(),
                reason: if looks_like_html(&content_type, &text) {
                    format!("expected JSON, got HTML: {}", summarize_html(&text, ERROR_BODY_PREVIEW_BYTES))
                } else {
                    err.to_string()
                },
            })
    }

    /// GET with exponential backoff on transient failures.
    async fn get_with_retry(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Value>, CrmError> {
        let max_attempts = self.settings.read_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(Method::GET, path, query, None).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = compute_retry_delay(attempt);
                    self.logger.warn(
                        "Kommo read failed, retrying",
                        Some(&serde_json::json!({
                            "path": path,
                            "attempt": attempt,
                            "delay_ms": delay,
                            "error": err.to_string(),
                        })),
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl CrmTransport for KommoClient {
    async fn fetch_entity_fields(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<FieldValueSnapshot, CrmError> {
        let path = format!("/{}/{}", kind, entity_id);
        let body = self.get_with_retry(&path, &[]).await?.ok_or_else(|| {
            CrmError::Decode {
                path: path.clone(),
                reason: "empty response for entity".to_string(),
            }
        })?;
        let envelope: EntityEnvelope =
            serde_json::from_value(body).map_err(|err| CrmError::Decode {
                path: path.clone(),
                reason: err.to_string(),
            })?;
        Ok(FieldValueSnapshot::new(
            envelope.custom_fields_values.unwrap_or_default(),
        ))
    }

    async fn fetch_field_catalog(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<FieldDefinition>, CrmError> {
        let path = format!("/{}/custom_fields", kind);
        let mut definitions = Vec::new();
        for page in 1..=self.settings.catalog_max_pages {
            let query = [
                ("page", page.to_string()),
                ("limit", pagination::CATALOG_PAGE_SIZE.to_string()),
            ];
            let Some(body) = self.get_with_retry(&path, &query).await? else {
                break;
            };
            let parsed: CatalogPage =
                serde_json::from_value(body).map_err(|err| CrmError::Decode {
                    path: path.clone(),
                    reason: err.to_string(),
                })?;
            let has_next = parsed.has_next();
            if let Some(embedded) = parsed.embedded {
                definitions.extend(embedded.custom_fields);
            }
            if !has_next {
                break;
            }
            if page == self.settings.catalog_max_pages {
                self.logger.warn(
                    "Catalog pagination cap reached",
                    Some(&serde_json::json!({
                        "entity": kind,
                        "pages": page,
                        "definitions": definitions.len(),
                    })),
                );
            }
        }
        Ok(definitions)
    }

    async fn apply_field_update(
        &self,
        kind: EntityKind,
        entity_id: i64,
        payload: &[FieldUpdate],
    ) -> Result<(), CrmError> {
        let path = format!("/{}/{}", kind, entity_id);
        let body = serde_json::json!({ "custom_fields_values": payload });
        self.send(Method::PATCH, &path, &[], Some(&body)).await?;
        self.logger.info(
            "Kommo update applied",
            Some(&serde_json::json!({"path": path, "fields": payload.len()})),
        );
        Ok(())
    }
}

pub(crate) fn compute_retry_delay(attempt: usize) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16) as i32;
    let mut delay = (retry::BASE_DELAY_MS as f64) * 2f64.powi(exponent);
    if delay > retry::MAX_DELAY_MS as f64 {
        delay = retry::MAX_DELAY_MS as f64;
    }
    let delta = delay * retry::JITTER;
    delay = delay - delta + rand::random::<f64>() * delta * 2.0;
    delay.max(0.0) as u64
}

/// Human-readable reason from a failed response. Kommo returns problem+json
/// (`title`, `detail`, `validation-errors`); proxies in front of it may return
/// HTML.
pub(crate) fn describe_error_body(status: StatusCode, content_type: &str, body: &str) -> String {
    let fallback = status.canonical_reason().unwrap_or("error").to_string();
    if body.trim().is_empty() {
        return fallback;
    }
    if looks_like_html(content_type, body) {
        let summary = summarize_html(body, ERROR_BODY_PREVIEW_BYTES);
        return if summary.is_empty() { fallback } else { summary };
    }
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return truncate_utf8_prefix(body.trim(), ERROR_BODY_PREVIEW_BYTES);
    };

    let mut parts = Vec::new();
    for key in ["title", "detail"] {
        if let Some(text) = parsed.get(key).and_then(|v| v.as_str()) {
            if !text.trim().is_empty() && !parts.iter().any(|p: &String| p == text) {
                parts.push(text.trim().to_string());
            }
        }
    }
    if let Some(validation) = parsed.get("validation-errors") {
        parts.push(format!(
            "validation-errors: {}",
            truncate_utf8_prefix(&validation.to_string(), ERROR_BODY_PREVIEW_BYTES)
        ));
    }
    if parts.is_empty() {
        truncate_utf8_prefix(&parsed.to_string(), ERROR_BODY_PREVIEW_BYTES)
    } else {
        parts.join(": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(settings: Settings) -> KommoClient {
        KommoClient::new(Logger::new("test"), settings).expect("client")
    }

    #[test]
    fn endpoint_requires_base_url() {
        let err = client(Settings::default())
            .endpoint("/leads/1")
            .expect_err("no base url");
        assert!(matches!(err, CrmError::NotConfigured(_)));
    }

    #[test]
    fn endpoint_joins_api_prefix() {
        let settings = Settings {
            base_url: Some(Url::parse("https://acme.kommo.com").expect("url")),
            ..Settings::default()
        };
        let url = client(settings).endpoint("/leads/custom_fields").expect("url");
        assert_eq!(url.as_str(), "https://acme.kommo.com/api/v4/leads/custom_fields");
    }

    #[test]
    fn problem_json_detail_is_extracted() {
        let body = r#"{"title":"Bad Request","type":"https://httpstatus.es/400","status":400,"detail":"Request validation failed","validation-errors":[{"request_id":"0","errors":[{"code":"NotSupportedChoice","path":"custom_fields_values.0.values.0.enum_id"}]}]}"#;
        let described = describe_error_body(StatusCode::BAD_REQUEST, "application/problem+json", body);
        assert!(described.starts_with("Bad Request: Request validation failed"));
        assert!(described.contains("NotSupportedChoice"));
    }

    #[test]
    fn html_gateway_page_is_summarized() {
        let body = "<html><head><title>504 Gateway Time-out</title></head><body></body></html>";
        assert_eq!(
            describe_error_body(StatusCode::GATEWAY_TIMEOUT, "text/html", body),
            "504 Gateway Time-out"
        );
    }

    #[test]
    fn empty_error_body_falls_back_to_reason() {
        assert_eq!(
            describe_error_body(StatusCode::UNAUTHORIZED, "", ""),
            "Unauthorized"
        );
    }

    #[test]
    fn retry_delay_grows_and_caps() {
        let first = compute_retry_delay(1);
        assert!((200..=300).contains(&first));
        let capped = compute_retry_delay(30);
        assert!(capped <= (retry::MAX_DELAY_MS as f64 * (1.0 + retry::JITTER)) as u64);
    }

    #[test]
    fn catalog_page_reads_next_link() {
        let page: CatalogPage = serde_json::from_value(serde_json::json!({
            "_embedded": {"custom_fields": [{"id": 1, "name": "City", "type": "select", "enums": []}]},
            "_links": {"next": {"href": "https://acme.kommo.com/api/v4/leads/custom_fields?page=2"}}
        }))
        .expect("page");
        assert!(page.has_next());
        let last: CatalogPage = serde_json::from_value(serde_json::json!({
            "_embedded": {"custom_fields": []},
            "_links": {"self": {"href": "x"}}
        }))
        .expect("page");
        assert!(!last.has_next());
    }
}
