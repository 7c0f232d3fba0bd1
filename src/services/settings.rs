use crate::constants::{network, pagination, protocols::ALLOWED_HTTP, retry};
use crate::errors::ToolError;
use url::Url;

/// Connection settings for the Kommo account, read from the environment.
///
/// A missing base URL or token is not an error here: `tools/list` must work on
/// an unconfigured server, so the transport reports it when a call is made.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: Option<Url>,
    pub access_token: Option<String>,
    pub timeout_ms: u64,
    pub read_attempts: usize,
    pub catalog_max_pages: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            timeout_ms: network::TIMEOUT_API_REQUEST_MS,
            read_attempts: retry::MAX_ATTEMPTS,
            catalog_max_pages: pagination::CATALOG_MAX_PAGES,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ToolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ToolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = match (read("KOMMO_BASE_URL"), read("KOMMO_SUBDOMAIN")) {
            (Some(raw), _) => Some(parse_base_url(&raw)?),
            (None, Some(subdomain)) => Some(parse_base_url(&format!(
                "https://{}.{}",
                subdomain.trim_matches('.'),
                network::KOMMO_DOMAIN
            ))?),
            (None, None) => None,
        };

        let defaults = Settings::default();
        Ok(Self {
            base_url,
            access_token: read("KOMMO_ACCESS_TOKEN"),
            timeout_ms: parse_positive(read("KOMMO_TIMEOUT_MS"), "KOMMO_TIMEOUT_MS")?
                .unwrap_or(defaults.timeout_ms),
            read_attempts: parse_positive(read("KOMMO_READ_RETRIES"), "KOMMO_READ_RETRIES")?
                .map(|v| v as usize)
                .unwrap_or(defaults.read_attempts),
            catalog_max_pages: parse_positive(
                read("KOMMO_CATALOG_MAX_PAGES"),
                "KOMMO_CATALOG_MAX_PAGES",
            )?
            .map(|v| v as usize)
            .unwrap_or(defaults.catalog_max_pages),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.access_token.is_some()
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw).map_err(|err| {
        ToolError::invalid_params(format!("KOMMO_BASE_URL is not a valid URL: {}", err))
    })?;
    if !ALLOWED_HTTP.contains(&url.scheme()) {
        return Err(ToolError::invalid_params(format!(
            "KOMMO_BASE_URL must use http or https, got {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ToolError::invalid_params("KOMMO_BASE_URL must include a host"));
    }
    Ok(url)
}

fn parse_positive(raw: Option<String>, label: &str) -> Result<Option<u64>, ToolError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ToolError::invalid_params(format!(
            "{} must be a positive integer, got '{}'",
            label, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ToolError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let parsed = settings(&[]).expect("settings");
        assert_eq!(parsed, Settings::default());
        assert!(!parsed.is_configured());
    }

    #[test]
    fn subdomain_expands_to_kommo_host() {
        let parsed = settings(&[("KOMMO_SUBDOMAIN", "acme"), ("KOMMO_ACCESS_TOKEN", "tok")])
            .expect("settings");
        assert_eq!(
            parsed.base_url.map(|u| u.to_string()),
            Some("https://acme.kommo.com/".to_string())
        );
        assert!(parsed.access_token.is_some());
    }

    #[test]
    fn explicit_base_url_wins_over_subdomain() {
        let parsed = settings(&[
            ("KOMMO_BASE_URL", "http://127.0.0.1:8080"),
            ("KOMMO_SUBDOMAIN", "acme"),
        ])
        .expect("settings");
        assert_eq!(
            parsed.base_url.and_then(|u| u.host_str().map(|h| h.to_string())),
            Some("127.0.0.1".to_string())
        );
    }

    #[test]
    fn malformed_values_fail_fast() {
        assert!(settings(&[("KOMMO_BASE_URL", "ftp://acme.kommo.com")]).is_err());
        assert!(settings(&[("KOMMO_BASE_URL", "not a url")]).is_err());
        assert!(settings(&[("KOMMO_TIMEOUT_MS", "0")]).is_err());
        assert!(settings(&[("KOMMO_READ_RETRIES", "many")]).is_err());
    }

    #[test]
    fn numeric_overrides_apply() {
        let parsed = settings(&[
            ("KOMMO_TIMEOUT_MS", "1500"),
            ("KOMMO_READ_RETRIES", "1"),
            ("KOMMO_CATALOG_MAX_PAGES", "3"),
        ])
        .expect("settings");
        assert_eq!(parsed.timeout_ms, 1500);
        assert_eq!(parsed.read_attempts, 1);
        assert_eq!(parsed.catalog_max_pages, 3);
    }
}
