use std::path::Path;

use reqwest::Url;

use crate::config::schema::ClientConfig;
use crate::error::ConfigError;

pub const ENV_API_URL: &str = "FACTURAS_API_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "FACTURAS_POLL_INTERVAL_MS";
pub const ENV_COMPLETION_DELAY_MS: &str = "FACTURAS_COMPLETION_DELAY_MS";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

impl ClientConfig {
    /// Defaults with `FACTURAS_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = ClientConfig::default();
        apply_env_overrides(&mut config)?;
        validate_config(&config)?;
        Ok(config)
    }
}

/// Applies `FACTURAS_*` environment variables on top of `config`.
pub fn apply_env_overrides(config: &mut ClientConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Same as [`apply_env_overrides`] with an injectable lookup.
pub fn apply_overrides_from<F>(config: &mut ClientConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
        config.api_url = url.trim().to_string();
    }

    if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
        config.poll_interval_ms = parse_millis(ENV_POLL_INTERVAL_MS, &raw)?;
    }

    if let Some(raw) = lookup(ENV_COMPLETION_DELAY_MS) {
        config.completion_delay_ms = parse_millis(ENV_COMPLETION_DELAY_MS, &raw)?;
    }

    Ok(())
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::Validation {
            message: format!("{} must be a whole number of milliseconds: {}", key, e),
        })
}

pub fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "poll_interval_ms must be greater than 0".to_string(),
        });
    }

    if config.connect_timeout_secs == 0 || config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "HTTP timeouts must be greater than 0".to_string(),
        });
    }

    if config.max_file_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "max_file_bytes must be greater than 0".to_string(),
        });
    }

    let url = Url::parse(&config.api_url).map_err(|e| ConfigError::InvalidUrl {
        url: config.api_url.clone(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            url: config.api_url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl {
            url: config.api_url.clone(),
            reason: "URL cannot be used as a base".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, "http://localhost:8000/api");
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.completion_delay_ms, 2000);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "api_url": "https://facturas.example.com/api/",
            "poll_interval_ms": 500,
            "completion_delay_ms": 0,
            "connect_timeout_secs": 3,
            "request_timeout_secs": 5,
            "max_file_bytes": 1048576,
            "require_pdf_media_type": true
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.base_url(), "https://facturas.example.com/api");
        assert_eq!(config.poll_interval().as_millis(), 500);
        assert!(config.completion_delay().is_zero());
        assert_eq!(config.request_timeout().as_secs(), 5);
        assert!(config.require_pdf_media_type);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = load_config_from_str(r#"{ "poll_interval_ms": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = load_config_from_str(r#"{ "request_timeout_secs": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_malformed_url_rejected() {
        let result = load_config_from_str(r#"{ "api_url": "not a url" }"#);
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let result = load_config_from_str(r#"{ "api_url": "ftp://files.example.com" }"#);
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let result = load_config_from_str("{ api_url: ");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_URL, " http://10.0.0.5:8000/api "),
            (ENV_POLL_INTERVAL_MS, "750"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        apply_overrides_from(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.api_url, "http://10.0.0.5:8000/api");
        assert_eq!(config.poll_interval_ms, 750);
        assert_eq!(config.completion_delay_ms, 2000);
    }

    #[test]
    fn test_blank_url_override_ignored() {
        let mut config = ClientConfig::default();
        apply_overrides_from(&mut config, |k| {
            (k == ENV_API_URL).then(|| "   ".to_string())
        })
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:8000/api");
    }

    #[test]
    fn test_non_numeric_override_rejected() {
        let mut config = ClientConfig::default();
        let result = apply_overrides_from(&mut config, |k| {
            (k == ENV_COMPLETION_DELAY_MS).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }
}
