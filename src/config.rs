//! Configuration module for the EWS endpoint and server settings
//!
//! All configuration is loaded from environment variables with the prefix
//! `MAIL_EWS_`. The endpoint, username, and password are required; everything
//! else has a sensible default.

use std::env;
use std::env::VarError;

use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

/// Server-wide configuration
///
/// Wraps the EWS connection settings and global server knobs. Cloned into MCP
/// tool handlers via `Arc` for thread-safe shared access.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Full EWS endpoint URL (e.g. `https://mail.example.com/EWS/Exchange.asmx`)
    pub endpoint: String,
    /// Username for HTTP Basic authentication (usually the primary SMTP address)
    pub username: String,
    /// Password stored in a type that prevents accidental logging
    pub password: SecretString,
    /// Exchange schema version advertised in the SOAP header
    pub exchange_version: String,
    /// Signature text appended to outgoing bodies (empty disables signatures)
    pub signature: String,
    /// Whether to verify the server TLS certificate
    pub verify_tls: bool,
    /// HTTP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Full request (connect + response) timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum idempotency ledger entries (FIFO eviction when exceeded)
    pub idempotency_max_entries: usize,
}

impl ServerConfig {
    /// Load all configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if required environment variables are missing
    /// or malformed.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// MAIL_EWS_ENDPOINT=https://mail.example.com/EWS/Exchange.asmx
    /// MAIL_EWS_USERNAME=user@example.com
    /// MAIL_EWS_PASSWORD=secret
    /// MAIL_EWS_SIGNATURE=Jane Doe\n---\nAcme Corp
    /// MAIL_EWS_VERIFY_TLS=true
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        let endpoint = required_env("MAIL_EWS_ENDPOINT")?;
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(AppError::InvalidInput(
                "MAIL_EWS_ENDPOINT must be an http(s) URL".to_owned(),
            ));
        }

        Ok(Self {
            endpoint,
            username: required_env("MAIL_EWS_USERNAME")?,
            password: SecretString::new(required_env("MAIL_EWS_PASSWORD")?.into()),
            exchange_version: optional_env("MAIL_EWS_EXCHANGE_VERSION")?
                .unwrap_or_else(|| "Exchange2013".to_owned()),
            signature: optional_env("MAIL_EWS_SIGNATURE")?.unwrap_or_default(),
            verify_tls: parse_bool_env("MAIL_EWS_VERIFY_TLS", true)?,
            connect_timeout_ms: parse_u64_env("MAIL_EWS_CONNECT_TIMEOUT_MS", 10_000)?,
            request_timeout_ms: parse_u64_env("MAIL_EWS_REQUEST_TIMEOUT_MS", 60_000)?,
            idempotency_max_entries: parse_usize_env("MAIL_EWS_IDEMPOTENCY_MAX_ENTRIES", 500)?,
        })
    }
}

/// Read a required environment variable, returning error if missing or empty
fn required_env(key: &str) -> AppResult<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(format!(
            "missing required environment variable {key}"
        ))),
    }
}

/// Read an optional environment variable
///
/// Returns `None` if unset. Unlike [`required_env`], an empty value is
/// preserved as-is (an explicitly empty signature is meaningful).
fn optional_env(key: &str) -> AppResult<Option<String>> {
    match env::var(key) {
        Ok(v) => Ok(Some(v)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// Parse a boolean environment variable with flexible values
///
/// Accepts: `1`, `true`, `yes`, `y`, `on` (truthy) or `0`, `false`, `no`,
/// `n`, `off` (falsy). Case-insensitive. Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set to an unrecognized value.
fn parse_bool_env(key: &str, default: bool) -> AppResult<bool> {
    match env::var(key) {
        Ok(v) => parse_bool_value(&v).ok_or_else(|| {
            AppError::InvalidInput(format!("invalid boolean environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u64` environment variable with default fallback
///
/// Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `u64`.
fn parse_u64_env(key: &str, default: u64) -> AppResult<u64> {
    match env::var(key) {
        Ok(v) => v.parse::<u64>().map_err(|_| {
            AppError::InvalidInput(format!("invalid u64 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// Parse a `usize` environment variable with default fallback
///
/// Returns `default` if unset.
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but not a valid `usize`.
fn parse_usize_env(key: &str, default: usize) -> AppResult<usize> {
    match env::var(key) {
        Ok(v) => v.parse::<usize>().map_err(|_| {
            AppError::InvalidInput(format!("invalid usize environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_bool_value;

    #[test]
    fn parse_bool_value_accepts_common_truthy_and_falsy_values() {
        for truthy in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert_eq!(parse_bool_value(truthy), Some(true));
        }

        for falsy in ["0", "false", "FALSE", " no ", "N", "off"] {
            assert_eq!(parse_bool_value(falsy), Some(false));
        }
    }

    #[test]
    fn parse_bool_value_rejects_unrecognized_values() {
        for invalid in ["", "2", "maybe", "enabled", "disabled"] {
            assert_eq!(parse_bool_value(invalid), None);
        }
    }
}
