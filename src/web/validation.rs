//! Request field rules shared by the check and CRUD endpoints.

use reqwest::Url;

use crate::monitor::probe::MAX_PROBE_TIMEOUT_SECONDS;
use crate::web::error::AppError;

pub const MIN_CHECK_INTERVAL_SECONDS: i32 = 60;
pub const MAX_CHECK_INTERVAL_SECONDS: i32 = 3600;
pub const DEFAULT_CHECK_TIMEOUT_SECONDS: i32 = 10;

/// Accepts absolute http(s) URLs with a host. Returns the trimmed URL.
pub fn validate_url(raw: &str) -> Result<String, AppError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(AppError::InvalidInput(
            "Missing required field: 'url'".to_string(),
        ));
    }
    let parsed = Url::parse(url)
        .map_err(|e| AppError::InvalidInput(format!("Invalid URL format: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::InvalidInput(
            "URL scheme must be http or https".to_string(),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AppError::InvalidInput(
            "URL must include a valid domain".to_string(),
        ));
    }
    Ok(url.to_string())
}

pub fn validate_timeout(timeout: i32) -> Result<(), AppError> {
    let max = i32::try_from(MAX_PROBE_TIMEOUT_SECONDS).unwrap_or(i32::MAX);
    if !(0..=max).contains(&timeout) {
        return Err(AppError::InvalidInput(format!(
            "Timeout must be between 0 and {max} seconds"
        )));
    }
    Ok(())
}

pub fn validate_check_interval(interval: i32) -> Result<(), AppError> {
    if !(MIN_CHECK_INTERVAL_SECONDS..=MAX_CHECK_INTERVAL_SECONDS).contains(&interval) {
        return Err(AppError::InvalidInput(format!(
            "Check interval must be between {MIN_CHECK_INTERVAL_SECONDS} and {MAX_CHECK_INTERVAL_SECONDS}"
        )));
    }
    Ok(())
}
