//! Error taxonomy for the dashboard core.
//!
//! "No data" is deliberately absent here: an empty month or a masked pixel is
//! a valid outcome and lives in the result types instead.

use thiserror::Error;

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// Unknown pollutant identifier or malformed static configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// User supplied input that is out of range or not a number.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The hosted imagery service failed to answer.
    #[error("Imagery service failure: {0}")]
    Service(#[from] ServiceError),
}

/// Failures talking to the hosted imagery service. All of them are
/// recoverable from the point of view of a single UI interaction.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Service returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Not authorized: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else {
            ServiceError::Http(e.to_string())
        }
    }
}

impl DashboardError {
    /// Short machine-readable tag used in JSON responses.
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::Configuration(_) => "configuration",
            DashboardError::Validation(_) => "invalid",
            DashboardError::Service(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_convert_into_dashboard_errors() {
        let err: DashboardError = ServiceError::Timeout.into();
        assert!(matches!(err, DashboardError::Service(ServiceError::Timeout)));
        assert_eq!(err.kind(), "error");
    }

    #[test]
    fn status_error_message_includes_code() {
        let err = ServiceError::Status {
            code: 429,
            body: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "Service returned 429: quota exceeded");
    }
}
