//! Error types for the monitoring client

use std::fmt;

pub type Result<T> = std::result::Result<T, MonitorError>;

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Setup and configuration failures.
///
/// Runtime fetch failures never surface as a `MonitorError`; they are
/// returned as [`FetchError`] values instead.
#[derive(Debug)]
pub enum MonitorError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP client could not be built
    Http(reqwest::Error),

    /// Configuration error
    Config(String),

    /// Site identifier could not be normalized
    InvalidSite(String),

    /// Generic error with message
    Other(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Io(err) => write!(f, "IO error: {}", err),
            MonitorError::Http(err) => write!(f, "HTTP error: {}", err),
            MonitorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MonitorError::InvalidSite(site) => write!(f, "Invalid site identifier: {:?}", site),
            MonitorError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Io(err) => Some(err),
            MonitorError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Io(err)
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Http(err)
    }
}

/// Typed outcome of a failed call to the monitoring backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The backend does not track this site yet. It starts tracking it
    /// as a side effect of the request, so a retry usually succeeds.
    NotMonitored,

    /// Transport failure, timeout, server error or malformed payload
    Network(String),

    /// The outage history endpoint returned no usable data
    NoData(String),

    /// The report POST was rejected or never reached the backend
    SubmissionFailed(String),
}

impl FetchError {
    /// Message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::NotMonitored => {
                "This website is not being monitored yet. Monitoring starts right now.\nPlease try again."
                    .to_string()
            }
            FetchError::Network(_) => "Failed to retrieve website status".to_string(),
            FetchError::NoData(_) => "Outage history not found".to_string(),
            FetchError::SubmissionFailed(_) => "Failed to submit report".to_string(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotMonitored => write!(f, "site is not monitored yet"),
            FetchError::Network(reason) => write!(f, "network error: {}", reason),
            FetchError::NoData(reason) => write!(f, "no data: {}", reason),
            FetchError::SubmissionFailed(reason) => write!(f, "report submission failed: {}", reason),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Network("request timed out".to_string())
        } else if err.is_decode() {
            FetchError::Network(format!("malformed payload: {}", err))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_monitored_message() {
        let message = FetchError::NotMonitored.user_message();
        assert!(message.starts_with("This website is not being monitored yet"));
    }

    #[test]
    fn test_display() {
        let err = FetchError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "network error: connection refused");

        let err = MonitorError::Config("roster is empty".to_string());
        assert_eq!(err.to_string(), "Configuration error: roster is empty");
    }
}
