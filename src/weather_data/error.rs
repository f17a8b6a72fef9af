use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse JSON data from {0}")]
    JsonParse(String, #[source] serde_json::Error),

    // Body was still not valid JSON after envelope and truncation repair
    #[error("Malformed weather payload for station '{station}'")]
    MalformedBody {
        station: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Classifies a `reqwest` failure for `url` into timeout, status or transport.
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                source: e,
            }
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus {
                url: url.to_string(),
                status,
                source: e,
            }
        } else {
            FetchError::NetworkRequest(url.to_string(), e)
        }
    }
}
