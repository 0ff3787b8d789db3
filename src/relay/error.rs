//! Relay failure taxonomy

/// Bytes of an upstream error body kept for diagnostics
pub const EXCERPT_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Failed to reach upstream {endpoint}: {source}")]
    UpstreamConnect {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream {endpoint} returned status {status}")]
    UpstreamStatus {
        endpoint: String,
        status: u16,
        excerpt: Option<String>,
    },

    #[error("Upstream {endpoint} timed out")]
    UpstreamTimeout { endpoint: String },

    #[error("Failed to read upstream body from {endpoint}: {message}")]
    UpstreamBody { endpoint: String, message: String },

    #[error("Downstream write failed: {0}")]
    DownstreamWrite(String),
}

impl RelayError {
    /// Classify a request/connect failure
    pub fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::UpstreamConnect {
                endpoint: endpoint.to_string(),
                source: err,
            }
        }
    }

    /// Classify a failure while reading the response body
    pub fn from_body_error(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::UpstreamBody {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Build a status error, keeping a lossy excerpt of the body
    pub fn status(endpoint: &str, status: u16, body: Option<&[u8]>) -> Self {
        let excerpt = body
            .filter(|b| !b.is_empty())
            .map(|b| String::from_utf8_lossy(&b[..b.len().min(EXCERPT_LEN)]).into_owned());
        Self::UpstreamStatus {
            endpoint: endpoint.to_string(),
            status,
            excerpt,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. })
    }

    /// True for failures on the caller side of the relay
    pub fn is_downstream(&self) -> bool {
        matches!(self, Self::DownstreamWrite(_))
    }

    /// Upstream HTTP status, if the upstream answered with an error
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_excerpt_truncated() {
        let body = vec![b'x'; 500];
        let err = RelayError::status("http://tts/v1/tts", 503, Some(&body));
        match err {
            RelayError::UpstreamStatus { status, excerpt, .. } => {
                assert_eq!(status, 503);
                assert_eq!(excerpt.unwrap().len(), EXCERPT_LEN);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_without_body() {
        let err = RelayError::status("http://tts/v1/tts", 500, Some(b""));
        assert!(matches!(err, RelayError::UpstreamStatus { excerpt: None, .. }));
        assert_eq!(err.upstream_status(), Some(500));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_display() {
        let err = RelayError::UpstreamTimeout {
            endpoint: "http://tts/v1/tts".to_string(),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out"));

        let err = RelayError::DownstreamWrite("client disconnected".to_string());
        assert!(err.is_downstream());
        assert!(err.to_string().contains("client disconnected"));
    }
}
