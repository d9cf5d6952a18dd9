use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{endpoint} answered with status {status}")]
    Transport { endpoint: String, status: u16 },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from {endpoint}: {details}")]
    Protocol { endpoint: String, details: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation superseded by a newer one")]
    Superseded,
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn protocol(endpoint: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint: endpoint.into(),
            details: details.into(),
        }
    }

    /// Failures the poller absorbs as transient: non-2xx answers, network
    /// failures and malformed bodies. Anything else ends a poll session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Http(_) | Self::Protocol { .. } | Self::Serialization(_)
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            Self::Http(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
