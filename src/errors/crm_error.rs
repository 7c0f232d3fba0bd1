use thiserror::Error;

/// Failures raised by the Kommo HTTP transport before they become tool errors.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Kommo connection is not configured: {0}")]
    NotConfigured(String),

    #[error("Request to Kommo timed out: {method} {path}")]
    Timeout { method: String, path: String },

    #[error("Network error calling Kommo ({method} {path}): {source}")]
    Network {
        method: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Kommo responded {status} to {method} {path}: {detail}")]
    Status {
        status: u16,
        method: String,
        path: String,
        detail: String,
    },

    #[error("Unexpected Kommo response for {path}: {reason}")]
    Decode { path: String, reason: String },
}

impl CrmError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CrmError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a read may be retried after this failure.
    pub fn is_transient(&self) -> bool {
        match self {
            CrmError::Timeout { .. } | CrmError::Network { .. } => true,
            CrmError::Status { status, .. } => {
                crate::constants::retry::STATUS_CODES.contains(status)
            }
            _ => false,
        }
    }
}
