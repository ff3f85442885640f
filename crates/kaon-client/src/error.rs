// kaon-client/src/error.rs

/// Result type for upstream calls
pub type KaonResult<T> = Result<T, KaonError>;

/// Errors surfaced by the Kaon node client.
///
/// Node RPC errors are classified by code so proxies can turn "no such
/// thing" answers into empty Ethereum results.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KaonError {
    /// RPC code -5
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// RPC code -8
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// RPC code -32603
    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Try again later: {0}")]
    TryAgain(String),

    #[error("Work queue depth exceeded")]
    WorkQueueDepth,

    #[error("result is empty")]
    EmptyResponse,

    #[error("kaond RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("kaond returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("couldn't decode {method} response: {reason}")]
    Decode { method: String, reason: String },

    #[error("{0}")]
    Script(String),

    #[error("unsupported chain {0:?}")]
    UnsupportedChain(String),

    #[error("server is shutting down")]
    Shutdown,
}

pub const CODE_INVALID_ADDRESS: i64 = -5;
pub const CODE_INVALID_PARAMETER: i64 = -8;
pub const CODE_INTERNAL_ERROR: i64 = -32603;

const WORK_QUEUE_DEPTH_MARKER: &str = "work queue depth exceeded";
const TRY_AGAIN_MARKER: &str = "try again";

impl KaonError {
    /// Classify an `{code, message}` error object returned by the node
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();

        if lower.contains(WORK_QUEUE_DEPTH_MARKER) {
            return KaonError::WorkQueueDepth;
        }
        if lower.contains(TRY_AGAIN_MARKER) {
            return KaonError::TryAgain(message);
        }

        match code {
            CODE_INVALID_ADDRESS => KaonError::InvalidAddress(message),
            CODE_INVALID_PARAMETER => KaonError::InvalidParameter(message),
            CODE_INTERNAL_ERROR => KaonError::InternalError(message),
            _ => KaonError::Rpc { code, message },
        }
    }

    /// Classify a non-JSON HTTP failure body
    pub fn from_http(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if body.to_ascii_lowercase().contains(WORK_QUEUE_DEPTH_MARKER) {
            return KaonError::WorkQueueDepth;
        }
        KaonError::Http { status, body }
    }

    /// Errors worth retrying after a short pause
    pub fn is_transient(&self) -> bool {
        matches!(self, KaonError::TryAgain(_) | KaonError::WorkQueueDepth)
    }

    pub fn decode(method: &str, err: impl std::fmt::Display) -> Self {
        KaonError::Decode {
            method: method.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(matches!(KaonError::from_rpc(-5, "Invalid address"), KaonError::InvalidAddress(_)));
        assert!(matches!(KaonError::from_rpc(-8, "Block height out of range"), KaonError::InvalidParameter(_)));
        assert!(matches!(KaonError::from_rpc(-32603, "boom"), KaonError::InternalError(_)));
        assert!(matches!(KaonError::from_rpc(-28, "Loading block index, try again"), KaonError::TryAgain(_)));
        assert!(matches!(KaonError::from_rpc(-1, "other"), KaonError::Rpc { code: -1, .. }));
    }

    #[test]
    fn test_http_work_queue() {
        let err = KaonError::from_http(500, "Work queue depth exceeded");
        assert!(matches!(err, KaonError::WorkQueueDepth));
        assert!(err.is_transient());
        assert!(!KaonError::from_http(401, "Unauthorized").is_transient());
    }
}
