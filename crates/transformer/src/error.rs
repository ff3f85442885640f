// transformer/src/error.rs

use kaon_client::KaonError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub const CODE_METHOD_NOT_FOUND: i32 = -32601;
pub const CODE_INVALID_REQUEST: i32 = -32600;
pub const CODE_INVALID_MESSAGE: i32 = -32700;
pub const CODE_INVALID_PARAMS: i32 = -32602;
pub const CODE_CALLBACK: i32 = -32000;
pub const CODE_INTERNAL: i32 = -32603;

/// Error returned to the Ethereum client.
///
/// Built where the failure happens and serialized as `{code, message}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonRpcError {
    #[error("The method {0} does not exist/is not available")]
    MethodNotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidMessage(String),

    #[error("{0}")]
    InvalidParams(String),

    /// Upstream or logic failure
    #[error("{0}")]
    Callback(String),

    /// Request-scoped invariant violation
    #[error("{0}")]
    Internal(String),

    #[error("server is shutting down")]
    Shutdown,
}

impl JsonRpcError {
    pub fn code(&self) -> i32 {
        match self {
            JsonRpcError::MethodNotFound(_) => CODE_METHOD_NOT_FOUND,
            JsonRpcError::InvalidRequest(_) => CODE_INVALID_REQUEST,
            JsonRpcError::InvalidMessage(_) => CODE_INVALID_MESSAGE,
            JsonRpcError::InvalidParams(_) => CODE_INVALID_PARAMS,
            JsonRpcError::Callback(_) => CODE_CALLBACK,
            JsonRpcError::Internal(_) => CODE_INTERNAL,
            JsonRpcError::Shutdown => CODE_CALLBACK,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        JsonRpcError::InvalidParams(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        JsonRpcError::InvalidRequest(message.into())
    }

    pub fn callback(message: impl Into<String>) -> Self {
        JsonRpcError::Callback(message.into())
    }

    /// Upstream failure with context, `"context: cause"`
    pub fn upstream(context: &str, err: KaonError) -> Self {
        match err {
            KaonError::Shutdown => JsonRpcError::Shutdown,
            err => JsonRpcError::Callback(format!("{}: {}", context, err)),
        }
    }
}

impl From<KaonError> for JsonRpcError {
    fn from(err: KaonError) -> Self {
        match err {
            KaonError::Shutdown => JsonRpcError::Shutdown,
            err => JsonRpcError::Callback(err.to_string()),
        }
    }
}

impl Serialize for JsonRpcError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("JsonRpcError", 2)?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("message", &self.message())?;
        state.end()
    }
}

pub type TransformResult<T> = Result<T, JsonRpcError>;
