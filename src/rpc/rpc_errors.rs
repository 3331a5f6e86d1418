use thiserror::Error;

/// Network query error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Request did not complete in time
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Non-success HTTP status from the node
    #[error("RPC response error: {message} (endpoint: {endpoint}, status: {status})")]
    RpcResponse {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    /// Body could not be decoded into the expected shape
    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    /// Client could not be constructed or addressed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller supplied an unusable argument
    #[error("Validation error: {0}")]
    Validation(String),
}

impl RpcError {
    /// Check if a later attempt of the same query might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::Timeout { .. } => true,
            RpcError::RateLimitExceeded { .. } => true,
            // A half-written or unexpected body is treated as transient
            RpcError::MalformedResponse { .. } => true,
            RpcError::RpcResponse { status, .. } => *status == 408 || (500..600).contains(status),

            RpcError::Configuration(_) => false,
            RpcError::Validation(_) => false,
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcError::Transport { endpoint, .. } => Some(endpoint),
            RpcError::Timeout { endpoint, .. } => Some(endpoint),
            RpcError::RpcResponse { endpoint, .. } => Some(endpoint),
            RpcError::RateLimitExceeded { endpoint } => Some(endpoint),
            RpcError::MalformedResponse { endpoint, .. } => Some(endpoint),
            RpcError::Configuration(_) | RpcError::Validation(_) => None,
        }
    }

    /// Classify a `reqwest` failure
    pub fn from_reqwest(err: reqwest::Error, endpoint: &str, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            RpcError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms,
            }
        } else if err.is_builder() {
            RpcError::Configuration(err.to_string())
        } else if err.is_decode() {
            RpcError::MalformedResponse {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        } else {
            RpcError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: &str, endpoint: &str) -> Self {
        if status == 429 {
            return RpcError::RateLimitExceeded {
                endpoint: endpoint.to_string(),
            };
        }
        // Fullnode errors carry {"message": ..., "error_code": ...}
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.chars().take(256).collect());
        RpcError::RpcResponse {
            endpoint: endpoint.to_string(),
            status,
            message,
        }
    }
}
