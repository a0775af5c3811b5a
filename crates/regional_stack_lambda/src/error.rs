/// Failures while handling one lifecycle event. Each is reported to the
/// engine as a FAILED response for that region only.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid handler configuration: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("stack operation failed: {0}")]
    Stack(String),

    #[error("self invocation failed: {0}")]
    Invoke(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}
