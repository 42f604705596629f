use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent did not answer within the configured window. The in-flight
    /// request was cancelled.
    #[error("agent request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("agent returned status {status}: {body}")]
    Http { status: u16, body: String },

    /// 2xx reply that does not fit the run protocol.
    #[error("malformed agent response: {0}")]
    Protocol(String),

    #[error("agent request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid agent endpoint: {0}")]
    InvalidEndpoint(String),
}
