use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("send rejected with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}
