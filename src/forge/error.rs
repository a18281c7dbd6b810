use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("forge http error: {0}")]
    Http(String),

    #[error("forge operation timed out: {0}")]
    Timeout(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type ForgeResult<T> = Result<T, ForgeError>;
