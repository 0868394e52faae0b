use thiserror::Error;

use crate::dsn::ParseDsnError;

/// Errors surfaced by the capture API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A global capture function was called before [`init`](crate::init).
    #[error("the client has not been initialized")]
    NotInitialized,
    /// An event was captured with an empty message.
    #[error("event message must not be empty")]
    EmptyMessage,
    /// The configured DSN could not be parsed.
    #[error("invalid DSN: {0}")]
    InvalidDsn(#[from] ParseDsnError),
}
