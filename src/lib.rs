pub mod app;
pub mod book;
pub mod cache;
pub mod clock;
pub mod config;
pub mod exchange;
pub mod models;
pub mod registry;
pub mod signing;
pub mod status;
pub mod transport;

/// Errors surfaced by adapters and the shared canonicalization core.
///
/// An unrecognized upstream status is not an error: it normalizes to
/// [`models::OrderStatus::Other`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("decode failed: {message}")]
    Decode { message: String, raw: String },
    #[error("exchange rejected request ({code}): {message}")]
    ExchangeRejected { code: String, message: String },
    #[error("credentials missing: {0}")]
    AuthMissing(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn decode(message: impl Into<String>, raw: &[u8]) -> Self {
        Self::Decode {
            message: message.into(),
            raw: String::from_utf8_lossy(raw).into_owned(),
        }
    }

    pub fn rejected(code: impl ToString, message: impl Into<String>) -> Self {
        Self::ExchangeRejected {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
