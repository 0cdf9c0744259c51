//! Error types.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// The first five variants are the cookie/state protocol failures. All of them
/// are terminal for the request: the HTTP layer should treat any of them as
/// "not authenticated" and restart the login flow. Their messages are
/// deliberately generic.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed cookie or state structure.
    #[error("malformed value: {0}")]
    Format(String),

    /// The signature field is not valid base64.
    #[error("unable to decode cookie mac")]
    Decode(#[from] base64::DecodeError),

    /// The identity named by the cookie is not cached (evicted or issued before a restart).
    #[error("identity is unknown")]
    UnknownIdentity,

    /// MAC mismatch. Tampering and a rotated secret look the same.
    #[error("invalid cookie mac")]
    Signature,

    /// The cookie's expiry has passed.
    #[error("cookie has expired")]
    Expired,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The system random source failed while generating a nonce.
    #[error("unable to generate nonce: {0}")]
    Nonce(String),

    /// Failed to read a configuration file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// True for the cookie/state protocol failures (everything the HTTP layer
    /// maps to "not authenticated").
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::Format(_)
                | Error::Decode(_)
                | Error::UnknownIdentity
                | Error::Signature
                | Error::Expired
        )
    }

    /// Short, stable name of the error kind, suitable for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Format(_) => "format",
            Error::Decode(_) => "decode",
            Error::UnknownIdentity => "unknown_identity",
            Error::Signature => "signature",
            Error::Expired => "expired",
            Error::Config(_) => "config",
            Error::Nonce(_) => "nonce",
            Error::Io(_) => "io",
            Error::Toml(_) => "toml",
        }
    }
}
