//! Error types for the session layer.

/// Errors that can occur while managing reconnection tokens.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The reconnection token doesn't match anything the server issued,
    /// or was already redeemed. Tokens are single-use.
    #[error("reconnection token not recognized")]
    UnknownToken,
}
