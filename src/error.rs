//! Error types shared by every layer of the store.
//!
//! Startup failures (`ConfigError`, key file I/O) are fatal for the binaries.
//! `ProtocolError` and `CryptoError` raised while serving a single request are
//! turned into an error reply for that request and never stop the server.

use thiserror::Error;

/// Bad scheme parameters or unusable key material.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("key file already exists: {0}")]
    AlreadyExists(String),

    #[error("key file not found: {0}")]
    MissingKeyFile(String),

    #[error("key file unreadable: {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("invalid scheme parameters: {0}")]
    InvalidParameters(String),

    #[error("key bundle is missing the {0}")]
    MissingKeyMaterial(&'static str),
}

/// Malformed or unsupported requests and responses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unexpected tag byte {0:#04x}")]
    BadTag(u8),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("only '*' supported")]
    UnsupportedPattern,

    #[error("request exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Failures of the homomorphic layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("decryption requires the secret key")]
    NotAuthorized,

    #[error("invalid ciphertext: {0}")]
    CorruptCiphertext(String),

    #[error("text of {len} bytes exceeds slot capacity {capacity}")]
    TooLong { len: usize, capacity: usize },

    #[error("NUL byte at position {position}; zero slots mark the end of the text")]
    NulByte { position: usize },

    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),

    #[error("no rotation key for Galois element {0}")]
    MissingGaloisKey(usize),

    #[error("modulus chain exhausted")]
    LevelExhausted,
}

/// Top-level error for store operations.
#[derive(Debug, Error)]
pub enum KvError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// An error reply sent back by the server.
    #[error("server error: {0}")]
    Remote(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_messages_match_wire_text() {
        assert_eq!(
            ProtocolError::WrongArity("set".into()).to_string(),
            "wrong number of arguments for 'set' command"
        );
        assert_eq!(
            ProtocolError::UnknownCommand("foo".into()).to_string(),
            "unknown command 'foo'"
        );
        assert_eq!(ProtocolError::UnsupportedPattern.to_string(), "only '*' supported");
    }

    #[test]
    fn test_kv_error_wraps_crypto() {
        let err: KvError = CryptoError::NotAuthorized.into();
        assert!(matches!(err, KvError::Crypto(CryptoError::NotAuthorized)));
        assert_eq!(err.to_string(), "decryption requires the secret key");
    }
}
