use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("signing key unavailable: {0}")]
    SigningKeyUnavailable(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("envelope too large: {size} bytes exceeds {limit}")]
    EnvelopeTooLarge { size: usize, limit: usize },

    #[error("ABI encode error: {0}")]
    AbiEncode(String),

    #[error("ABI decode error: {0}")]
    AbiDecode(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
