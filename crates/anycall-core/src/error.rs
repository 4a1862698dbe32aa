/// Payload codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The caller-built value violates a payload invariant.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The bytes are truncated, inconsistent or not canonical ABI.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
}

impl CodecError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidPayload(reason.into())
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEncoding(reason.into())
    }
}
