//! Error types for serialization and deserialization.

/// Errors that can occur while encoding or decoding a JOSS bytestream.
#[derive(Debug, thiserror::Error)]
pub enum JossError {
    /// More bytes are needed to finish the value.
    #[error("the serialized bytestream ended before the deserialization could complete")]
    Ended,

    /// A complete value was decoded but bytes remain.
    #[error("the deserialization completed before the end of the serialized bytestream")]
    Unused,

    #[error("the serialized bytestream exceeded the maximum acceptable length of {limit} bytes")]
    Exceeded { limit: usize },

    #[error("malformed bytestream: {0}")]
    Malformed(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// A streaming session was used after it already failed.
    #[error("the deserialization session has already failed")]
    Failed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JossError {
    /// Wraps any displayable reason as a malformed-input error.
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::Malformed(reason.to_string())
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ended => "ERR_ENDED",
            Self::Unused => "ERR_UNUSED",
            Self::Exceeded { .. } => "ERR_EXCEEDED",
            Self::Malformed(_) => "ERR_MALFORMED",
            Self::InvalidOption(_) => "ERR_OPTION",
            Self::Failed => "ERR_FAILED",
            Self::Io(_) => "ERR_IO",
        }
    }

    /// Whether waiting for more input could resolve this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_variants() {
        assert_eq!(JossError::Ended.code(), "ERR_ENDED");
        assert_eq!(JossError::Unused.code(), "ERR_UNUSED");
        assert_eq!(JossError::Exceeded { limit: 4 }.code(), "ERR_EXCEEDED");
        assert_eq!(JossError::malformed("bad tag").code(), "ERR_MALFORMED");
        assert_eq!(JossError::InvalidOption("endian".into()).code(), "ERR_OPTION");
    }

    #[test]
    fn only_ended_is_recoverable() {
        assert!(JossError::Ended.is_recoverable());
        assert!(!JossError::Unused.is_recoverable());
        assert!(!JossError::malformed("x").is_recoverable());
    }

    #[test]
    fn display_includes_reason() {
        let e = JossError::malformed("duplicate key");
        assert_eq!(e.to_string(), "malformed bytestream: duplicate key");
    }
}
