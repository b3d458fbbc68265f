use thiserror::Error;

/// Errors raised by the framing, reading and transport layers.
///
/// A clean end-of-stream is not an error: readers report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum LspError {
    #[error("failed to encode message: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("failed to decode message: {reason}")]
    Decode { reason: String, raw: Vec<u8> },

    #[error("message truncated: expected {expected} bytes, received {received}")]
    Truncated {
        expected: usize,
        received: usize,
        raw: Vec<u8>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn language server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to language server at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl LspError {
    pub fn decode(reason: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        LspError::Decode {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, LspError::Decode { .. })
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, LspError::Truncated { .. })
    }

    /// Raw bytes attached to the error, if it carries any.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            LspError::Decode { raw, .. } | LspError::Truncated { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LspError>;
