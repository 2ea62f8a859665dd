use thiserror::Error;

/// Errors raised while fetching or decoding a scene document.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Transport failure reported by the document fetcher.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Compressed stream length is not a multiple of the lane count.
    #[error("compressed stream of {len} code units does not split into {lanes} lanes")]
    DecodeLengthMismatch { len: usize, lanes: usize },

    #[error("{attribute} holds {capacity} values but the stream produced {actual}")]
    BufferOverflow {
        attribute: String,
        capacity: usize,
        actual: usize,
    },

    #[error("unknown transition type: {0}")]
    UnknownTransitionType(String),

    #[error("unknown source type: {0}")]
    UnknownSourceType(String),
}

impl ImportError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument(message.into())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedDocument(err.to_string())
    }
}

pub type Result<T, E = ImportError> = std::result::Result<T, E>;
