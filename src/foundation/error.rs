/// Result alias used across the crate.
pub type PixmarkResult<T> = Result<T, PixmarkError>;

/// Errors surfaced to callers of the engine.
///
/// Empty or off-image regions are not errors: region effects render them as transparent
/// patches. Accelerated-path failures are recovered inside [`crate::effects::accel`] and
/// never reach this type.
#[derive(thiserror::Error, Debug)]
pub enum PixmarkError {
    /// A caller-supplied value is out of range (zero-sized bitmap, radius <= 0, zoom < 1, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialized markup could not be turned back into annotations.
    #[error("decode error: {0}")]
    Decode(String),

    /// An internal buffer invariant did not hold.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PixmarkError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// `true` for [`PixmarkError::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// `true` for [`PixmarkError::Decode`].
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<serde_json::Error> for PixmarkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
