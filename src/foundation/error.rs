/// Convenience result type used across Mimi.
pub type MimiResult<T> = Result<T, MimiError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum MimiError {
    /// Invalid user-provided request or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A sprite could not be read or decoded. Aborts only the draw step that needed it.
    #[error("decode error for '{path}': {message}")]
    Decode {
        /// Sprite path relative to the asset root.
        path: String,
        /// Underlying reader or decoder message.
        message: String,
    },

    /// The speech service failed or returned a non-completed outcome.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio playback could not be opened or started.
    #[error("playback error: {0}")]
    Playback(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MimiError {
    /// Build a [`MimiError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MimiError::Decode`] value.
    pub fn decode(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Build a [`MimiError::Synthesis`] value.
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Build a [`MimiError::Playback`] value.
    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }

    /// Build a [`MimiError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
