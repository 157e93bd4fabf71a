//! Error types for otter-loader

use thiserror::Error;

use crate::value::Value;

/// Loader error type.
///
/// Errors are cheap to clone: an errored module keeps its error for the rest
/// of the loader's lifetime and hands out clones of it. The thrown value of
/// an [`LoadError::Evaluation`] is shared by reference, so every clone
/// carries the identical exception object.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The fetch hook failed to retrieve a resource
    #[error("Failed to fetch '{url}': {message}")]
    Fetch {
        /// URL that was being fetched
        url: String,
        /// Failure description
        message: String,
    },

    /// The resolve hook could not map a specifier to a URL
    #[error("Cannot resolve '{specifier}' from '{referrer}': {message}")]
    Resolve {
        /// Raw import specifier
        specifier: String,
        /// URL of the importing module
        referrer: String,
        /// Failure description
        message: String,
    },

    /// The init hook failed while preparing a module
    #[error("Failed to initialize '{url}': {message}")]
    Init {
        /// Module URL
        url: String,
        /// Failure description
        message: String,
    },

    /// Module source is malformed
    #[error("Compile error in '{url}': {message}")]
    Compile {
        /// Module URL
        url: String,
        /// Failure description
        message: String,
    },

    /// Instantiation failed (unresolved or incompatible binding)
    #[error("Link error in '{url}': {message}")]
    Link {
        /// Module URL
        url: String,
        /// Failure description
        message: String,
    },

    /// A module body threw during evaluation
    #[error("Uncaught {exception} (evaluating '{url}')")]
    Evaluation {
        /// URL of the module whose body threw
        url: String,
        /// The thrown value
        exception: Value,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LoadError {
    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a resolve error
    pub fn resolve(
        specifier: impl Into<String>,
        referrer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Resolve {
            specifier: specifier.into(),
            referrer: referrer.into(),
            message: message.into(),
        }
    }

    /// Create an init error
    pub fn init(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Init {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a compile error
    pub fn compile(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a link error
    pub fn link(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Link {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The thrown value, if this error came out of a module body.
    pub fn exception(&self) -> Option<&Value> {
        match self {
            Self::Evaluation { exception, .. } => Some(exception),
            _ => None,
        }
    }

    /// Whether two errors are the same failure.
    ///
    /// Evaluation errors compare their thrown values by identity; other
    /// kinds compare by content.
    pub fn is_same(&self, other: &LoadError) -> bool {
        match (self, other) {
            (Self::Evaluation { exception: a, .. }, Self::Evaluation { exception: b, .. }) => {
                a.strict_equals(b)
            }
            (Self::Evaluation { .. }, _) | (_, Self::Evaluation { .. }) => false,
            _ => self.to_string() == other.to_string(),
        }
    }
}

/// Result type using LoadError
pub type LoadResult<T> = Result<T, LoadError>;
