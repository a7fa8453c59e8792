//! Errors raised while resolving and applying resource packs.

use thiserror::Error;

/// Whether retrying the same configuration can succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The configuration itself is wrong; retrying without editing it is pointless
    Fatal,
    /// Network, rate limit or filesystem trouble that may go away on its own
    Transient,
}

/// Failure to resolve a single pack.
///
/// Messages carry the pack's context so they can be logged as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    #[error("{0}")]
    Config(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid UUID '{0}'")]
    InvalidUuid(String),

    #[error("Repository {user}/{repo} has no tags")]
    NoTags { user: String, repo: String },

    #[error("Resource pack data is empty")]
    EmptyPack,

    #[error("Request to {uri} failed with status {status}: {message}")]
    Http {
        uri: String,
        status: u16,
        message: String,
    },

    #[error("Request to {uri} failed: {message}")]
    Network { uri: String, message: String },

    #[error("Failed to parse response from {uri}: {message}")]
    Parse { uri: String, message: String },

    #[error("{context}: {message}")]
    Io { context: String, message: String },
}

impl PackError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(context: impl Into<String>, error: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: error.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::InvalidUrl { .. }
            | Self::InvalidUuid(_)
            | Self::NoTags { .. }
            | Self::EmptyPack => ErrorKind::Fatal,
            Self::Http { .. } | Self::Network { .. } | Self::Parse { .. } | Self::Io { .. } => {
                ErrorKind::Transient
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

/// Failure of a single pack delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("Pack is disabled")]
    Disabled,

    /// The pending delivery was dropped before the client answered
    #[error("Pack delivery was abandoned before a status arrived")]
    Abandoned,
}
