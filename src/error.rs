use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required settings: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Invalid roles file {path}: {source}")]
    Roles { path: PathBuf, source: RolesError },
}

#[derive(Debug, Error)]
pub enum RolesError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parse(#[from] toml::de::Error),

    #[error("role with empty name")]
    EmptyName,

    #[error("duplicate role name '{0}'")]
    DuplicateName(String),

    #[error("role '{0}' has no keywords")]
    NoKeywords(String),

    #[error("default role '{0}' must not have keywords")]
    DefaultKeywords(String),
}

/// A single message could not be read from the mailbox.
#[derive(Debug, Error)]
#[error("Failed to read message {reference}: {reason}")]
pub struct FetchError {
    pub reference: String,
    pub reason: String,
}

/// Everything that can go wrong while answering one message. None of these
/// abort a run.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("No resume found for {resume_ref} (also tried the default resume)")]
    NoResume { resume_ref: String },

    #[error("Reply template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("Failed to build reply: {0}")]
    Build(String),

    #[error("Failed to send reply: {0}")]
    Send(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),
}

/// The dedup store could not be read or written. Always fatal to the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on dedup store '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Dedup store '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
