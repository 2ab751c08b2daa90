use crate::classify::{ErrorCategory, SpawnErrorKind};

pub type Result<R, E = Error> = std::result::Result<R, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("process `{0}` not found")]
    ProcessNotFound(String),

    #[error("{message}")]
    Spawn {
        name: String,
        kind: SpawnErrorKind,
        category: ErrorCategory,
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Category of a spawn failure; `None` for other errors.
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Spawn { category, .. } => Some(*category),
            Self::ProcessNotFound(_) => None,
        }
    }
}
