//! Maps OS spawn failures to actionable categories and messages.

use std::{fmt, io, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpawnErrorKind {
    NotFound,
    PermissionDenied,
    InvalidCwd,
    TooManyFiles,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Permission,
    Config,
    Resource,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not-found",
            Self::Permission => "permission",
            Self::Config => "config",
            Self::Resource => "resource",
            Self::Unknown => "unknown",
        })
    }
}

impl SpawnErrorKind {
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::NotFound => ErrorCategory::NotFound,
            Self::PermissionDenied => ErrorCategory::Permission,
            Self::InvalidCwd => ErrorCategory::Config,
            Self::TooManyFiles => ErrorCategory::Resource,
            Self::Unknown => ErrorCategory::Unknown,
        }
    }

    fn from_io(err: &io::Error, cwd: Option<&Path>) -> Self {
        #[cfg(unix)]
        if let Some(code) = err.raw_os_error() {
            match code {
                libc::ENOTDIR => return Self::InvalidCwd,
                libc::EMFILE | libc::ENFILE => return Self::TooManyFiles,
                _ => {}
            }
        }

        match err.kind() {
            // The OS reports a missing working directory the same way as a
            // missing executable.
            io::ErrorKind::NotFound if cwd.is_some_and(|dir| !dir.is_dir()) => Self::InvalidCwd,
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Unknown,
        }
    }
}

/// A classified spawn failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: SpawnErrorKind,
    pub category: ErrorCategory,
    pub message: String,
}

/// Classify the error returned while spawning `command` in `cwd`.
#[must_use]
pub fn classify(err: &io::Error, command: &str, cwd: Option<&Path>) -> Classified {
    let kind = SpawnErrorKind::from_io(err, cwd);
    let message = match kind {
        SpawnErrorKind::NotFound => format!(
            "Command not found: `{command}`. Check if it's installed and in PATH."
        ),
        SpawnErrorKind::PermissionDenied => format!(
            "Permission denied executing `{command}`. Check file permissions."
        ),
        SpawnErrorKind::InvalidCwd => format!(
            "Working directory `{}` is not a directory.",
            cwd.map_or_else(|| ".".to_owned(), |dir| dir.display().to_string())
        ),
        SpawnErrorKind::TooManyFiles => "Too many open files. System limit reached.".to_owned(),
        SpawnErrorKind::Unknown => {
            let code = err
                .raw_os_error()
                .map_or_else(|| "unknown code".to_owned(), |code| format!("os error {code}"));
            format!("Process error: {} ({code})", describe(err))
        }
    };

    Classified {
        kind,
        category: kind.category(),
        message,
    }
}

/// The error text without std's trailing "(os error N)".
fn describe(err: &io::Error) -> String {
    let text = err.to_string();
    match text.rfind(" (os error ") {
        Some(idx) if err.raw_os_error().is_some() => text[..idx].to_owned(),
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        let err = io::Error::from(io::ErrorKind::NotFound);
        let classified = classify(&err, "definitely-missing", None);
        assert_eq!(classified.kind, SpawnErrorKind::NotFound);
        assert_eq!(classified.category.to_string(), "not-found");
        assert_eq!(
            classified.message,
            "Command not found: `definitely-missing`. Check if it's installed and in PATH."
        );
    }

    #[test]
    fn test_missing_cwd_is_config_error() {
        let err = io::Error::from(io::ErrorKind::NotFound);
        let cwd = Path::new("/definitely/not/a/dir");
        let classified = classify(&err, "ls", Some(cwd));
        assert_eq!(classified.kind, SpawnErrorKind::InvalidCwd);
        assert_eq!(classified.category, ErrorCategory::Config);
        assert_eq!(
            classified.message,
            "Working directory `/definitely/not/a/dir` is not a directory."
        );
    }

    #[test]
    fn test_permission_denied() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        let classified = classify(&err, "./script.sh", None);
        assert_eq!(classified.category, ErrorCategory::Permission);
        assert_eq!(
            classified.message,
            "Permission denied executing `./script.sh`. Check file permissions."
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_os_codes() {
        let classified = classify(&io::Error::from_raw_os_error(libc::EMFILE), "x", None);
        assert_eq!(classified.category, ErrorCategory::Resource);
        assert_eq!(
            classified.message,
            "Too many open files. System limit reached."
        );

        let classified = classify(
            &io::Error::from_raw_os_error(libc::ENOTDIR),
            "x",
            Some(Path::new("/etc/hosts")),
        );
        assert_eq!(classified.kind, SpawnErrorKind::InvalidCwd);
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_keeps_code() {
        let classified = classify(&io::Error::from_raw_os_error(libc::EIO), "x", None);
        assert_eq!(classified.category, ErrorCategory::Unknown);
        assert!(classified.message.starts_with("Process error: "));
        assert!(classified
            .message
            .ends_with(&format!("(os error {})", libc::EIO)));
        assert_eq!(classified.message.matches("os error").count(), 1);
    }

    #[test]
    fn test_unknown_without_code() {
        let err = io::Error::other("pipe setup failed");
        let classified = classify(&err, "x", None);
        assert_eq!(
            classified.message,
            "Process error: pipe setup failed (unknown code)"
        );
    }
}
