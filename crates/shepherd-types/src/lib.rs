use std::{collections::HashMap, fmt, path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 10_000;

/// Launch parameters for one supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
    pub startup_delay: Option<Duration>,
}

impl ProcessConfig {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: None,
            startup_delay: None,
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = Some(delay);
        self
    }

    /// Delay `restart` waits before sampling the status.
    #[must_use]
    pub fn effective_startup_delay(&self) -> Duration {
        self.startup_delay.unwrap_or(DEFAULT_STARTUP_DELAY)
    }

    /// Command line as a single display string.
    #[must_use]
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Stopped,
    Starting,
    Running,
    Error,
}

impl Status {
    /// `start` is a no-op in these states.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Error => "error",
        })
    }
}

/// Read-only snapshot of a managed process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_startup_delay() {
        let config = ProcessConfig::new("sleep");
        assert_eq!(config.effective_startup_delay(), Duration::from_millis(3000));

        let config = config.startup_delay(Duration::from_millis(250));
        assert_eq!(config.effective_startup_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_display_command() {
        let config = ProcessConfig::new("npm").args(["run", "dev"]);
        assert_eq!(config.display_command(), "npm run dev");
    }

    #[test]
    fn test_process_info_serialization() {
        let info = ProcessInfo {
            name: "server".to_owned(),
            status: Status::Error,
            pid: None,
            start_time: None,
            last_error: Some("Command not found: `nope`.".to_owned()),
        };

        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["lastError"], "Command not found: `nope`.");
        assert!(value.get("pid").is_none());
    }
}
