use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use shepherd_types::{ProcessConfig, DEFAULT_MAX_LOG_ENTRIES};

use crate::{
    raw::{RawConfig, RawLogSink, RawProcess},
    ConfigError,
};

const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub settings: Settings,
    pub log_sink: Option<LogSinkConfig>,
    pub processes: BTreeMap<String, ProcessConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub max_log_entries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSinkConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Config {
    /// Anchor relative working directories at `base`.
    #[must_use]
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        for process in self.processes.values_mut() {
            if let Some(cwd) = process.cwd.take() {
                process.cwd = Some(if cwd.is_relative() {
                    base.join(cwd)
                } else {
                    cwd
                });
            }
        }
        self
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        if raw.processes.is_empty() {
            return Err(ConfigError::Validation(
                "no processes are configured".to_owned(),
            ));
        }

        let settings = match raw.settings {
            Some(settings) => {
                let max_log_entries = settings.max_log_entries.unwrap_or(DEFAULT_MAX_LOG_ENTRIES);
                if max_log_entries == 0 {
                    return Err(ConfigError::Validation(
                        "settings: max_log_entries must be greater than zero".to_owned(),
                    ));
                }
                Settings { max_log_entries }
            }
            None => Settings::default(),
        };

        let log_sink = raw.log_sink.map(convert_sink).transpose()?;

        let processes = raw
            .processes
            .into_iter()
            .map(|(name, raw_process)| {
                let process = convert_process(&name, raw_process)?;
                Ok((name, process))
            })
            .collect::<Result<BTreeMap<String, ProcessConfig>, Self::Error>>()?;

        Ok(Config {
            settings,
            log_sink,
            processes,
        })
    }
}

fn convert_sink(raw: RawLogSink) -> Result<LogSinkConfig, ConfigError> {
    if raw.url.trim().is_empty() {
        return Err(ConfigError::Validation("log_sink: url is empty".to_owned()));
    }

    Ok(LogSinkConfig {
        url: raw.url,
        timeout: raw
            .timeout_ms
            .map_or(DEFAULT_SINK_TIMEOUT, Duration::from_millis),
    })
}

fn convert_process(name: &str, raw: RawProcess) -> Result<ProcessConfig, ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "process name must not be empty".to_owned(),
        ));
    }
    if raw.command.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "process `{name}`: command is empty"
        )));
    }
    if raw.args.iter().any(|arg| arg.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "process `{name}`: args contains empty element"
        )));
    }

    Ok(ProcessConfig {
        command: raw.command,
        args: raw.args,
        cwd: raw.cwd.map(PathBuf::from),
        env: raw.env,
        startup_delay: raw.startup_delay.map(Duration::from_millis),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn raw_process(command: &str, args: &[&str]) -> RawProcess {
        RawProcess {
            command: command.to_owned(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            cwd: None,
            env: None,
            startup_delay: None,
        }
    }

    #[test]
    fn test_raw_to_config_success() {
        let raw = {
            let mut processes = BTreeMap::new();
            processes.insert(
                "full".to_owned(),
                RawProcess {
                    command: "node".to_owned(),
                    args: vec!["server.js".to_owned()],
                    cwd: Some("/srv/app".to_owned()),
                    env: Some(HashMap::from_iter(vec![(
                        "PORT".to_owned(),
                        "3000".to_owned(),
                    )])),
                    startup_delay: Some(500),
                },
            );
            processes.insert("bare".to_owned(), raw_process("true", &[]));
            RawConfig {
                settings: None,
                log_sink: None,
                processes,
            }
        };

        let config = Config::try_from(raw).unwrap();
        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.log_sink, None);

        let full = &config.processes["full"];
        assert_eq!(full.command, "node");
        assert_eq!(full.args, vec!["server.js"]);
        assert_eq!(full.cwd, Some(PathBuf::from("/srv/app")));
        assert_eq!(
            full.env.as_ref().and_then(|env| env.get("PORT")),
            Some(&"3000".to_owned())
        );
        assert_eq!(full.startup_delay, Some(Duration::from_millis(500)));

        let bare = &config.processes["bare"];
        assert!(bare.args.is_empty());
        assert_eq!(bare.startup_delay, None);
    }

    #[test]
    fn test_empty_command() {
        {
            let raw = RawConfig {
                settings: None,
                log_sink: None,
                processes: BTreeMap::from([("test".to_owned(), raw_process("  ", &[]))]),
            };
            assert!(Config::try_from(raw).is_err());
        }
        {
            let raw = RawConfig {
                settings: None,
                log_sink: None,
                processes: BTreeMap::from([("test".to_owned(), raw_process("echo", &[""]))]),
            };
            assert!(Config::try_from(raw).is_err());
        }
    }

    #[test]
    fn test_no_processes() {
        let raw = RawConfig {
            settings: None,
            log_sink: None,
            processes: BTreeMap::new(),
        };
        assert!(Config::try_from(raw).is_err());
    }

    #[test]
    fn test_relative_cwd_is_anchored() {
        let mut processes = BTreeMap::new();
        let mut relative = raw_process("make", &[]);
        relative.cwd = Some("web".to_owned());
        let mut absolute = raw_process("make", &[]);
        absolute.cwd = Some("/opt/api".to_owned());
        processes.insert("relative".to_owned(), relative);
        processes.insert("absolute".to_owned(), absolute);

        let config = Config::try_from(RawConfig {
            settings: None,
            log_sink: None,
            processes,
        })
        .unwrap()
        .with_base_dir(Path::new("/home/dev/project"));

        assert_eq!(
            config.processes["relative"].cwd,
            Some(PathBuf::from("/home/dev/project/web"))
        );
        assert_eq!(
            config.processes["absolute"].cwd,
            Some(PathBuf::from("/opt/api"))
        );
    }
}
