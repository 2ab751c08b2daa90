use std::process::ExitStatus;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shepherd_types::{ProcessConfig, ProcessInfo, Status};
use tokio::sync::watch;

use crate::{
    log_buffer::{LogBuffer, LogStream},
    sink::LogLevel,
};

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }

        status.code().map_or(Self::Unknown, Self::Code)
    }
}

impl ExitOutcome {
    #[must_use]
    pub fn describe(self) -> String {
        match self {
            Self::Signal(signal) => format!("Process terminated by signal {}", signal_name(signal)),
            Self::Code(0) => "Process exited successfully (code 0)".to_owned(),
            Self::Code(code) => format!("Process exited with code {code}"),
            Self::Unknown => "Process exited (status unavailable)".to_owned(),
        }
    }

    pub(crate) fn level(self) -> LogLevel {
        match self {
            Self::Code(0) | Self::Signal(_) => LogLevel::Info,
            Self::Code(_) | Self::Unknown => LogLevel::Warn,
        }
    }
}

fn signal_name(signal: i32) -> String {
    match signal {
        1 => "SIGHUP".to_owned(),
        2 => "SIGINT".to_owned(),
        3 => "SIGQUIT".to_owned(),
        6 => "SIGABRT".to_owned(),
        9 => "SIGKILL".to_owned(),
        11 => "SIGSEGV".to_owned(),
        13 => "SIGPIPE".to_owned(),
        15 => "SIGTERM".to_owned(),
        other => format!("{other}"),
    }
}

/// The live OS process behind a record.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
    pub generation: u64,
    pub pid: u32,
    /// Set by the exit monitor once the child has been reaped.
    pub exit_rx: watch::Receiver<Option<ExitOutcome>>,
}

#[derive(Debug)]
pub(crate) struct ProcessState {
    pub status: Status,
    pub handle: Option<ProcessHandle>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub logs: LogBuffer,
    /// Bumped on every start; output and exit events from older spawns are dropped.
    pub generation: u64,
}

impl ProcessState {
    /// Drop the handle if it belongs to `generation` and mark the record stopped.
    ///
    /// Returns whether this call performed the transition, which makes it
    /// safe to race between the exit monitor and the stop escalation.
    pub fn release(&mut self, generation: u64) -> bool {
        if self
            .handle
            .as_ref()
            .is_some_and(|handle| handle.generation == generation)
        {
            self.handle = None;
            self.status = Status::Stopped;
            true
        } else {
            false
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(|handle| handle.pid)
    }
}

#[derive(Debug)]
pub(crate) struct ManagedProcess {
    pub name: String,
    pub config: ProcessConfig,
    pub state: Mutex<ProcessState>,
    /// Serializes start/stop/restart for this name.
    pub op_lock: tokio::sync::Mutex<()>,
}

impl ManagedProcess {
    pub fn new(name: String, config: ProcessConfig, max_log_entries: usize) -> Self {
        Self {
            name,
            config,
            state: Mutex::new(ProcessState {
                status: Status::Stopped,
                handle: None,
                start_time: None,
                last_error: None,
                logs: LogBuffer::new(max_log_entries),
                generation: 0,
            }),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn log(&self, stream: LogStream, message: &str) {
        self.state.lock().logs.add(stream, message);
    }

    pub fn snapshot(&self) -> ProcessInfo {
        let state = self.state.lock();
        ProcessInfo {
            name: self.name.clone(),
            status: state.status,
            pid: state.pid(),
            start_time: state.start_time,
            last_error: state.last_error.clone(),
        }
    }
}
