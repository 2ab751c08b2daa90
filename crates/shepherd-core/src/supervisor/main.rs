use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;
use shepherd_types::{ProcessConfig, ProcessInfo, Status, DEFAULT_MAX_LOG_ENTRIES};
use tokio::sync::watch;

use crate::{
    classify::classify,
    error::{Error, Result},
    log_buffer::LogStream,
    process_manager::{CommandSpec, ProcessManager, Signal, Spawned},
    sink::{LogFanout, LogLevel, LogRecord, LogSink},
    supervisor::{
        output::{follow_output, watch_exit},
        record::{ExitOutcome, ManagedProcess, ProcessHandle},
    },
};

/// Grace period between `SIGTERM` and `SIGKILL`.
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to wait for the exit after `SIGKILL` before giving up.
pub const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(1);
/// Number of entries returned by [`Supervisor::restart`].
pub const RESTART_LOG_TAIL: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Graceful,
    ForceKilled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Graceful => "graceful shutdown",
            Self::ForceKilled => "force killed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartOutcome {
    /// Whether the process was still running after its startup delay.
    pub success: bool,
    pub logs: Vec<String>,
}

/// Owns one managed process per registered name.
pub struct Supervisor<P: ProcessManager> {
    processes: BTreeMap<String, Arc<ManagedProcess>>,
    process_manager: P,
    sinks: LogFanout,
}

impl<P: ProcessManager> fmt::Debug for Supervisor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("processes", &self.processes.keys().collect::<Vec<_>>())
            .field("sinks", &self.sinks)
            .finish_non_exhaustive()
    }
}

impl<P: ProcessManager> Supervisor<P> {
    pub fn new(process_manager: P, processes: BTreeMap<String, ProcessConfig>) -> Self {
        Self::with_log_capacity(process_manager, processes, DEFAULT_MAX_LOG_ENTRIES)
    }

    pub fn with_log_capacity(
        process_manager: P,
        processes: BTreeMap<String, ProcessConfig>,
        max_log_entries: usize,
    ) -> Self {
        tracing::info!(
            "Supervisor initialized with {} process(es): {:?}",
            processes.len(),
            processes.keys().collect::<Vec<_>>()
        );

        let processes = processes
            .into_iter()
            .map(|(name, config)| {
                let record = ManagedProcess::new(name.clone(), config, max_log_entries);
                (name, Arc::new(record))
            })
            .collect();

        Self {
            processes,
            process_manager,
            sinks: LogFanout::new(),
        }
    }

    /// Forward captured lines and lifecycle events to `sink`.
    pub fn add_sink(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.subscribe(sink);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.processes.contains_key(name)
    }

    fn get(&self, name: &str) -> Result<&Arc<ManagedProcess>> {
        self.processes
            .get(name)
            .ok_or_else(|| Error::ProcessNotFound(name.to_owned()))
    }

    /// Start `name` unless it is already starting or running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessNotFound`] for unknown names and a classified
    /// [`Error::Spawn`] if the OS refuses to launch the command.
    pub async fn start(&self, name: &str) -> Result<()> {
        let process = self.get(name)?;
        let _guard = process.op_lock.lock().await;
        self.start_locked(process, false).await
    }

    /// Stop `name`, escalating to `SIGKILL` when it ignores `SIGTERM`.
    ///
    /// Always leaves the process `stopped`; signal delivery problems are
    /// logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessNotFound`] for unknown names.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let process = self.get(name)?;
        let _guard = process.op_lock.lock().await;
        self.stop_locked(process).await;
        Ok(())
    }

    /// Stop, clear the log buffer, start and report the state after the
    /// configured startup delay.
    ///
    /// Restarts of the same name are serialized; the startup delay is waited
    /// out without holding the per-name lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessNotFound`] for unknown names and the spawn
    /// error if the new process cannot be launched.
    pub async fn restart(&self, name: &str) -> Result<RestartOutcome> {
        let process = self.get(name)?;
        tracing::info!("Restarting {name}");

        {
            let _guard = process.op_lock.lock().await;
            self.stop_locked(process).await;
            self.start_locked(process, true).await?;
        }

        tokio::time::sleep(process.config.effective_startup_delay()).await;

        let state = process.state.lock();
        Ok(RestartOutcome {
            success: state.status == Status::Running,
            logs: state.logs.get_lines(Some(RESTART_LOG_TAIL)),
        })
    }

    /// Stop every registered process concurrently.
    pub async fn stop_all(&self) {
        tracing::info!("Stopping all processes");

        futures::future::join_all(
            self.processes
                .values()
                .map(|process| async move {
                    let _guard = process.op_lock.lock().await;
                    self.stop_locked(process).await;
                }),
        )
        .await;
    }

    /// Buffered log entries of `name`, all of them or the last `count`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessNotFound`] for unknown names.
    pub fn get_logs(&self, name: &str, count: Option<usize>) -> Result<Vec<String>> {
        Ok(self.get(name)?.state.lock().logs.get_lines(count))
    }

    /// # Errors
    ///
    /// Returns [`Error::ProcessNotFound`] for unknown names.
    pub fn get_process(&self, name: &str) -> Result<ProcessInfo> {
        Ok(self.get(name)?.snapshot())
    }

    #[must_use]
    pub fn list_processes(&self) -> Vec<ProcessInfo> {
        self.processes.values().map(|p| p.snapshot()).collect()
    }

    /// `SIGKILL` every live process group right now, without waiting.
    ///
    /// Meant for the host's own termination path; also runs on drop.
    pub fn kill_all_now(&self) {
        for process in self.processes.values() {
            let Some(pid) = process.state.lock().pid() else {
                continue;
            };

            match self.process_manager.signal(pid, Signal::Kill) {
                Ok(target) => {
                    tracing::warn!("Emergency kill of {}: SIGKILL sent to {target}", process.name);
                }
                Err(err) => {
                    tracing::debug!("Emergency kill of {} (pid {pid}) failed: {err}", process.name);
                }
            }
        }
    }

    async fn start_locked(&self, process: &Arc<ManagedProcess>, clear_logs: bool) -> Result<()> {
        let generation = {
            let mut state = process.state.lock();
            if clear_logs {
                state.logs.clear();
            }
            if state.status.is_active() {
                tracing::debug!("{} is already {}, ignoring start", process.name, state.status);
                return Ok(());
            }
            state.status = Status::Starting;
            state.last_error = None;
            state.generation += 1;
            state.generation
        };

        tracing::debug!(
            "Starting {} (`{}`)",
            process.name,
            process.config.display_command()
        );

        let spec = CommandSpec::from_config(&process.name, &process.config);
        match self.process_manager.spawn(&spec).await {
            Ok(spawned) => {
                self.on_spawned(process, generation, spawned);
                Ok(())
            }
            Err(err) => Err(self.on_spawn_error(process, err)),
        }
    }

    fn on_spawned(&self, process: &Arc<ManagedProcess>, generation: u64, spawned: Spawned) {
        let Spawned {
            pid,
            child,
            stdout,
            stderr,
        } = spawned;
        let (exit_tx, exit_rx) = watch::channel(None);
        let message = format!("Process started with PID {pid}");

        {
            let mut state = process.state.lock();
            state.handle = Some(ProcessHandle {
                generation,
                pid,
                exit_rx,
            });
            state.start_time = Some(Utc::now());
            state.status = Status::Running;
            state.logs.add(LogStream::System, &message);
        }

        tracing::info!("{}: {message}", process.name);
        self.sinks.emit(
            LogRecord::new(&process.name, LogLevel::Info, message).with_metadata(
                serde_json::json!({
                    "pid": pid,
                    "command": process.config.display_command(),
                }),
            ),
        );

        let readers = vec![
            tokio::spawn(follow_output(
                process.clone(),
                generation,
                LogStream::Stdout,
                stdout,
                self.sinks.clone(),
            )),
            tokio::spawn(follow_output(
                process.clone(),
                generation,
                LogStream::Stderr,
                stderr,
                self.sinks.clone(),
            )),
        ];

        tokio::spawn(watch_exit(
            process.clone(),
            generation,
            child,
            readers,
            exit_tx,
            self.sinks.clone(),
        ));
    }

    fn on_spawn_error(&self, process: &ManagedProcess, err: std::io::Error) -> Error {
        let classified = classify(&err, &process.config.command, process.config.cwd.as_deref());

        {
            let mut state = process.state.lock();
            state.status = Status::Error;
            state.handle = None;
            state.last_error = Some(classified.message.clone());
            state.logs.add(LogStream::Error, &classified.message);
        }

        tracing::error!(
            "Failed to start {} ({}): {err}",
            process.name,
            classified.category
        );
        self.sinks.emit(
            LogRecord::new(&process.name, LogLevel::Error, classified.message.clone())
                .with_metadata(serde_json::json!({
                    "category": classified.category.to_string(),
                    "command": process.config.display_command(),
                })),
        );

        Error::Spawn {
            name: process.name.clone(),
            kind: classified.kind,
            category: classified.category,
            message: classified.message,
            source: err,
        }
    }

    async fn stop_locked(&self, process: &ManagedProcess) {
        let Some((generation, pid, mut exit_rx)) = process
            .state
            .lock()
            .handle
            .as_ref()
            .map(|handle| (handle.generation, handle.pid, handle.exit_rx.clone()))
        else {
            tracing::debug!("{} has no live process, nothing to stop", process.name);
            return;
        };

        tracing::info!("Stopping {} (pid {pid})", process.name);
        self.send_signal(process, pid, Signal::Terminate);

        let reason = if tokio::time::timeout(GRACEFUL_STOP_TIMEOUT, wait_for_exit(&mut exit_rx))
            .await
            .is_ok()
        {
            StopReason::Graceful
        } else {
            let warning = format!(
                "Process did not exit within {}s, sending SIGKILL",
                GRACEFUL_STOP_TIMEOUT.as_secs()
            );
            tracing::warn!("{}: {warning}", process.name);
            process.log(LogStream::System, &warning);
            self.sinks
                .emit(LogRecord::new(&process.name, LogLevel::Warn, warning));

            self.send_signal(process, pid, Signal::Kill);
            if tokio::time::timeout(FORCE_KILL_TIMEOUT, wait_for_exit(&mut exit_rx))
                .await
                .is_err()
            {
                tracing::warn!("{}: exit not confirmed after SIGKILL", process.name);
            }
            StopReason::ForceKilled
        };

        self.cleanup(process, generation, reason);
    }

    /// Final transition of a stop. The exit monitor may have released the
    /// handle already; either way the record ends up stopped exactly once.
    fn cleanup(&self, process: &ManagedProcess, generation: u64, reason: StopReason) {
        let message = format!("Process stopped ({reason})");

        {
            let mut state = process.state.lock();
            state.release(generation);
            state.status = Status::Stopped;
            state.logs.add(LogStream::System, &message);
        }

        tracing::info!("{}: {message}", process.name);
        let level = match reason {
            StopReason::Graceful => LogLevel::Info,
            StopReason::ForceKilled => LogLevel::Warn,
        };
        self.sinks
            .emit(LogRecord::new(&process.name, level, message));
    }

    fn send_signal(&self, process: &ManagedProcess, pid: u32, signal: Signal) {
        match self.process_manager.signal(pid, signal) {
            Ok(target) => {
                let message = format!("Sent {} to {target}", signal.name());
                tracing::debug!("{}: {message}", process.name);
                process.log(LogStream::System, &message);
                self.sinks
                    .emit(LogRecord::new(&process.name, LogLevel::Debug, message));
            }
            Err(err) => {
                let message = format!("Failed to send {} to pid {pid}: {err}", signal.name());
                tracing::warn!("{}: {message}", process.name);
                process.log(LogStream::Error, &message);
                self.sinks
                    .emit(LogRecord::new(&process.name, LogLevel::Warn, message));
            }
        }
    }
}

impl<P: ProcessManager> Drop for Supervisor<P> {
    fn drop(&mut self) {
        self.kill_all_now();
    }
}

async fn wait_for_exit(exit_rx: &mut watch::Receiver<Option<ExitOutcome>>) {
    while exit_rx.borrow_and_update().is_none() {
        // A closed channel means the monitor is gone, which only happens after exit.
        if exit_rx.changed().await.is_err() {
            return;
        }
    }
}
