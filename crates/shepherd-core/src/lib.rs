pub mod classify;
mod error;
pub mod log_buffer;
mod process_manager;
pub mod sink;
mod supervisor;

pub use error::{Error, Result};
pub use log_buffer::{LogBuffer, LogStream};
#[cfg(unix)]
pub use process_manager::UnixProcessManager;
pub use process_manager::{BoxStream, CommandSpec, ProcessManager, Signal, SignalTarget, Spawned};
pub use shepherd_types::{ProcessConfig, ProcessInfo, Status};
pub use supervisor::{
    ExitOutcome, RestartOutcome, Supervisor, FORCE_KILL_TIMEOUT, GRACEFUL_STOP_TIMEOUT,
    RESTART_LOG_TAIL,
};
