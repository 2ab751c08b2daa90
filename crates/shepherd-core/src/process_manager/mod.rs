mod base;
mod implementations;
mod types;

pub use base::ProcessManager;
#[cfg(unix)]
pub use implementations::UnixProcessManager;
pub use types::{BoxStream, CommandSpec, Signal, SignalTarget, Spawned};
