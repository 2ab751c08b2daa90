use crate::process_manager::types::{CommandSpec, Signal, SignalTarget, Spawned};

#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync {
    /// Spawn a new process as the leader of its own process group.
    ///
    /// Returns only once the OS has either started the program or reported
    /// why it could not.
    async fn spawn(&self, spec: &CommandSpec) -> std::io::Result<Spawned>;
    /// Deliver `signal` to the group led by `pid`, or to `pid` alone where
    /// group signaling is unavailable.
    fn signal(&self, pid: u32, signal: Signal) -> std::io::Result<SignalTarget>;
}
