use std::{collections::HashMap, fmt::Debug, path::PathBuf, pin::Pin};

use futures::Stream;
use shepherd_types::ProcessConfig;
use tokio::process::Child;

pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

#[derive(Clone, Debug)]
pub struct CommandSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

impl CommandSpec {
    #[must_use]
    pub fn from_config(name: &str, config: &ProcessConfig) -> Self {
        Self {
            name: name.to_owned(),
            program: config.command.clone(),
            args: config.args.clone(),
            cwd: config.cwd.clone(),
            env: config.env.clone().unwrap_or_default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Signal {
    /// Polite request to exit (`SIGTERM`).
    Terminate,
    /// Non-ignorable kill (`SIGKILL`).
    Kill,
}

impl Signal {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Terminate => "SIGTERM",
            Self::Kill => "SIGKILL",
        }
    }
}

/// What a signal was actually delivered to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SignalTarget {
    Group(u32),
    Process(u32),
}

impl std::fmt::Display for SignalTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group(pgid) => write!(f, "process group {pgid}"),
            Self::Process(pid) => write!(f, "process {pid}"),
        }
    }
}

pub struct Spawned {
    pub pid: u32,
    pub child: Child,
    pub stdout: BoxStream<Vec<u8>>,
    pub stderr: BoxStream<Vec<u8>>,
}

impl Debug for Spawned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spawned")
            .field("pid", &self.pid)
            .field("stdout", &"<stream>")
            .field("stderr", &"<stream>")
            .finish_non_exhaustive()
    }
}
