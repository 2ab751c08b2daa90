mod main;
mod output;
mod record;

pub use main::{
    RestartOutcome, Supervisor, FORCE_KILL_TIMEOUT, GRACEFUL_STOP_TIMEOUT, RESTART_LOG_TAIL,
};
pub use record::ExitOutcome;
