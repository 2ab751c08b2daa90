use futures::StreamExt;
use libc::{kill, killpg, setsid, ESRCH, SIGKILL, SIGTERM};
use tokio::{io::BufReader, process::Command};
use tokio_util::io::ReaderStream;

use crate::process_manager::{
    base::ProcessManager,
    types::{CommandSpec, Signal, SignalTarget, Spawned},
};

/// Unix-specific process manager.
///
/// Every child runs in a fresh session, so its pid doubles as the process
/// group id that termination signals are sent to.
#[derive(Debug, Default)]
pub struct UnixProcessManager;

impl UnixProcessManager {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn raw_signal(signal: Signal) -> libc::c_int {
    match signal {
        Signal::Terminate => SIGTERM,
        Signal::Kill => SIGKILL,
    }
}

#[async_trait::async_trait]
impl ProcessManager for UnixProcessManager {
    async fn spawn(&self, spec: &CommandSpec) -> std::io::Result<Spawned> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(&spec.env);

        #[allow(unsafe_code)]
        unsafe {
            cmd.pre_exec(|| {
                if setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn()?;

        let pid = child
            .id()
            .ok_or_else(|| std::io::Error::other("spawned process has no pid"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr not piped"))?;

        let out_stream = ReaderStream::new(BufReader::new(stdout))
            .filter_map(|res| async move { res.ok().map(|b| b.to_vec()) });
        let err_stream = ReaderStream::new(BufReader::new(stderr))
            .filter_map(|res| async move { res.ok().map(|b| b.to_vec()) });

        tracing::debug!("Spawned `{}` for {} with pid {pid}", spec.program, spec.name);

        Ok(Spawned {
            pid,
            child,
            stdout: Box::pin(out_stream),
            stderr: Box::pin(err_stream),
        })
    }

    fn signal(&self, pid: u32, signal: Signal) -> std::io::Result<SignalTarget> {
        let pid_t = libc::pid_t::try_from(pid)
            .map_err(|_| std::io::Error::other(format!("pid {pid} out of range")))?;
        let sig = raw_signal(signal);

        #[allow(unsafe_code)]
        let rc = unsafe { killpg(pid_t, sig) };
        if rc == 0 {
            return Ok(SignalTarget::Group(pid));
        }

        let group_err = std::io::Error::last_os_error();
        if group_err.raw_os_error() == Some(ESRCH) {
            return Err(group_err);
        }

        tracing::warn!(
            "Cannot signal process group {pid} ({group_err}), signaling the process only"
        );

        #[allow(unsafe_code)]
        let rc = unsafe { kill(pid_t, sig) };
        if rc == -1 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(SignalTarget::Process(pid))
    }
}
