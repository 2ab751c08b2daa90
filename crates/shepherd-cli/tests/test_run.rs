#![cfg(target_os = "linux")]

use std::{
    process::Stdio,
    time::{Duration, Instant},
};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
};

/// Whether `pid` is gone or only a zombie waiting to be reaped.
fn is_dead(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(") ")
            .is_some_and(|(_, rest)| rest.starts_with('Z')),
        Err(_) => true,
    }
}

async fn host_signal_kills_children(signal: libc::c_int) {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("shepherd.toml");
    std::fs::write(
        &config,
        r#"
[processes.server]
command = "sh"
args = ["-c", "echo listening; exec sleep 300"]
"#,
    )
    .unwrap();

    let mut host = Command::new(env!("CARGO_BIN_EXE_shepherd"))
        .arg("run")
        .arg("-f")
        .arg(&config)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let mut stdout = BufReader::new(host.stdout.take().unwrap()).lines();
    let child_pid = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = stdout.next_line().await.unwrap() {
            if let Some((_, pid)) = line.rsplit_once("Process started with PID ") {
                return pid.trim().parse::<u32>().unwrap();
            }
        }
        panic!("host exited before starting the process");
    })
    .await
    .unwrap();
    assert!(!is_dead(child_pid));

    let host_pid = libc::pid_t::try_from(host.id().unwrap()).unwrap();
    #[allow(unsafe_code)]
    let rc = unsafe { libc::kill(host_pid, signal) };
    assert_eq!(rc, 0);

    tokio::time::timeout(Duration::from_secs(5), host.wait())
        .await
        .unwrap()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while !is_dead(child_pid) {
        assert!(Instant::now() < deadline, "child {child_pid} outlived the host");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_sigterm_kills_supervised_processes() {
    host_signal_kills_children(libc::SIGTERM).await;
}

#[tokio::test]
async fn test_sighup_kills_supervised_processes() {
    host_signal_kills_children(libc::SIGHUP).await;
}
