#![cfg(unix)]

use std::{collections::HashMap, time::Duration};

use futures::StreamExt;
use shepherd_core::{BoxStream, CommandSpec, ProcessManager, Signal, SignalTarget, UnixProcessManager};

fn sh(name: &str, script: &str) -> CommandSpec {
    CommandSpec {
        name: name.to_owned(),
        program: "sh".to_owned(),
        args: vec!["-c".to_owned(), script.to_owned()],
        cwd: None,
        env: HashMap::new(),
    }
}

async fn collect(mut stream: BoxStream<Vec<u8>>) -> String {
    let mut output = String::new();
    while let Some(chunk) = stream.next().await {
        output.push_str(&String::from_utf8_lossy(&chunk));
    }
    output
}

#[tokio::test]
async fn test_process_manager_stdout_and_stderr() {
    let pm = UnixProcessManager::new();

    let spawned = pm
        .spawn(&sh(
            "both",
            "echo 'STDOUT: one'; echo 'STDERR: two' >&2; echo 'STDOUT: three'",
        ))
        .await
        .unwrap();

    assert!(spawned.pid > 0);
    let stdout = collect(spawned.stdout).await;
    let stderr = collect(spawned.stderr).await;
    assert_eq!(stdout, "STDOUT: one\nSTDOUT: three\n");
    assert_eq!(stderr, "STDERR: two\n");

    let mut child = spawned.child;
    assert_eq!(child.wait().await.unwrap().code(), Some(0));
}

#[tokio::test]
async fn test_process_manager_env_and_cwd() {
    let pm = UnixProcessManager::new();
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().canonicalize().unwrap();

    let mut spec = sh("env", "echo \"$SHEPHERD_GREETING\"; pwd -P");
    spec.env.insert("SHEPHERD_GREETING".to_owned(), "hello".to_owned());
    spec.cwd = Some(dir.clone());

    let spawned = pm.spawn(&spec).await.unwrap();
    let stdout = collect(spawned.stdout).await;
    assert_eq!(stdout, format!("hello\n{}\n", dir.display()));
}

#[tokio::test]
async fn test_process_manager_missing_command() {
    let pm = UnixProcessManager::new();
    let mut spec = sh("missing", "");
    spec.program = "shepherd-definitely-missing-binary".to_owned();
    spec.args.clear();

    let err = pm.spawn(&spec).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[tokio::test]
async fn test_process_manager_sigterm() {
    let pm = UnixProcessManager::new();

    let spawned = pm
        .spawn(&sh("infinite", "while true; do sleep 1; done"))
        .await
        .unwrap();

    let target = pm.signal(spawned.pid, Signal::Terminate).unwrap();
    assert_eq!(target, SignalTarget::Group(spawned.pid));

    let mut child = spawned.child;
    let status = tokio::time::timeout(Duration::from_secs(2), child.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(!status.success());
}

#[tokio::test]
async fn test_process_manager_sigkill() {
    let pm = UnixProcessManager::new();

    let spawned = pm
        .spawn(&sh(
            "ignore_sigterm",
            "trap '' TERM; echo ready; while true; do sleep 1; done",
        ))
        .await
        .unwrap();

    let mut stdout = spawned.stdout;
    let first = stdout.next().await.unwrap();
    assert_eq!(String::from_utf8_lossy(&first), "ready\n");

    let mut child = spawned.child;
    pm.signal(spawned.pid, Signal::Terminate).unwrap();
    let result = tokio::time::timeout(Duration::from_millis(300), child.wait()).await;
    assert!(result.is_err(), "process should ignore SIGTERM");

    pm.signal(spawned.pid, Signal::Kill).unwrap();
    let status = tokio::time::timeout(Duration::from_secs(2), child.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(!status.success());
}

#[tokio::test]
async fn test_process_manager_signal_vanished_process() {
    let pm = UnixProcessManager::new();

    let spawned = pm.spawn(&sh("quick", "exit 0")).await.unwrap();
    let mut child = spawned.child;
    child.wait().await.unwrap();

    assert!(pm.signal(spawned.pid, Signal::Terminate).is_err());
}
