use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use shepherd_core::{
    sink::{ChannelLogSink, HttpLogSink},
    Supervisor, UnixProcessManager,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal::{
        self,
        unix::{signal as unix_signal, SignalKind},
    },
    sync::mpsc,
};

use crate::{
    console::{self, ConsoleCommand},
    logger::Logger,
};

const RECORD_QUEUE_SIZE: usize = 4096;

type Shared = Arc<Supervisor<UnixProcessManager>>;

pub async fn run(file: Option<PathBuf>, mut processes: Vec<String>) -> Result<()> {
    let (path, config) = super::load(file)?;
    tracing::debug!("Loaded {}", path.display());

    if let Some(unknown) = processes
        .iter()
        .find(|name| !config.processes.contains_key(name.as_str()))
    {
        bail!("Unknown process `{unknown}` in {}", path.display());
    }
    if processes.is_empty() {
        processes = config.processes.keys().cloned().collect();
    }

    let mut supervisor = Supervisor::with_log_capacity(
        UnixProcessManager::new(),
        config.processes,
        config.settings.max_log_entries,
    );

    let (console_sink, mut records) = ChannelLogSink::new(RECORD_QUEUE_SIZE);
    supervisor.add_sink(Arc::new(console_sink));

    if let Some(sink) = &config.log_sink {
        match HttpLogSink::new(sink.url.clone(), sink.timeout) {
            Ok(http) => supervisor.add_sink(Arc::new(http)),
            Err(err) => tracing::warn!("Log sink {} disabled: {err}", sink.url),
        }
    }

    let supervisor: Shared = Arc::new(supervisor);
    let mut logger = Logger::default();

    let mut terminate = unix_signal(SignalKind::terminate())?;
    let mut hangup = unix_signal(SignalKind::hangup())?;

    for name in &processes {
        if let Err(err) = supervisor.start(name).await {
            tracing::debug!("{err}");
        }
    }
    logger.system("Type `help` for console commands, Ctrl+C to stop");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let (done_tx, mut done_rx) = mpsc::channel::<()>(1);
    let mut shutting_down = false;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                if shutting_down {
                    logger.error("Second Ctrl+C: killing all processes");
                    supervisor.kill_all_now();
                    return Ok(());
                }
                shutting_down = true;
                logger.system("Ctrl+C: stopping all processes (press again to kill)");
                begin_shutdown(&supervisor, done_tx.clone());
            }

            _ = terminate.recv() => {
                logger.error("SIGTERM: killing all processes");
                supervisor.kill_all_now();
                return Ok(());
            }

            _ = hangup.recv() => {
                logger.error("SIGHUP: killing all processes");
                supervisor.kill_all_now();
                return Ok(());
            }

            Some(()) = done_rx.recv() => {
                while let Ok(record) = records.try_recv() {
                    logger.record(&record);
                }
                logger.system("All processes stopped");
                return Ok(());
            }

            Some(record) = records.recv() => {
                logger.record(&record);
            }

            line = stdin.next_line(), if stdin_open && !shutting_down => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        tracing::debug!("stdin closed, console disabled");
                        stdin_open = false;
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!("Failed to read stdin: {err}");
                        stdin_open = false;
                        continue;
                    }
                };

                match console::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => {
                        shutting_down = true;
                        logger.system("Stopping all processes");
                        begin_shutdown(&supervisor, done_tx.clone());
                    }
                    Ok(Some(command)) => {
                        tokio::spawn(execute(supervisor.clone(), command));
                    }
                    Err(message) => logger.error(&message),
                }
            }
        }
    }
}

fn begin_shutdown(supervisor: &Shared, done: mpsc::Sender<()>) {
    let supervisor = supervisor.clone();
    tokio::spawn(async move {
        supervisor.stop_all().await;
        if let Err(err) = done.send(()).await {
            tracing::debug!("Shutdown finished after the console loop exited: {err}");
        }
    });
}

async fn execute(supervisor: Shared, command: ConsoleCommand) {
    let mut logger = Logger::default();

    match command {
        ConsoleCommand::Start(name) => match supervisor.start(&name).await {
            Ok(()) => {
                if let Ok(info) = supervisor.get_process(&name) {
                    logger.system(&format!("{name} is {}", info.status));
                }
            }
            Err(err) => logger.error(&err.to_string()),
        },
        ConsoleCommand::Stop(name) => match supervisor.stop(&name).await {
            Ok(()) => logger.system(&format!("{name} stopped")),
            Err(err) => logger.error(&err.to_string()),
        },
        ConsoleCommand::Restart(name) => match supervisor.restart(&name).await {
            Ok(outcome) => {
                if outcome.success {
                    logger.system(&format!("{name} restarted"));
                } else {
                    logger.error(&format!("{name} is not running after restart"));
                }
                for line in &outcome.logs {
                    logger.log(&name, line);
                }
            }
            Err(err) => logger.error(&err.to_string()),
        },
        ConsoleCommand::Logs { name, count } => match supervisor.get_logs(&name, count) {
            Ok(lines) if lines.is_empty() => logger.system(&format!("{name} has no output yet")),
            Ok(lines) => {
                for line in &lines {
                    logger.log(&name, line);
                }
            }
            Err(err) => logger.error(&err.to_string()),
        },
        ConsoleCommand::List => logger.processes(&supervisor.list_processes()),
        ConsoleCommand::StopAll => {
            supervisor.stop_all().await;
            logger.system("All processes stopped");
        }
        ConsoleCommand::Help => logger.system(console::HELP),
        ConsoleCommand::Quit => {}
    }
}
