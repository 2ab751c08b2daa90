use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{process::Child, sync::watch, task::JoinHandle};

use crate::{
    log_buffer::{LogStream, MAX_LINE_LENGTH},
    process_manager::BoxStream,
    sink::{LogFanout, LogLevel, LogRecord, LogSink},
    supervisor::record::{ExitOutcome, ManagedProcess},
};

/// How long the exit monitor waits for the output readers to hit EOF.
///
/// A descendant that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Longest run of bytes held back while waiting for a newline. Enough for
/// `MAX_LINE_LENGTH` four-byte characters; anything longer is cut here and
/// the rest of that line is discarded.
const MAX_PENDING_BYTES: usize = MAX_LINE_LENGTH * 4 + 4;

/// Reassembles lines across read chunks.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    pending: Vec<u8>,
    /// Set after an overlong line was flushed; bytes are dropped until `\n`.
    overflowed: bool,
}

impl LineSplitter {
    /// Feed one chunk and return the non-blank lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&byte| byte == b'\n') {
            if self.overflowed {
                self.overflowed = false;
            } else {
                self.pending.extend_from_slice(&rest[..pos]);
                lines.extend(self.take());
            }
            rest = &rest[pos + 1..];
        }

        if !self.overflowed {
            self.pending.extend_from_slice(rest);
            if self.pending.len() > MAX_PENDING_BYTES {
                lines.extend(self.take());
                self.overflowed = true;
            }
        }

        lines
    }

    /// The trailing line of a stream that ended without a newline.
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.overflowed) {
            self.pending.clear();
            return None;
        }
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        let line = String::from_utf8_lossy(&self.pending)
            .trim_end_matches('\r')
            .to_owned();
        self.pending.clear();
        (!line.trim().is_empty()).then_some(line)
    }
}

/// Append every non-empty line of `output` to the record's buffer.
pub(crate) async fn follow_output(
    process: Arc<ManagedProcess>,
    generation: u64,
    stream: LogStream,
    mut output: BoxStream<Vec<u8>>,
    sinks: LogFanout,
) {
    let level = match stream {
        LogStream::Stderr => LogLevel::Warn,
        _ => LogLevel::Info,
    };
    let mut splitter = LineSplitter::default();

    while let Some(chunk) = output.next().await {
        let lines = splitter.push(&chunk);
        if !append(&process, generation, stream, level, lines, &sinks) {
            return;
        }
    }

    if let Some(line) = splitter.finish() {
        append(&process, generation, stream, level, vec![line], &sinks);
    }

    tracing::trace!("{stream} of {} closed", process.name);
}

/// Returns `false` once the record belongs to a newer spawn.
fn append(
    process: &ManagedProcess,
    generation: u64,
    stream: LogStream,
    level: LogLevel,
    lines: Vec<String>,
    sinks: &LogFanout,
) -> bool {
    if lines.is_empty() {
        return true;
    }

    {
        let mut state = process.state.lock();
        if state.generation != generation {
            tracing::trace!("Dropping {stream} output of a replaced {} process", process.name);
            return false;
        }
        for line in &lines {
            state.logs.add(stream, line);
        }
    }

    if !sinks.is_empty() {
        for line in lines {
            sinks.emit(
                LogRecord::new(&process.name, level, line)
                    .with_metadata(serde_json::json!({ "stream": stream.as_str() })),
            );
        }
    }

    true
}

/// Reap the child, record its exit and wake anyone waiting in `stop`.
pub(crate) async fn watch_exit(
    process: Arc<ManagedProcess>,
    generation: u64,
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    sinks: LogFanout,
) {
    let outcome = match child.wait().await {
        Ok(status) => ExitOutcome::from(status),
        Err(err) => {
            tracing::error!("Failed to wait for {}: {err}", process.name);
            ExitOutcome::Unknown
        }
    };

    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, futures::future::join_all(readers))
        .await
        .is_err()
    {
        tracing::debug!(
            "Output of {} is still open after exit, a descendant holds the pipes",
            process.name
        );
    }

    let message = outcome.describe();
    let released = {
        let mut state = process.state.lock();
        let released = state.release(generation);
        if released {
            state.logs.add(LogStream::Exit, &message);
        }
        released
    };

    if released {
        tracing::info!("{}: {message}", process.name);
        sinks.emit(LogRecord::new(&process.name, outcome.level(), message));
    } else {
        tracing::debug!("{}: stale exit ignored ({message})", process.name);
    }

    exit_tx.send_replace(Some(outcome));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_splitter_joins_chunks() {
        let mut splitter = LineSplitter::default();

        assert!(splitter.push(b"listen").is_empty());
        assert_eq!(splitter.push(b"ing on :80\r\n\n  \nready"), vec!["listening on :80"]);
        assert_eq!(splitter.finish().as_deref(), Some("ready"));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_line_splitter_keeps_split_utf8() {
        let bytes = "caf\u{e9} ok\n".as_bytes();
        let (head, tail) = bytes.split_at(4);

        let mut splitter = LineSplitter::default();
        assert!(splitter.push(head).is_empty());
        assert_eq!(splitter.push(tail), vec!["caf\u{e9} ok"]);
    }

    #[test]
    fn test_line_splitter_cuts_unterminated_flood() {
        let mut splitter = LineSplitter::default();
        let chunk = vec![b'x'; 4096];

        let mut lines = Vec::new();
        for _ in 0..8 {
            lines.extend(splitter.push(&chunk));
        }
        assert_eq!(lines.len(), 1);
        assert!(lines[0].len() > MAX_LINE_LENGTH);

        assert_eq!(splitter.push(b"xxx\nnext\n"), vec!["next"]);
        assert_eq!(splitter.finish(), None);
    }
}
