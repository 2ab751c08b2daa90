//! Best-effort forwarding of captured lines and lifecycle events.
//!
//! Sinks are fire-and-forget: [`LogSink::emit`] must return immediately and a
//! delivery failure never reaches the supervisor.

use std::{fmt, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::mpsc;

const HTTP_QUEUE_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Process-qualified name, `process:<name>`.
    pub source: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl LogRecord {
    #[must_use]
    pub fn new(process: &str, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            source: format!("process:{process}"),
            level,
            message: message.into(),
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The process name without the `process:` qualifier.
    #[must_use]
    pub fn process(&self) -> &str {
        self.source.strip_prefix("process:").unwrap_or(&self.source)
    }
}

pub trait LogSink: Send + Sync {
    fn emit(&self, record: LogRecord);
}

/// Delivers every record to each subscribed sink.
#[derive(Clone, Default)]
pub struct LogFanout {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl LogFanout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for LogFanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogFanout")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl LogSink for LogFanout {
    fn emit(&self, record: LogRecord) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(record.clone());
            }
            last.emit(record);
        }
    }
}

/// Hands records to an in-process consumer, dropping them when it lags.
#[derive(Debug, Clone)]
pub struct ChannelLogSink {
    tx: mpsc::Sender<LogRecord>,
}

impl ChannelLogSink {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelLogSink {
    fn emit(&self, record: LogRecord) {
        if let Err(err) = self.tx.try_send(record) {
            tracing::trace!("Dropping log record: {err}");
        }
    }
}

/// POSTs every record as JSON to a collector endpoint.
///
/// Records are queued and delivered by a background task; a full queue or a
/// failed request drops the record.
#[derive(Debug, Clone)]
pub struct HttpLogSink {
    tx: mpsc::Sender<LogRecord>,
}

impl HttpLogSink {
    /// Build the client and start the delivery task. Must be called inside a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("shepherd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let (tx, mut rx) = mpsc::channel::<LogRecord>(HTTP_QUEUE_SIZE);

        tokio::spawn(async move {
            tracing::debug!("HTTP log sink forwarding to {url}");

            while let Some(record) = rx.recv().await {
                match client.post(&url).json(&record).send().await {
                    Ok(response) if !response.status().is_success() => {
                        tracing::warn!(
                            "Log sink rejected record from {}: HTTP {}",
                            record.source,
                            response.status()
                        );
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!("Failed to deliver log record to sink: {err}");
                    }
                }
            }
        });

        Ok(Self { tx })
    }
}

impl LogSink for HttpLogSink {
    fn emit(&self, record: LogRecord) {
        if let Err(err) = self.tx.try_send(record) {
            tracing::debug!("Log sink queue unavailable, dropping record: {err}");
        }
    }
}
