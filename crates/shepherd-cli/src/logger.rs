use colored::{Color, Colorize};
use shepherd_core::{
    sink::{LogLevel, LogRecord},
    ProcessInfo,
};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::{self, Stdout, Write};

pub struct Logger<W: Write = Stdout> {
    output: W,
}

impl<W: Write> Logger<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    fn string_to_color(s: &str) -> Color {
        let colors = [
            Color::Green,
            Color::Blue,
            Color::Magenta,
            Color::Cyan,
            Color::BrightGreen,
            Color::BrightBlue,
            Color::BrightMagenta,
            Color::BrightCyan,
        ];

        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        let hash = hasher.finish();

        let idx = usize::try_from(hash % colors.len() as u64).unwrap_or_default();
        colors[idx]
    }

    pub fn log(&mut self, process: &str, message: &str) {
        let prefix = format!("[{process}]").color(Self::string_to_color(process));
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }

    pub fn record(&mut self, record: &LogRecord) {
        match record.level {
            LogLevel::Error => {
                let prefix = format!("[{}]", record.process()).color(Color::Red);
                let _ = writeln!(self.output, "{prefix} {}", record.message.red());
            }
            LogLevel::Debug | LogLevel::Info | LogLevel::Warn => {
                self.log(record.process(), &record.message);
            }
        }
    }

    pub fn system(&mut self, message: &str) {
        let prefix = "[system]".color(Color::Yellow);
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }

    pub fn error(&mut self, message: &str) {
        let prefix = "[error]".color(Color::Red);
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }

    pub fn processes(&mut self, processes: &[ProcessInfo]) {
        for info in processes {
            let pid = info
                .pid
                .map_or_else(|| "-".to_owned(), |pid| pid.to_string());
            let started = info
                .start_time
                .map_or_else(|| "-".to_owned(), |time| time.to_rfc3339());
            let _ = writeln!(
                self.output,
                "{:<16} {:<9} pid={pid:<8} started={started}",
                info.name, info.status
            );
            if let Some(error) = &info.last_error {
                let _ = writeln!(self.output, "{:<16} {}", "", error.red());
            }
        }
    }
}

impl Logger {
    pub fn default() -> Self {
        Self::new(io::stdout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shepherd_core::Status;
    use std::io::Cursor;

    fn output(logger: Logger<Cursor<Vec<u8>>>) -> String {
        String::from_utf8(logger.output.into_inner()).unwrap()
    }

    #[test]
    fn test_log() {
        colored::control::set_override(false);
        let mut logger = Logger::new(Cursor::new(Vec::new()));

        logger.log("test", "line1\nline2");

        assert_eq!(output(logger), "[test] line1\n[test] line2\n");
    }

    #[test]
    fn test_record_uses_process_name() {
        colored::control::set_override(false);
        let mut logger = Logger::new(Cursor::new(Vec::new()));

        logger.record(&LogRecord::new("api", LogLevel::Info, "listening"));
        logger.record(&LogRecord::new("api", LogLevel::Error, "Command not found"));

        assert_eq!(output(logger), "[api] listening\n[api] Command not found\n");
    }

    #[test]
    fn test_processes_table() {
        colored::control::set_override(false);
        let mut logger = Logger::new(Cursor::new(Vec::new()));

        logger.processes(&[ProcessInfo {
            name: "bad".to_owned(),
            status: Status::Error,
            pid: None,
            start_time: None,
            last_error: Some("Command not found: `nope`.".to_owned()),
        }]);

        let text = output(logger);
        assert!(text.starts_with("bad"));
        assert!(text.contains("error"));
        assert!(text.contains("pid=-"));
        assert!(text.contains("Command not found: `nope`."));
    }

    #[test]
    fn test_log_default() {
        let _logger = Logger::default();
    }
}
