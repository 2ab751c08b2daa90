//! Line commands accepted on stdin while `shepherd run` is supervising.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start(String),
    Stop(String),
    Restart(String),
    Logs { name: String, count: Option<usize> },
    List,
    StopAll,
    Quit,
    Help,
}

pub const HELP: &str = "\
commands:
  start <name>        start a process
  stop <name>         stop a process
  restart <name>      restart a process and show its first output
  logs <name> [N]     print the last N buffered lines (all when omitted)
  list                show every process and its status
  stop-all            stop every process
  quit                stop everything and exit";

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let name = |usage: &str| match rest.as_slice() {
        [name] => Ok((*name).to_owned()),
        _ => Err(format!("usage: {usage}")),
    };

    let parsed = match command {
        "start" => ConsoleCommand::Start(name("start <name>")?),
        "stop" => ConsoleCommand::Stop(name("stop <name>")?),
        "restart" => ConsoleCommand::Restart(name("restart <name>")?),
        "logs" => match rest.as_slice() {
            [name] => ConsoleCommand::Logs {
                name: (*name).to_owned(),
                count: None,
            },
            [name, count] => {
                let count = count
                    .parse()
                    .map_err(|_| format!("invalid line count: {count}"))?;
                ConsoleCommand::Logs {
                    name: (*name).to_owned(),
                    count: Some(count),
                }
            }
            _ => return Err("usage: logs <name> [N]".to_owned()),
        },
        "list" | "ps" => ConsoleCommand::List,
        "stop-all" => ConsoleCommand::StopAll,
        "quit" | "exit" => ConsoleCommand::Quit,
        "help" | "?" => ConsoleCommand::Help,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };

    Ok(Some(parsed))
}
