use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Operator command read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Select(isize),
    List,
    Quit,
}

/// Parse one input line. Unrecognised input yields `None`.
pub fn parse(line: &str) -> Option<Command> {
    let word = line.trim();
    match word.to_ascii_lowercase().as_str() {
        "n" | "next" => Some(Command::Next),
        "p" | "prev" | "previous" => Some(Command::Previous),
        "l" | "list" => Some(Command::List),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => word.parse().ok().map(Command::Select),
    }
}

/// Forward parsed stdin commands until stdin closes or the receiver drops.
pub fn spawn_stdin(tx: mpsc::Sender<Command>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("stdin closed, keyboard control disabled");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse(&line) {
                Some(cmd) => {
                    if tx.send(cmd).await.is_err() {
                        return;
                    }
                }
                None => warn!(input = line.trim(), "unknown command (n, p, <index>, l, q)"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_and_aliases() {
        assert_eq!(parse("n"), Some(Command::Next));
        assert_eq!(parse(" NEXT \n"), Some(Command::Next));
        assert_eq!(parse("p"), Some(Command::Previous));
        assert_eq!(parse("prev"), Some(Command::Previous));
        assert_eq!(parse("l"), Some(Command::List));
        assert_eq!(parse("q"), Some(Command::Quit));
    }

    #[test]
    fn numbers_select() {
        assert_eq!(parse("13"), Some(Command::Select(13)));
        assert_eq!(parse("-1"), Some(Command::Select(-1)));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse("bilateral"), None);
        assert_eq!(parse("1.5"), None);
        assert_eq!(parse(""), None);
    }
}
