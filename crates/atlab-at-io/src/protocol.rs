//! Terminal-line detection and line classification for AT transactions.

/// Final result code for a successful command.
pub const OK: &str = "OK";

/// Final result code for an aborted command.
pub const ABORT: &str = "ABORT";

/// Substring marking an error final result (`ERROR`, `+CME ERROR: 3`, ...).
pub const ERROR_MARKER: &str = "ERROR";

/// Prefix of unsolicited result codes and tagged responses.
pub const NOTIFICATION_PREFIX: char = '+';

/// How a line ends a transaction, if it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Ok,
    Error,
    Abort,
}

/// Classify `line` as a final result code.
///
/// `OK` and `ABORT` must match exactly; any line containing `ERROR` counts.
pub fn terminal(line: &str) -> Option<Terminal> {
    if line == OK {
        Some(Terminal::Ok)
    } else if line.contains(ERROR_MARKER) {
        Some(Terminal::Error)
    } else if line == ABORT {
        Some(Terminal::Abort)
    } else {
        None
    }
}

/// Whether `line` is a notification rather than response data.
pub fn is_notification(line: &str) -> bool {
    line.starts_with(NOTIFICATION_PREFIX)
}

/// Split collected lines into `(response, notifications)`.
///
/// Lines that are blank after trimming are dropped. Order is preserved in
/// both outputs.
pub fn split_lines<I>(lines: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut response = Vec::new();
    let mut notifications = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if is_notification(&line) {
            notifications.push(line);
        } else {
            response.push(line);
        }
    }
    (response, notifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_ok_is_exact() {
        assert_eq!(terminal("OK"), Some(Terminal::Ok));
        assert_eq!(terminal("OK "), None);
        assert_eq!(terminal("BOOKING"), None);
    }

    #[test]
    fn terminal_error_is_substring() {
        assert_eq!(terminal("ERROR"), Some(Terminal::Error));
        assert_eq!(terminal("+CME ERROR: 3"), Some(Terminal::Error));
        assert_eq!(terminal("+CMS ERROR: 500"), Some(Terminal::Error));
    }

    #[test]
    fn terminal_abort_is_exact() {
        assert_eq!(terminal("ABORT"), Some(Terminal::Abort));
        assert_eq!(terminal("ABORTED"), None);
    }

    #[test]
    fn data_lines_are_not_terminal() {
        assert_eq!(terminal("357347090012345"), None);
        assert_eq!(terminal("+CEREG: 1,1"), None);
        assert_eq!(terminal(""), None);
    }

    #[test]
    fn split_classifies_and_drops_blanks() {
        let lines = ["+FOO:1", "DATA1", "", "   ", "DATA2", "+BAR:2"]
            .into_iter()
            .map(String::from);
        let (response, notifications) = split_lines(lines);
        assert_eq!(response, vec!["DATA1", "DATA2"]);
        assert_eq!(notifications, vec!["+FOO:1", "+BAR:2"]);
    }

    #[test]
    fn split_empty_input() {
        let (response, notifications) = split_lines(Vec::new());
        assert!(response.is_empty());
        assert!(notifications.is_empty());
    }
}
