//! Turns the raw server stream into printable lines

use shared::{LineAssembler, LineError, LineLimit};

/// Longest server line the client will buffer; board rows can exceed the
/// limit the server applies to client messages
pub const MAX_SERVER_LINE: usize = 8192;

/// Line decoder for everything the server sends
pub struct ServerLines {
    assembler: LineAssembler,
}

impl ServerLines {
    pub fn new() -> Self {
        Self {
            assembler: LineAssembler::new(LineLimit::Custom(MAX_SERVER_LINE)),
        }
    }

    /// Feeds one read and returns the printable lines it completed
    ///
    /// Returns `PeerClosed` once the server has closed the connection.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, LineError> {
        self.assembler.feed(bytes)?;
        let mut lines = Vec::new();
        for line in self.assembler.lines() {
            if let Some(text) = render_line(&line?) {
                lines.push(text);
            }
        }
        Ok(lines)
    }
}

impl Default for ServerLines {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips NUL padding and control characters; blank lines are dropped
pub fn render_line(line: &str) -> Option<String> {
    let text: String = line.chars().filter(|c| !c.is_control()).collect();
    let text = text.trim_end();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_line() {
        assert_eq!(render_line("Your move?"), Some("Your move?".to_string()));
        assert_eq!(render_line("\0Game over!\0"), Some("Game over!".to_string()));
        assert_eq!(render_line("   "), None);
        assert_eq!(render_line(""), None);
    }

    #[test]
    fn test_server_lines_across_reads() {
        let mut lines = ServerLines::new();

        assert_eq!(lines.push(b"Welcome to Man").unwrap(), Vec::<String>::new());
        assert_eq!(
            lines.push(b"cala. What is your name?\r\nYour").unwrap(),
            vec!["Welcome to Mancala. What is your name?".to_string()]
        );
        assert_eq!(
            lines.push(b" move?\r\n").unwrap(),
            vec!["Your move?".to_string()]
        );
    }

    #[test]
    fn test_long_board_rows_fit() {
        let mut lines = ServerLines::new();
        let row = format!("{}: [0]100 [1]100 [2]100 [3]100 [4]100 [5]100 [end pit]300\r\n", "n".repeat(80));

        let rendered = lines.push(row.as_bytes()).unwrap();
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].ends_with("[end pit]300"));
    }

    #[test]
    fn test_server_close() {
        let mut lines = ServerLines::new();
        assert_eq!(lines.push(&[]), Err(LineError::PeerClosed));
    }
}
