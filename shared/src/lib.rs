//! Protocol constants, prompt texts and incremental line framing shared by the
//! mancala server and the terminal client.

pub mod line;

pub use line::{LineAssembler, LineError, LineLimit};

/// Maximum permitted name size in bytes, not including the terminator
pub const MAXNAME: usize = 80;
/// Number of sowing pits on a side, not including the end pit
pub const NPITS: usize = 6;
/// Initial number of pebbles per pit for the first player
pub const NPEBBLES: u32 = 4;
/// Maximum permitted message size once a player is in the game
pub const MAXMESSAGE: usize = MAXNAME + 50;
pub const DEFAULT_PORT: u16 = 3000;

pub const WELCOME: &str = "Welcome to Mancala. What is your name?\r\n";
pub const INVALID_NAME: &str = "Invalid username. DISCONNECTED. Try connect again.\r\n";
pub const MESSAGE_TOO_LONG: &str = "Message too long. DISCONNECTED.\r\n";
pub const YOUR_MOVE: &str = "Your move?\r\n";
pub const NOT_YOUR_MOVE: &str = "It is not your move.\r\n";
pub const INVALID_PIT: &str = "Invalid pit index! Try again.\r\n";
pub const GAME_OVER: &str = "Game over!\r\n";

pub fn joining(name: &str) -> String {
    format!("Player {} is joining in.\r\n", name)
}

pub fn disconnected(name: &str) -> String {
    format!("Player {} disconnected.\r\n", name)
}

pub fn whose_move(name: &str) -> String {
    format!("It is {}'s move.\r\n", name)
}

pub fn distributes(name: &str, pebbles: u32, pit: usize) -> String {
    format!(
        "Player {} distributes {} pebble(s) in pit index {}.\r\n",
        name, pebbles, pit
    )
}

pub fn score(name: &str, points: u32) -> String {
    format!("{} has {} points\r\n", name, points)
}

/// Formats one player's row of the board snapshot
pub fn board_row(name: &str, pits: &[u32; NPITS + 1]) -> String {
    let mut row = format!("{}:", name);
    for (index, pebbles) in pits[..NPITS].iter().enumerate() {
        row.push_str(&format!(" [{}]{}", index, pebbles));
    }
    row.push_str(&format!(" [end pit]{}\r\n", pits[NPITS]));
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_limits() {
        assert_eq!(MAXNAME, 80);
        assert_eq!(MAXMESSAGE, 130);
        assert!(MAXMESSAGE > MAXNAME);
    }

    #[test]
    fn test_board_row_format() {
        let row = board_row("alice", &[4, 4, 0, 5, 5, 5, 1]);
        assert_eq!(
            row,
            "alice: [0]4 [1]4 [2]0 [3]5 [4]5 [5]5 [end pit]1\r\n"
        );
    }

    #[test]
    fn test_announcements_are_crlf_terminated() {
        let messages = vec![
            joining("bob"),
            disconnected("bob"),
            whose_move("bob"),
            distributes("bob", 3, 2),
            score("bob", 24),
        ];

        for message in messages {
            assert!(message.ends_with("\r\n"), "{:?}", message);
            assert!(message.contains("bob"));
        }
    }

    #[test]
    fn test_distributes_text() {
        assert_eq!(
            distributes("carol", 4, 0),
            "Player carol distributes 4 pebble(s) in pit index 0.\r\n"
        );
    }
}
