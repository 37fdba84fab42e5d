//! Player roster and turn order for the mancala table
//!
//! This module owns every player record on the server, including:
//! - Connection registration while a player is still choosing a name
//! - Promotion into the game with pebble seeding for latecomers
//! - The circular turn order and the single turn token
//! - Departure handling that never leaves the turn unassigned
//!
//! Players are stored in a dense ring: the vector order is the turn order and
//! traversal wraps from the last record to the first. Records are addressed by
//! their connection id, never by position, so removals cannot invalidate any
//! reference another part of the server holds.

use log::{debug, info};
use shared::{NPEBBLES, NPITS};

/// Opaque handle for a transport connection, stable for its lifetime
pub type ConnectionId = u32;

/// Position of a player in the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Connected, no name committed yet
    Naming,
    /// In the game, waiting for another player to move
    Waiting,
    /// In the game and holding the turn
    OnTurn,
    /// Removed from the roster
    Disconnected,
}

/// A single seat at the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: ConnectionId,
    /// Empty until the name is committed
    pub name: String,
    /// Sowing pits `0..NPITS` followed by the end pit at `NPITS`
    pub pits: [u32; NPITS + 1],
    pub state: PlayerState,
}

impl Player {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            name: String::new(),
            pits: [0; NPITS + 1],
            state: PlayerState::Naming,
        }
    }

    /// True once the player has a committed name and takes part in the game
    pub fn is_active(&self) -> bool {
        matches!(self.state, PlayerState::Waiting | PlayerState::OnTurn)
    }

    pub fn sowing_pebbles(&self) -> u32 {
        self.pits[..NPITS].iter().sum()
    }

    pub fn sowing_pits_empty(&self) -> bool {
        self.pits[..NPITS].iter().all(|pebbles| *pebbles == 0)
    }

    /// Final score: every pit including the end pit
    pub fn score(&self) -> u32 {
        self.pits.iter().sum()
    }
}

/// Why a roster mutation was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("connection {0} is not on the roster")]
    UnknownPlayer(ConnectionId),
    #[error("connection {0} already has a name")]
    AlreadyNamed(ConnectionId),
    #[error("name {0:?} is already taken")]
    DuplicateName(String),
}

/// Outcome of removing a player
#[derive(Debug, Clone)]
pub struct Departure {
    /// The removed record, with its state set to `Disconnected`
    pub player: Player,
    /// Committed name, if the player got past naming
    pub name: Option<String>,
    /// Whether the player held the turn when it left
    pub held_turn: bool,
}

/// Circular collection of every connected player
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
        }
    }

    /// Registers a fresh connection in the `Naming` state
    ///
    /// The record is linked at the end of the ring. It takes no part in turn
    /// order, broadcasts or game-over checks until it is promoted.
    pub fn join(&mut self, id: ConnectionId) -> &Player {
        debug_assert!(self.position(id).is_none(), "connection {} joined twice", id);
        debug!("Connection {} joined the roster", id);
        self.players.push(Player::new(id));
        &self.players[self.players.len() - 1]
    }

    /// Commits a name and seats the player in the game
    ///
    /// Sowing pits are seeded with the rounded-up average of the pebbles
    /// already in play. If nobody holds the turn the new player gets it.
    pub fn promote(&mut self, id: ConnectionId, name: &str) -> Result<PlayerState, RosterError> {
        let index = self.position(id).ok_or(RosterError::UnknownPlayer(id))?;
        if self.players[index].state != PlayerState::Naming {
            return Err(RosterError::AlreadyNamed(id));
        }
        if self.name_taken(name) {
            return Err(RosterError::DuplicateName(name.to_string()));
        }

        let seed = self.average_seed();
        let state = if self.current_turn().is_none() {
            PlayerState::OnTurn
        } else {
            PlayerState::Waiting
        };

        let player = &mut self.players[index];
        player.name = name.to_string();
        player.pits = [seed; NPITS + 1];
        player.pits[NPITS] = 0;
        player.state = state;

        info!(
            "Player {} seated with {} pebble(s) per pit ({:?})",
            name, seed, state
        );
        Ok(state)
    }

    /// Removes a player from the ring
    ///
    /// If the player held the turn, the next active player is granted it
    /// before the record is unlinked, so the turn is never unassigned while
    /// another active player exists.
    pub fn leave(&mut self, id: ConnectionId) -> Option<Departure> {
        let index = self.position(id)?;
        let held_turn = self.players[index].state == PlayerState::OnTurn;

        if held_turn {
            if let Some(next) = self.next_active(id).filter(|next| *next != id) {
                self.set_state(next, PlayerState::OnTurn);
            }
        }

        let mut player = self.players.remove(index);
        let name = match player.state {
            PlayerState::Naming => None,
            _ => Some(player.name.clone()),
        };
        player.state = PlayerState::Disconnected;

        debug!("Connection {} left the roster", id);
        Some(Departure {
            player,
            name,
            held_turn,
        })
    }

    /// Next active player after `id` in ring order, skipping anyone still naming
    ///
    /// Returns `id` itself when it is the only active player, and `None` if
    /// `id` is unknown or nobody is active.
    pub fn next_active(&self, id: ConnectionId) -> Option<ConnectionId> {
        let start = self.position(id)?;
        let len = self.players.len();
        (1..=len)
            .map(|offset| &self.players[(start + offset) % len])
            .find(|player| player.is_active())
            .map(|player| player.id)
    }

    /// Moves the turn from `from` to the next active player
    pub fn pass_turn(&mut self, from: ConnectionId) -> Option<ConnectionId> {
        let next = self.next_active(from)?;
        if next != from {
            self.set_state(from, PlayerState::Waiting);
            self.set_state(next, PlayerState::OnTurn);
        }
        Some(next)
    }

    /// True once some active player has no pebbles left in its sowing pits
    pub fn is_game_over(&self) -> bool {
        self.active().any(Player::sowing_pits_empty)
    }

    /// Pebbles per sowing pit for the next player to be seated
    pub fn average_seed(&self) -> u32 {
        let players = self.active_count() as u32;
        if players == 0 {
            return NPEBBLES;
        }
        let pebbles: u32 = self.active().map(Player::sowing_pebbles).sum();
        pebbles.div_ceil(players * NPITS as u32)
    }

    pub fn current_turn(&self) -> Option<ConnectionId> {
        self.players
            .iter()
            .find(|player| player.state == PlayerState::OnTurn)
            .map(|player| player.id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    /// Active players in ring order
    pub fn active(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|player| player.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Every connection on the roster, naming or active
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.players.iter().map(|player| player.id)
    }

    /// Pebbles across every pit of every active player
    pub fn total_pebbles(&self) -> u32 {
        self.active().map(Player::score).sum()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn name_taken(&self, name: &str) -> bool {
        self.active().any(|player| player.name == name)
    }

    fn position(&self, id: ConnectionId) -> Option<usize> {
        self.players.iter().position(|player| player.id == id)
    }

    fn set_state(&mut self, id: ConnectionId, state: PlayerState) {
        if let Some(player) = self.get_mut(id) {
            player.state = state;
        }
    }
}
