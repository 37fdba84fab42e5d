//! Event handling for the mancala table, independent of any transport
//!
//! The dispatcher owns the roster and one session per connection. Each call
//! handles exactly one event (a new connection, the bytes of one read, or a
//! lost connection) and returns the writes and closes that event causes, in
//! the order they must be performed. Mutation and the formatting of the
//! resulting broadcasts happen back to back inside that single call, so no
//! reader ever observes a half-applied move.

use crate::error::{ProtocolViolation, SessionError};
use crate::roster::{ConnectionId, PlayerState, Roster, RosterError};
use crate::session::{Command, Session};
use crate::sowing::{sow, MoveError};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Output produced by an event, applied in order by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send { to: ConnectionId, text: String },
    Close { id: ConnectionId },
}

pub struct Dispatcher {
    roster: Roster,
    sessions: HashMap<ConnectionId, Session>,
    next_id: ConnectionId,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            roster: Roster::new(),
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Registers a newly accepted connection and greets it
    pub fn connect(&mut self) -> (ConnectionId, Vec<Outbound>) {
        let id = self.next_id;
        self.next_id += 1;

        self.roster.join(id);
        self.sessions.insert(id, Session::new(id));
        info!(
            "New player requires connection ({}), {} at the table",
            id,
            self.roster.len()
        );

        let out = vec![Outbound::Send {
            to: id,
            text: shared::WELCOME.to_string(),
        }];
        (id, out)
    }

    /// Handles the bytes of one read from `id`
    ///
    /// Every line completed by these bytes is processed before returning.
    /// An empty slice means the peer closed the connection. Processing
    /// stops early once the game is over.
    pub fn receive(&mut self, id: ConnectionId, bytes: &[u8]) -> Vec<Outbound> {
        let mut out = Vec::new();
        let Some(session) = self.sessions.get_mut(&id) else {
            debug!("Dropping {} byte(s) for unknown connection {}", bytes.len(), id);
            return out;
        };

        if let Err(error) = session.feed(bytes) {
            self.fail(id, error, &mut out);
            return out;
        }

        while !self.roster.is_game_over() {
            let Some(session) = self.sessions.get_mut(&id) else {
                break;
            };
            match session.next_command() {
                Ok(Some(Command::Name(name))) => self.handle_name(id, &name, &mut out),
                Ok(Some(Command::Move(pit))) => self.handle_move(id, pit, &mut out),
                Ok(None) => break,
                Err(error) => {
                    self.fail(id, error, &mut out);
                    break;
                }
            }
        }

        out
    }

    /// Handles a connection that went away outside of a read
    pub fn disconnect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        let mut out = Vec::new();
        if self.sessions.contains_key(&id) {
            self.remove(id, &mut out);
        }
        out
    }

    pub fn is_game_over(&self) -> bool {
        self.roster.is_game_over()
    }

    /// Final scores: every pit of every seated player
    pub fn scores(&self) -> Vec<(String, u32)> {
        self.roster
            .active()
            .map(|player| (player.name.clone(), player.score()))
            .collect()
    }

    /// Announces the end of the game and closes every connection
    pub fn finish(&mut self) -> Vec<Outbound> {
        let mut text = shared::GAME_OVER.to_string();
        info!(
            "Game over! {} pebble(s) on the table",
            self.roster.total_pebbles()
        );
        for (name, points) in self.scores() {
            info!("{} has {} points", name, points);
            text.push_str(&shared::score(&name, points));
        }

        let mut ids: Vec<ConnectionId> = self.roster.connections().collect();
        ids.sort_unstable();

        let mut out = Vec::with_capacity(ids.len() * 2);
        for id in &ids {
            out.push(Outbound::Send {
                to: *id,
                text: text.clone(),
            });
        }
        for id in ids {
            if let Some(session) = self.sessions.get_mut(&id) {
                session.close();
            }
            out.push(Outbound::Close { id });
        }
        out
    }

    fn handle_name(&mut self, id: ConnectionId, name: &str, out: &mut Vec<Outbound>) {
        match self.roster.promote(id, name) {
            Ok(state) => {
                info!("Player {} is joining in.", name);
                self.broadcast(out, &shared::joining(name), Some(id));
                if state == PlayerState::OnTurn {
                    debug!("{} holds the first turn", name);
                }
                self.announce_board(out);
                self.announce_turn(out);
            }
            Err(RosterError::DuplicateName(taken)) => {
                self.fail(id, ProtocolViolation::DuplicateName(taken).into(), out);
            }
            Err(error) => {
                warn!("Ignoring name from connection {}: {}", id, error);
            }
        }
    }

    fn handle_move(&mut self, id: ConnectionId, pit: Option<usize>, out: &mut Vec<Outbound>) {
        let on_turn = self
            .roster
            .get(id)
            .is_some_and(|player| player.state == PlayerState::OnTurn);
        if !on_turn {
            send(out, id, shared::NOT_YOUR_MOVE);
            return;
        }
        let Some(pit) = pit else {
            send(out, id, shared::INVALID_PIT);
            return;
        };

        match sow(&mut self.roster, id, pit) {
            Ok(outcome) => {
                let name = self
                    .roster
                    .get(id)
                    .map(|player| player.name.clone())
                    .unwrap_or_default();
                info!(
                    "Player {} distributes {} pebble(s) in pit index {}.",
                    name, outcome.pebbles, pit
                );
                if outcome.extra_turn {
                    debug!("{} moves again", name);
                } else {
                    debug!("Turn passes to connection {}", outcome.next_turn);
                }
                self.broadcast(out, &shared::distributes(&name, outcome.pebbles, pit), None);
                self.announce_board(out);
                if !self.roster.is_game_over() {
                    self.announce_turn(out);
                }
            }
            Err(MoveError::InvalidPit) => send(out, id, shared::INVALID_PIT),
            Err(MoveError::NotYourTurn) => send(out, id, shared::NOT_YOUR_MOVE),
        }
    }

    /// Rejects and closes a connection, or cleans up after a closed peer
    fn fail(&mut self, id: ConnectionId, error: SessionError, out: &mut Vec<Outbound>) {
        match &error {
            SessionError::PeerClosed => debug!("Connection {} closed by peer", id),
            SessionError::Violation(ProtocolViolation::MessageTooLong) => {
                warn!("Connection {}: {}", id, error);
                send(out, id, shared::MESSAGE_TOO_LONG);
            }
            SessionError::Violation(violation) => {
                warn!("Disconnect a player due to invalid name: {}", violation);
                send(out, id, shared::INVALID_NAME);
            }
        }
        self.remove(id, out);
    }

    fn remove(&mut self, id: ConnectionId, out: &mut Vec<Outbound>) {
        if let Some(mut session) = self.sessions.remove(&id) {
            session.close();
        }
        out.push(Outbound::Close { id });

        let Some(departure) = self.roster.leave(id) else {
            return;
        };
        debug!(
            "Connection {} left with {} pebble(s) (held turn: {})",
            departure.player.id,
            departure.player.score(),
            departure.held_turn
        );
        if self.roster.is_empty() {
            info!("The table is empty");
        }
        if let Some(name) = departure.name {
            info!("Player {} disconnected.", name);
            self.broadcast(out, &shared::disconnected(&name), None);
            if self.roster.active_count() > 0 {
                self.announce_board(out);
                self.announce_turn(out);
            }
        }
    }

    /// Sends `text` to every seated player except `exclude`
    fn broadcast(&self, out: &mut Vec<Outbound>, text: &str, exclude: Option<ConnectionId>) {
        for player in self.roster.active() {
            if Some(player.id) != exclude {
                send(out, player.id, text);
            }
        }
    }

    fn announce_board(&self, out: &mut Vec<Outbound>) {
        let board: String = self
            .roster
            .active()
            .map(|player| shared::board_row(&player.name, &player.pits))
            .collect();
        for row in board.lines() {
            info!("{}", row);
        }
        self.broadcast(out, &board, None);
    }

    fn announce_turn(&self, out: &mut Vec<Outbound>) {
        let Some(current) = self.roster.current_turn() else {
            return;
        };
        let name = self
            .roster
            .get(current)
            .map(|player| player.name.clone())
            .unwrap_or_default();

        info!("It is {}'s move.", name);
        send(out, current, shared::YOUR_MOVE);
        self.broadcast(out, &shared::whose_move(&name), Some(current));
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn send(out: &mut Vec<Outbound>, to: ConnectionId, text: &str) {
    out.push(Outbound::Send {
        to,
        text: text.to_string(),
    });
}
