//! Sowing rules: one move of one player across the ring of pit rows

use crate::roster::{ConnectionId, PlayerState, Roster};
use log::debug;
use shared::NPITS;

/// Why a move was refused; the board is untouched in both cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("it is not this player's move")]
    NotYourTurn,
    #[error("pit index is out of range or the pit is empty")]
    InvalidPit,
}

/// Result of a completed move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Pebbles lifted from the chosen pit
    pub pebbles: u32,
    /// Last pebble landed in the mover's own end pit
    pub extra_turn: bool,
    /// Player holding the turn after the move
    pub next_turn: ConnectionId,
}

/// Sows the pebbles of `pit` for the player `actor`
///
/// Pebbles go one at a time into the following pits. The mover's own row
/// includes its end pit; every other row stops before its end pit. When a
/// row runs out the next active player's row follows, wrapping around the
/// ring as often as needed. If the final pebble lands in the mover's end pit
/// the mover keeps the turn, otherwise it passes to the next active player.
pub fn sow(roster: &mut Roster, actor: ConnectionId, pit: usize) -> Result<MoveOutcome, MoveError> {
    let player = roster.get_mut(actor).ok_or(MoveError::NotYourTurn)?;
    if player.state != PlayerState::OnTurn {
        return Err(MoveError::NotYourTurn);
    }
    if pit >= NPITS || player.pits[pit] == 0 {
        return Err(MoveError::InvalidPit);
    }

    let pebbles = std::mem::take(&mut player.pits[pit]);
    let mut remaining = pebbles;
    let mut owner = actor;
    let mut index = pit + 1;
    let mut extra_turn = false;

    while remaining > 0 {
        let own_row = owner == actor;
        let row_end = if own_row { NPITS + 1 } else { NPITS };

        if let Some(row) = roster.get_mut(owner) {
            while index < row_end && remaining > 0 {
                row.pits[index] += 1;
                remaining -= 1;
                index += 1;
            }
        }

        if own_row && remaining == 0 && index == NPITS + 1 {
            extra_turn = true;
        }

        if remaining > 0 {
            owner = roster.next_active(owner).unwrap_or(actor);
            index = 0;
        }
    }

    let next_turn = if extra_turn {
        actor
    } else {
        roster.pass_turn(actor).unwrap_or(actor)
    };

    debug!(
        "Connection {} sowed {} pebble(s) from pit {} (extra turn: {})",
        actor, pebbles, pit, extra_turn
    );
    Ok(MoveOutcome {
        pebbles,
        extra_turn,
        next_turn,
    })
}
