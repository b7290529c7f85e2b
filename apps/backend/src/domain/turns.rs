//! Turn sequencing.
//!
//! These live in `domain` so every layer (session derivation, commit
//! re-validation, lifecycle) shares a single source of truth for roster order
//! and "who acts next". Two call sites computing turn order differently is a
//! desync bug, so `Roster::new` is the only way to build an ordering.

use crate::domain::model::{Player, Role};
use crate::errors::domain::DomainError;

/// Players of one game in join order: `(joined_at, id)`, ids being assigned
/// in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new(mut players: Vec<Player>) -> Self {
        players.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        Self { players }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, player_id: i64) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn by_user(&self, user_id: i64) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn evader(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.role == Role::Evader)
    }

    pub fn seekers(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.role == Role::Seeker)
    }
}

/// Roster index that acts on `current_turn`.
#[inline]
pub fn turn_index(current_turn: u32, roster_len: usize) -> usize {
    debug_assert!(roster_len > 0, "roster_len must be non-zero");
    (current_turn as usize) % roster_len
}

/// The player whose turn it is: `roster[current_turn mod len]`.
pub fn active_player(roster: &Roster, current_turn: u32) -> Result<&Player, DomainError> {
    if roster.is_empty() {
        return Err(DomainError::invariant(format!(
            "active player requested for empty roster at turn {current_turn}"
        )));
    }
    Ok(&roster.players[turn_index(current_turn, roster.len())])
}

/// The seat that actually acts next, skipping departed seats.
///
/// Returns the turn number that seat will record its move on; every turn
/// between `current_turn` and that number belongs to an inactive seat and is
/// recorded as a pass.
pub fn seat_to_act(roster: &Roster, current_turn: u32) -> Result<(u32, &Player), DomainError> {
    for offset in 0..roster.len() {
        let turn = u32::try_from(offset)
            .ok()
            .and_then(|o| current_turn.checked_add(o))
            .ok_or_else(|| DomainError::invariant("turn counter overflow"))?;
        let player = active_player(roster, turn)?;
        if player.is_active {
            return Ok((turn, player));
        }
    }
    Err(DomainError::invariant(format!(
        "no active player left at turn {current_turn}"
    )))
}

/// Whether `player_id` is the next seat to act.
pub fn is_players_turn(
    player_id: i64,
    roster: &Roster,
    current_turn: u32,
) -> Result<bool, DomainError> {
    Ok(seat_to_act(roster, current_turn)?.1.id == player_id)
}
