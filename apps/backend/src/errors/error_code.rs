//! Error codes surfaced to clients of the coordination core.
//!
//! Add new codes here; never pass ad-hoc strings as error codes.
//! All error codes are SCREAMING_SNAKE_CASE.

use core::fmt;

/// Centralized error codes.
///
/// Each variant maps to a canonical SCREAMING_SNAKE_CASE string that a UI can
/// switch on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Move acceptance
    /// Proposing player is not the active player
    NotYourTurn,
    /// Player holds no ticket of the chosen kind
    InsufficientTickets,
    /// Ticket kind may not be spent by the player's role
    TicketNotAllowed,
    /// Another commit changed the game first
    RaceLost,
    /// Destination is not reachable with the chosen ticket
    IllegalDestination,
    /// A move is already awaiting commit
    MoveInFlight,
    /// No transport selected
    NoSelection,

    // Lifecycle validation
    /// Operation not allowed in the current game status
    PhaseMismatch,
    /// Roster too small to start
    NotEnoughPlayers,
    /// Roster already at capacity
    GameFull,
    /// Requester is not the hidden-role player
    NotHiddenRolePlayer,
    /// Requester has no player in this game
    NotAMember,
    /// User already joined
    AlreadyJoined,
    /// Generic conflict (fallback for unmatched conflicts)
    Conflict,
    /// General validation error
    ValidationError,

    // Resource Not Found
    /// Game not found
    GameNotFound,
    /// Player not found
    PlayerNotFound,
    /// General not found error
    NotFound,

    // System Errors
    /// Store unreachable or failed transiently
    StoreUnavailable,
    /// Broken protocol invariant
    InvariantViolation,
    /// Session stopped accepting moves after an invariant violation
    SessionHalted,
    /// Data corruption detected
    DataCorruption,
    /// Configuration error
    ConfigError,
    /// Internal error
    InternalError,
}

impl ErrorCode {
    /// Returns the canonical SCREAMING_SNAKE_CASE string for this error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            // Move acceptance
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::InsufficientTickets => "INSUFFICIENT_TICKETS",
            Self::TicketNotAllowed => "TICKET_NOT_ALLOWED",
            Self::RaceLost => "RACE_LOST",
            Self::IllegalDestination => "ILLEGAL_DESTINATION",
            Self::MoveInFlight => "MOVE_IN_FLIGHT",
            Self::NoSelection => "NO_SELECTION",

            // Lifecycle validation
            Self::PhaseMismatch => "PHASE_MISMATCH",
            Self::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            Self::GameFull => "GAME_FULL",
            Self::NotHiddenRolePlayer => "NOT_HIDDEN_ROLE_PLAYER",
            Self::NotAMember => "NOT_A_MEMBER",
            Self::AlreadyJoined => "ALREADY_JOINED",
            Self::Conflict => "CONFLICT",
            Self::ValidationError => "VALIDATION_ERROR",

            // Resource Not Found
            Self::GameNotFound => "GAME_NOT_FOUND",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::NotFound => "NOT_FOUND",

            // System Errors
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::InvariantViolation => "INVARIANT_VIOLATION",
            Self::SessionHalted => "SESSION_HALTED",
            Self::DataCorruption => "DATA_CORRUPTION",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
