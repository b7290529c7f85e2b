use thiserror::Error;

use crate::errors::domain::{
    ConflictKind, DomainError, InfraErrorKind, NotFoundKind, ValidationKind,
};
use crate::errors::ErrorCode;

/// Boundary error taxonomy.
///
/// Every move-commit failure is converted into one of these before it reaches
/// a caller; raw store errors never cross the service boundary uninterpreted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Not your turn: {detail}")]
    NotYourTurn { detail: String },
    #[error("Insufficient tickets: {detail}")]
    InsufficientTickets { detail: String },
    #[error("Race lost: {detail}")]
    RaceLost { detail: String },
    #[error("Store unavailable: {detail}")]
    StoreUnavailable { detail: String },
    #[error("Invariant violation: {detail}")]
    InvariantViolation { detail: String },
    #[error("Validation error: {detail}")]
    Validation { code: ErrorCode, detail: String },
    #[error("Not found: {detail}")]
    NotFound { code: ErrorCode, detail: String },
    #[error("Conflict: {detail}")]
    Conflict { code: ErrorCode, detail: String },
    #[error("Session halted: {detail}")]
    SessionHalted { detail: String },
    #[error("Configuration error: {detail}")]
    Config { detail: String },
    #[error("Internal error: {detail}")]
    Internal { code: ErrorCode, detail: String },
}

impl AppError {
    /// Extract the error code from any error variant
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotYourTurn { .. } => ErrorCode::NotYourTurn,
            AppError::InsufficientTickets { .. } => ErrorCode::InsufficientTickets,
            AppError::RaceLost { .. } => ErrorCode::RaceLost,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::InvariantViolation { .. } => ErrorCode::InvariantViolation,
            AppError::Validation { code, .. } => *code,
            AppError::NotFound { code, .. } => *code,
            AppError::Conflict { code, .. } => *code,
            AppError::SessionHalted { .. } => ErrorCode::SessionHalted,
            AppError::Config { .. } => ErrorCode::ConfigError,
            AppError::Internal { code, .. } => *code,
        }
    }

    /// Extract the error detail from any error variant
    pub fn detail(&self) -> &str {
        match self {
            AppError::NotYourTurn { detail }
            | AppError::InsufficientTickets { detail }
            | AppError::RaceLost { detail }
            | AppError::StoreUnavailable { detail }
            | AppError::InvariantViolation { detail }
            | AppError::SessionHalted { detail }
            | AppError::Config { detail } => detail,
            AppError::Validation { detail, .. }
            | AppError::NotFound { detail, .. }
            | AppError::Conflict { detail, .. }
            | AppError::Internal { detail, .. } => detail,
        }
    }

    /// Fatal errors indicate a bug in the re-validation protocol and stop
    /// further move submission for the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::InvariantViolation { .. } | AppError::SessionHalted { .. }
        )
    }

    /// Whether the player's transport selection survives this rejection.
    ///
    /// `NotYourTurn` discards the stale intent; the player must re-evaluate
    /// from current state.
    pub fn restores_selection(&self) -> bool {
        match self {
            AppError::InsufficientTickets { .. }
            | AppError::RaceLost { .. }
            | AppError::StoreUnavailable { .. } => true,
            AppError::Validation { code, .. } => *code == ErrorCode::IllegalDestination,
            _ => false,
        }
    }

    pub fn not_your_turn(detail: impl Into<String>) -> Self {
        Self::NotYourTurn {
            detail: detail.into(),
        }
    }

    pub fn insufficient_tickets(detail: impl Into<String>) -> Self {
        Self::InsufficientTickets {
            detail: detail.into(),
        }
    }

    pub fn race_lost(detail: impl Into<String>) -> Self {
        Self::RaceLost {
            detail: detail.into(),
        }
    }

    pub fn store_unavailable(detail: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            detail: detail.into(),
        }
    }

    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            detail: detail.into(),
        }
    }

    pub fn invalid(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Validation {
            code,
            detail: detail.into(),
        }
    }

    pub fn not_found(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            detail: detail.into(),
        }
    }

    pub fn session_halted(detail: impl Into<String>) -> Self {
        Self::SessionHalted {
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            detail: detail.into(),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(kind, detail) => match kind {
                ValidationKind::OutOfTurn => AppError::NotYourTurn { detail },
                ValidationKind::InsufficientTickets => AppError::InsufficientTickets { detail },
                ValidationKind::TicketNotAllowed => {
                    AppError::invalid(ErrorCode::TicketNotAllowed, detail)
                }
                ValidationKind::IllegalDestination => {
                    AppError::invalid(ErrorCode::IllegalDestination, detail)
                }
                ValidationKind::PhaseMismatch => AppError::invalid(ErrorCode::PhaseMismatch, detail),
                ValidationKind::MoveInFlight => AppError::invalid(ErrorCode::MoveInFlight, detail),
                ValidationKind::NoSelection => AppError::invalid(ErrorCode::NoSelection, detail),
                ValidationKind::NotEnoughPlayers => {
                    AppError::invalid(ErrorCode::NotEnoughPlayers, detail)
                }
                ValidationKind::GameFull => AppError::invalid(ErrorCode::GameFull, detail),
                ValidationKind::NotHiddenRolePlayer => {
                    AppError::invalid(ErrorCode::NotHiddenRolePlayer, detail)
                }
                ValidationKind::NotAMember => AppError::invalid(ErrorCode::NotAMember, detail),
                ValidationKind::Other(_) => AppError::invalid(ErrorCode::ValidationError, detail),
            },
            DomainError::Conflict(kind, detail) => match kind {
                ConflictKind::TurnAdvanced => AppError::RaceLost { detail },
                ConflictKind::AlreadyJoined => AppError::Conflict {
                    code: ErrorCode::AlreadyJoined,
                    detail,
                },
                ConflictKind::Other(_) => AppError::Conflict {
                    code: ErrorCode::Conflict,
                    detail,
                },
            },
            DomainError::NotFound(kind, detail) => {
                let code = match kind {
                    NotFoundKind::Game => ErrorCode::GameNotFound,
                    NotFoundKind::Player => ErrorCode::PlayerNotFound,
                    NotFoundKind::Other(_) => ErrorCode::NotFound,
                };
                AppError::NotFound { code, detail }
            }
            DomainError::Infra(kind, detail) => match kind {
                InfraErrorKind::StoreUnavailable => AppError::StoreUnavailable { detail },
                InfraErrorKind::DataCorruption => AppError::Internal {
                    code: ErrorCode::DataCorruption,
                    detail,
                },
                InfraErrorKind::Other(_) => AppError::Internal {
                    code: ErrorCode::InternalError,
                    detail,
                },
            },
            DomainError::Invariant(detail) => AppError::InvariantViolation { detail },
        }
    }
}

impl From<crate::store::StoreError> for AppError {
    fn from(err: crate::store::StoreError) -> Self {
        AppError::from(DomainError::from(err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        AppError::from(crate::infra::db_errors::map_db_err(e))
    }
}

impl From<std::env::VarError> for AppError {
    fn from(e: std::env::VarError) -> Self {
        AppError::config(format!("env var error: {e}"))
    }
}
