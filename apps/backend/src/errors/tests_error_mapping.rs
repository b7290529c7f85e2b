// Unit tests for error mapping - pure domain logic without store dependencies
use crate::errors::domain::{
    ConflictKind, DomainError, InfraErrorKind, NotFoundKind, ValidationKind,
};
use crate::store::StoreError;
use crate::{AppError, ErrorCode};

#[test]
fn maps_move_rejections_to_named_kinds() {
    let app: AppError = DomainError::validation(ValidationKind::OutOfTurn, "not you").into();
    assert!(matches!(app, AppError::NotYourTurn { .. }));
    assert!(!app.restores_selection());
    assert!(!app.is_fatal());

    let app: AppError =
        DomainError::validation(ValidationKind::InsufficientTickets, "no bus").into();
    assert!(matches!(app, AppError::InsufficientTickets { .. }));
    assert!(app.restores_selection());

    let app: AppError =
        DomainError::conflict(ConflictKind::TurnAdvanced, "turn moved on").into();
    assert_eq!(app.code(), ErrorCode::RaceLost);
    assert!(app.restores_selection());
}

#[test]
fn maps_illegal_destination_as_restorable_validation() {
    let app: AppError =
        DomainError::validation(ValidationKind::IllegalDestination, "too far").into();
    assert_eq!(app.code(), ErrorCode::IllegalDestination);
    assert!(app.restores_selection());
}

#[test]
fn reserved_ticket_is_a_plain_validation_error() {
    let app: AppError =
        DomainError::validation(ValidationKind::TicketNotAllowed, "seekers cannot").into();
    assert_eq!(app.code(), ErrorCode::TicketNotAllowed);
    assert!(!app.restores_selection());
    assert!(!app.is_fatal());
}

#[test]
fn maps_conflicts() {
    let joined = DomainError::conflict(ConflictKind::AlreadyJoined, "already here");
    let app: AppError = joined.into();
    assert_eq!(app.code().as_str(), "ALREADY_JOINED");

    let other = DomainError::conflict(ConflictKind::Other("x".into()), "generic conflict");
    let app: AppError = other.into();
    assert_eq!(app.code().as_str(), "CONFLICT");
}

#[test]
fn maps_not_found() {
    let nf = DomainError::not_found(NotFoundKind::Game, "no game");
    let app: AppError = nf.into();
    assert_eq!(app.code().as_str(), "GAME_NOT_FOUND");

    let nf = DomainError::not_found(NotFoundKind::Player, "no player");
    let app: AppError = nf.into();
    assert_eq!(app.code().as_str(), "PLAYER_NOT_FOUND");
}

#[test]
fn maps_infra() {
    let down = DomainError::infra(InfraErrorKind::StoreUnavailable, "down");
    let app: AppError = down.into();
    assert_eq!(app.code().as_str(), "STORE_UNAVAILABLE");
    assert!(!app.is_fatal());

    let corr = DomainError::infra(InfraErrorKind::DataCorruption, "bad");
    let app: AppError = corr.into();
    assert_eq!(app.code().as_str(), "DATA_CORRUPTION");
}

#[test]
fn invariant_violations_are_fatal() {
    let app: AppError = DomainError::invariant("empty roster").into();
    assert_eq!(app.code(), ErrorCode::InvariantViolation);
    assert!(app.is_fatal());
    assert!(!app.restores_selection());
}

#[test]
fn store_errors_never_escape_uninterpreted() {
    let app: AppError = StoreError::Conflict {
        expected_turn: 4,
        actual_turn: Some(5),
    }
    .into();
    assert_eq!(app.code(), ErrorCode::RaceLost);

    let app: AppError = StoreError::Unavailable("connection reset".into()).into();
    assert_eq!(app.code(), ErrorCode::StoreUnavailable);

    let app: AppError = StoreError::NotFound("game 9".into()).into();
    assert_eq!(app.code(), ErrorCode::NotFound);
}
