//! SeaORM -> StoreError translation.
//!
//! The sea-orm store adapter converts every `sea_orm::DbErr` here; services
//! only ever see `StoreError` and, past the move-acceptance boundary,
//! `AppError`.

use tracing::{error, warn};

use crate::store::StoreError;

fn mentions_sqlstate(msg: &str, code: &str) -> bool {
    msg.contains(code) || msg.contains(&format!("SQLSTATE({code})"))
}

/// Map PostgreSQL constraint names to a readable detail.
fn unique_constraint_detail(error_msg: &str) -> &'static str {
    if error_msg.contains("moves_game_turn_key") {
        return "A move for this turn already exists";
    }
    if error_msg.contains("players_game_user_key") {
        return "User already holds a seat in this game";
    }
    "Unique constraint violation"
}

pub fn map_db_err(e: sea_orm::DbErr) -> StoreError {
    let error_msg = e.to_string();

    match &e {
        sea_orm::DbErr::RecordNotFound(what) => {
            return StoreError::NotFound(what.clone());
        }
        sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_) => {
            warn!(raw_error = %error_msg, "Database unavailable");
            return StoreError::Unavailable("Database unavailable".into());
        }
        sea_orm::DbErr::Type(_) | sea_orm::DbErr::TryIntoErr { .. } => {
            error!(raw_error = %error_msg, "Row decode failed");
            return StoreError::Corrupt(error_msg);
        }
        _ => {}
    }

    if mentions_sqlstate(&error_msg, "23505")
        || error_msg.contains("duplicate key value violates unique constraint")
        || error_msg.contains("UNIQUE constraint failed")
    {
        warn!(raw_error = %error_msg, "Unique constraint violation");
        return StoreError::Duplicate(unique_constraint_detail(&error_msg).into());
    }

    if mentions_sqlstate(&error_msg, "40001") || mentions_sqlstate(&error_msg, "40P01") {
        // serialization failure / deadlock: another writer got there first
        warn!(raw_error = %error_msg, "Serialization conflict");
        return StoreError::Unavailable("Transaction serialization failure; retry".into());
    }

    if error_msg.contains("timeout")
        || error_msg.contains("pool")
        || error_msg.contains("unavailable")
    {
        warn!(raw_error = %error_msg, "Database timeout or pool issue");
        return StoreError::Unavailable("Database timeout".into());
    }

    error!(raw_error = %error_msg, "Unhandled database error");
    StoreError::Unavailable("Database operation failed".into())
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(e: sea_orm::DbErr) -> Self {
        map_db_err(e)
    }
}
