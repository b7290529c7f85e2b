//! Unique fixture data so tests sharing one store never collide.

use ulid::Ulid;

/// `{prefix}-{ulid}`, e.g. a game name.
///
/// ```
/// use backend_test_support::unique_helpers::unique_str;
///
/// let a = unique_str("game");
/// assert_ne!(a, unique_str("game"));
/// assert!(a.starts_with("game-"));
/// ```
pub fn unique_str(prefix: &str) -> String {
    format!("{prefix}-{}", Ulid::new())
}

/// A positive user id drawn from the ULID's random bits.
pub fn unique_user_id() -> i64 {
    let bits = Ulid::new().random() as u64;
    ((bits >> 1) as i64).max(1)
}
