//! Property tests for turn sequencing and the reveal schedule (pure domain).
//!
//! Properties tested:
//! - The active player is total and deterministic for any non-empty roster
//! - Consecutive turns walk the roster in join order and wrap around
//! - Roster order does not depend on the input order of players
//! - Reveal turns are exactly 1 and the positive multiples of 3

use proptest::prelude::*;
use time::{Duration, OffsetDateTime};

use crate::domain::model::{Player, Role};
use crate::domain::reveal::is_reveal_turn;
use crate::domain::test_prelude;
use crate::domain::tickets::Tickets;
use crate::domain::turns::{active_player, turn_index, Roster};

fn players(offsets: &[i64]) -> Vec<Player> {
    let base = OffsetDateTime::UNIX_EPOCH + Duration::days(19_000);
    offsets
        .iter()
        .enumerate()
        .map(|(i, off)| Player {
            id: i as i64 + 1,
            game_id: 1,
            user_id: 1000 + i as i64,
            role: if i == 0 { Role::Evader } else { Role::Seeker },
            current_position: 1,
            is_active: true,
            tickets: Tickets::default(),
            joined_at: base + Duration::seconds(*off),
        })
        .collect()
}

proptest! {
    #![proptest_config(test_prelude::proptest_config())]

    #[test]
    fn prop_active_player_total_and_deterministic(
        offsets in prop::collection::vec(0i64..5, 1..7),
        turn in 0u32..10_000,
    ) {
        let roster = Roster::new(players(&offsets));
        let a = active_player(&roster, turn).unwrap().id;
        let b = active_player(&roster, turn).unwrap().id;
        prop_assert_eq!(a, b);
        prop_assert!(turn_index(turn, roster.len()) < roster.len());
    }

    #[test]
    fn prop_turns_cycle_through_roster(
        offsets in prop::collection::vec(0i64..5, 1..7),
        start in 0u32..1_000,
    ) {
        let roster = Roster::new(players(&offsets));
        let n = roster.len() as u32;
        let cycle: Vec<i64> = (start..start + n)
            .map(|t| active_player(&roster, t).unwrap().id)
            .collect();

        let mut sorted = cycle.clone();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), roster.len(), "every player acts once per cycle");
        prop_assert_eq!(
            active_player(&roster, start).unwrap().id,
            active_player(&roster, start + n).unwrap().id
        );
    }

    #[test]
    fn prop_roster_order_ignores_input_order(
        offsets in prop::collection::vec(0i64..3, 1..7),
        rotate in 0usize..7,
    ) {
        let ps = players(&offsets);
        let mut shuffled = ps.clone();
        let k = rotate % shuffled.len();
        shuffled.rotate_left(k);
        shuffled.reverse();
        prop_assert_eq!(Roster::new(ps), Roster::new(shuffled));
    }

    #[test]
    fn prop_reveal_schedule(turn in 0u32..100_000) {
        let expected = turn == 1 || (turn > 0 && turn % 3 == 0);
        prop_assert_eq!(is_reveal_turn(turn), expected);
    }
}
