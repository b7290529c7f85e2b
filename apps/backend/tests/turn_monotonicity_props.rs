//! Property: whatever sequence of proposals arrives, the committed move log
//! reads `0, 1, .., k`, the turn counter equals `k + 1`, and every accepted
//! move debits exactly one ticket.
//!
//! Increase cases locally with: PROPTEST_CASES=256

mod common;

use backend::domain::tickets::TicketKind;
use backend::errors::ErrorCode;
use common::proptest_prelude::proptest_prelude_config;
use common::{seed_in_progress, three_seats, Harness};
use proptest::prelude::*;

const NODES: [u32; 12] = [10, 11, 15, 20, 21, 25, 29, 30, 40, 41, 45, 60];

fn proposal() -> impl Strategy<Value = (usize, TicketKind, u32)> {
    (
        0usize..3,
        prop::sample::select(TicketKind::ALL.to_vec()),
        prop::sample::select(NODES.to_vec()),
    )
}

fn total_tickets(t: &backend::Tickets) -> u32 {
    t.taxi + t.bus + t.underground + t.special
}

proptest! {
    #![proptest_config(proptest_prelude_config())]

    #[test]
    fn move_log_stays_consecutive(proposals in prop::collection::vec(proposal(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        rt.block_on(async {
            let h = Harness::new();
            let game = seed_in_progress(&h.store, &three_seats(), 0).await;
            let tickets_before: u32 = game
                .players
                .iter()
                .map(|p| total_tickets(&p.tickets))
                .sum();
            let acceptor = h.acceptor();
            let mut accepted = 0u32;

            for (seat, ticket, destination) in proposals {
                match acceptor.commit(&game.propose(seat, ticket, destination)).await {
                    Ok(mv) => {
                        prop_assert_eq!(mv.turn_number, accepted);
                        accepted += 1;
                    }
                    Err(err) => {
                        prop_assert!(
                            matches!(
                                err.code(),
                                ErrorCode::NotYourTurn
                                    | ErrorCode::InsufficientTickets
                                    | ErrorCode::TicketNotAllowed
                                    | ErrorCode::IllegalDestination
                            ),
                            "unexpected rejection: {err:?}"
                        );
                    }
                }
            }

            let snap = h.snapshot(game.game_id).await;
            prop_assert_eq!(snap.game.current_turn, accepted);
            let turns: Vec<u32> = snap.moves.iter().map(|m| m.turn_number).collect();
            prop_assert_eq!(turns, (0..accepted).collect::<Vec<_>>());

            let tickets_after: u32 = snap
                .roster
                .players()
                .iter()
                .map(|p| total_tickets(&p.tickets))
                .sum();
            prop_assert_eq!(tickets_before - tickets_after, accepted);
            Ok(())
        })?;
    }
}
