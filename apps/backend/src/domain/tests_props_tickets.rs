//! Property tests for the ticket ledger.

use proptest::prelude::*;

use crate::domain::test_prelude;
use crate::domain::tickets::{debit, has_ticket, ticket_count, TicketKind, Tickets};
use crate::errors::domain::ValidationKind;

fn ticket_kind() -> impl Strategy<Value = TicketKind> {
    prop::sample::select(TicketKind::ALL.to_vec())
}

fn tickets() -> impl Strategy<Value = Tickets> {
    (0u32..12, 0u32..12, 0u32..12, 0u32..6)
        .prop_map(|(t, b, u, s)| Tickets::new(t, b, u, s))
}

proptest! {
    #![proptest_config(test_prelude::proptest_config())]

    /// Debiting only ever removes one ticket of the chosen kind.
    #[test]
    fn prop_debit_is_exact(start in tickets(), kind in ticket_kind()) {
        match debit(&start, kind) {
            Ok(after) => {
                prop_assert!(has_ticket(&start, kind));
                prop_assert_eq!(ticket_count(&after, kind) + 1, ticket_count(&start, kind));
                for other in TicketKind::ALL.into_iter().filter(|k| *k != kind) {
                    prop_assert_eq!(ticket_count(&after, other), ticket_count(&start, other));
                }
            }
            Err(err) => {
                prop_assert_eq!(ticket_count(&start, kind), 0);
                prop_assert!(err.is_validation(&ValidationKind::InsufficientTickets));
            }
        }
    }

    /// Draining a kind fails exactly when the count is exhausted.
    #[test]
    fn prop_drain_stops_at_zero(start in tickets(), kind in ticket_kind()) {
        let mut current = start;
        for _ in 0..ticket_count(&start, kind) {
            current = debit(&current, kind).unwrap();
        }
        prop_assert_eq!(ticket_count(&current, kind), 0);
        prop_assert!(debit(&current, kind).is_err());
    }
}
