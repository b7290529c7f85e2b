//! Ticket ledger: per-player inventory of the four ticket kinds.

use serde::{Deserialize, Serialize};

use crate::domain::model::Role;
use crate::errors::domain::{DomainError, ValidationKind};

/// Edge kinds on the transport graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Taxi,
    Bus,
    Underground,
}

impl Transport {
    pub const ALL: [Transport; 3] = [Transport::Taxi, Transport::Bus, Transport::Underground];
}

/// Ticket kinds a player spends to move.
///
/// `Special` moves along any transport and the committed move records only
/// `Special`, so the underlying transport stays hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    Taxi,
    Bus,
    Underground,
    Special,
}

impl TicketKind {
    pub const ALL: [TicketKind; 4] = [
        TicketKind::Taxi,
        TicketKind::Bus,
        TicketKind::Underground,
        TicketKind::Special,
    ];

    /// Transports this ticket may travel along.
    pub fn transports(self) -> &'static [Transport] {
        match self {
            TicketKind::Taxi => &[Transport::Taxi],
            TicketKind::Bus => &[Transport::Bus],
            TicketKind::Underground => &[Transport::Underground],
            TicketKind::Special => &Transport::ALL,
        }
    }

    /// Only the evader may spend `Special`.
    pub fn usable_by(self, role: Role) -> bool {
        self != TicketKind::Special || role == Role::Evader
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketKind::Taxi => "taxi",
            TicketKind::Bus => "bus",
            TicketKind::Underground => "underground",
            TicketKind::Special => "special",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "taxi" => Some(TicketKind::Taxi),
            "bus" => Some(TicketKind::Bus),
            "underground" => Some(TicketKind::Underground),
            "special" => Some(TicketKind::Special),
            _ => None,
        }
    }
}

/// Ticket counters for one player. Unsigned, so a count can never go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tickets {
    pub taxi: u32,
    pub bus: u32,
    pub underground: u32,
    pub special: u32,
}

impl Tickets {
    pub fn new(taxi: u32, bus: u32, underground: u32, special: u32) -> Self {
        Self {
            taxi,
            bus,
            underground,
            special,
        }
    }

    fn slot(&mut self, kind: TicketKind) -> &mut u32 {
        match kind {
            TicketKind::Taxi => &mut self.taxi,
            TicketKind::Bus => &mut self.bus,
            TicketKind::Underground => &mut self.underground,
            TicketKind::Special => &mut self.special,
        }
    }
}

/// Number of tickets of `kind` held.
pub fn ticket_count(tickets: &Tickets, kind: TicketKind) -> u32 {
    match kind {
        TicketKind::Taxi => tickets.taxi,
        TicketKind::Bus => tickets.bus,
        TicketKind::Underground => tickets.underground,
        TicketKind::Special => tickets.special,
    }
}

pub fn has_ticket(tickets: &Tickets, kind: TicketKind) -> bool {
    ticket_count(tickets, kind) > 0
}

/// Spend one ticket of `kind`, returning the updated counters.
///
/// The input is never modified; on a zero count the caller keeps its
/// original value and receives `InsufficientTickets`.
pub fn debit(tickets: &Tickets, kind: TicketKind) -> Result<Tickets, DomainError> {
    let mut next = *tickets;
    let slot = next.slot(kind);
    *slot = slot.checked_sub(1).ok_or_else(|| {
        DomainError::validation(
            ValidationKind::InsufficientTickets,
            format!("No {} tickets left", kind.as_str()),
        )
    })?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_is_reserved_for_the_evader() {
        assert!(TicketKind::Special.usable_by(Role::Evader));
        assert!(!TicketKind::Special.usable_by(Role::Seeker));
        assert!(TicketKind::Underground.usable_by(Role::Seeker));
    }

    #[test]
    fn debit_decrements_only_the_chosen_kind() {
        let t = Tickets::new(10, 8, 4, 0);
        let after = debit(&t, TicketKind::Bus).unwrap();
        assert_eq!(after, Tickets::new(10, 7, 4, 0));
        assert_eq!(t, Tickets::new(10, 8, 4, 0));
    }

    #[test]
    fn debit_at_zero_is_insufficient() {
        let t = Tickets::new(1, 0, 0, 0);
        let err = debit(&t, TicketKind::Special).unwrap_err();
        assert!(err.is_validation(&ValidationKind::InsufficientTickets));
        assert!(!has_ticket(&t, TicketKind::Special));
        assert!(has_ticket(&t, TicketKind::Taxi));
    }

    #[test]
    fn special_spans_every_transport() {
        assert_eq!(TicketKind::Special.transports(), &Transport::ALL);
        assert_eq!(TicketKind::Bus.transports(), &[Transport::Bus]);
    }

    #[test]
    fn parse_round_trips_names() {
        for kind in TicketKind::ALL {
            assert_eq!(TicketKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TicketKind::parse("ferry"), None);
    }
}
