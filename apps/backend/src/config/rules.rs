//! Table rules: roster size, ticket allotments and start nodes.

use std::env;

use crate::domain::graph::NodeId;
use crate::domain::model::Role;
use crate::domain::tickets::Tickets;
use crate::error::AppError;

/// Start positions of the classic board.
pub const DEFAULT_START_NODES: [NodeId; 18] = [
    13, 26, 29, 34, 50, 53, 91, 94, 103, 112, 117, 132, 138, 141, 155, 174, 197, 198,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    pub min_players: usize,
    pub max_players: usize,
    pub seeker_tickets: Tickets,
    pub evader_tickets: Tickets,
    pub start_nodes: Vec<NodeId>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 6,
            seeker_tickets: Tickets::new(10, 8, 4, 0),
            evader_tickets: Tickets::new(4, 3, 3, 5),
            start_nodes: DEFAULT_START_NODES.to_vec(),
        }
    }
}

impl GameRules {
    /// Ticket allotment handed out at join time.
    pub fn allotment(&self, role: Role) -> Tickets {
        match role {
            Role::Seeker => self.seeker_tickets,
            Role::Evader => self.evader_tickets,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read overrides; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut rules = Self::default();
        if let Some(v) = lookup("PURSUIT_MIN_PLAYERS") {
            rules.min_players = parse_num("PURSUIT_MIN_PLAYERS", &v)?;
        }
        if let Some(v) = lookup("PURSUIT_MAX_PLAYERS") {
            rules.max_players = parse_num("PURSUIT_MAX_PLAYERS", &v)?;
        }
        if let Some(v) = lookup("PURSUIT_SEEKER_TICKETS") {
            rules.seeker_tickets = parse_tickets("PURSUIT_SEEKER_TICKETS", &v)?;
        }
        if let Some(v) = lookup("PURSUIT_EVADER_TICKETS") {
            rules.evader_tickets = parse_tickets("PURSUIT_EVADER_TICKETS", &v)?;
        }
        if let Some(v) = lookup("PURSUIT_START_NODES") {
            rules.start_nodes = parse_list("PURSUIT_START_NODES", &v)?;
        }
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.min_players < 2 {
            return Err(AppError::config("min_players must be at least 2"));
        }
        if self.max_players < self.min_players {
            return Err(AppError::config(format!(
                "max_players ({}) is below min_players ({})",
                self.max_players, self.min_players
            )));
        }
        if self.start_nodes.len() < self.max_players {
            return Err(AppError::config(format!(
                "{} start nodes cannot seat {} players",
                self.start_nodes.len(),
                self.max_players
            )));
        }
        if self.seeker_tickets.special != 0 {
            return Err(AppError::config("seekers cannot hold special tickets"));
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::config(format!("{name}: '{raw}' is not a valid number")))
}

fn parse_list<T: std::str::FromStr>(name: &str, raw: &str) -> Result<Vec<T>, AppError> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_num(name, s))
        .collect()
}

/// `taxi,bus,underground,special`
fn parse_tickets(name: &str, raw: &str) -> Result<Tickets, AppError> {
    match parse_list::<u32>(name, raw)?.as_slice() {
        [taxi, bus, underground, special] => Ok(Tickets::new(*taxi, *bus, *underground, *special)),
        _ => Err(AppError::config(format!(
            "{name}: expected four counts 'taxi,bus,underground,special', got '{raw}'"
        ))),
    }
}
