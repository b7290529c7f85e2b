pub mod games;
pub mod moves;
pub mod players;

pub use games::Entity as Games;
pub use games::Model as GameRow;
pub use moves::Entity as Moves;
pub use moves::Model as MoveRow;
pub use players::Entity as Players;
pub use players::Model as PlayerRow;
