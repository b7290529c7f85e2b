pub mod lifecycle;
pub mod move_acceptor;
pub mod move_flow;
pub mod session;

pub use lifecycle::GameLifecycle;
pub use move_acceptor::MoveAcceptor;
pub use move_flow::{MoveFlow, ProposedMove};
pub use session::{load_snapshot, GameSession};
