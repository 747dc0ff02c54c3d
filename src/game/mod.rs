//! Game rules and match sequencing

pub mod attack;
pub mod board;
pub mod clock;
pub mod engine;
pub mod log;
pub mod roster;
pub mod session;
pub mod setup;
pub mod snapshot;

pub use board::Coord;
pub use clock::TimeControl;
pub use engine::{Actor, Command, CommandError, Match, Phase};
pub use roster::UnitKind;
pub use session::{SessionError, SessionHandle, SessionRegistry, SessionSettings};
pub use setup::Placement;
pub use snapshot::{MatchSnapshot, MatchStatus, MatchSummary, PlayerView};
