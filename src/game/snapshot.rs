//! Snapshot schema for storage/broadcast and fog-of-war player views

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::board::{Board, Cell, Coord, Side};
use super::clock::{Clock, TimeControl};
use super::engine::{Match, Phase};
use super::log::EventLog;
use super::roster::{UnitKind, CANONICAL_ROSTER};

/// Coarse lobby status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Waiting,
    Playing,
}

/// Full match state as persisted and handed to collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub id: Uuid,
    pub name: String,
    pub host_id: String,
    pub guest_id: Option<String>,
    pub status: MatchStatus,
    pub phase: Phase,
    pub mode: TimeControl,
    pub turn: Side,
    pub host_ready: bool,
    pub guest_ready: bool,
    pub host_board: Board,
    pub guest_board: Board,
    pub host_time: f64,
    pub guest_time: f64,
    pub last_move_time: Option<u64>,
    pub created_at: u64,
    pub logs: EventLog,
    pub winner: Option<Side>,
}

impl MatchSnapshot {
    pub fn board(&self, side: Side) -> &Board {
        match side {
            Side::Host => &self.host_board,
            Side::Guest => &self.guest_board,
        }
    }

    pub fn side_of_player(&self, player_id: &str) -> Option<Side> {
        if self.host_id == player_id {
            Some(Side::Host)
        } else if self.guest_id.as_deref() == Some(player_id) {
            Some(Side::Guest)
        } else {
            None
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }
}

/// Stored snapshot that cannot be resumed
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error("finished match has no winner")]
    MissingWinner,

    #[error("phase {0:?} requires a guest")]
    MissingGuest(Phase),

    #[error("{0:?} board holds units before deployment")]
    UndeployedUnits(Side),

    #[error("{0:?} never deployed but the battle started")]
    NotDeployed(Side),

    #[error("{side:?} board holds {count} units")]
    TooManyUnits { side: Side, count: usize },

    #[error("{side:?} unit at {at} has impossible health")]
    InvalidUnit { side: Side, at: Coord },

    #[error("{0:?} has no Commander in an unfinished match")]
    MissingCommander(Side),
}

/// Board rules a stored snapshot must still satisfy
fn check_board(board: &Board, side: Side, ready: bool, phase: Phase) -> Result<(), ResumeError> {
    if !ready {
        if phase == Phase::Playing {
            return Err(ResumeError::NotDeployed(side));
        }
        if board.unit_count() > 0 {
            return Err(ResumeError::UndeployedUnits(side));
        }
        return Ok(());
    }

    let count = board.unit_count();
    if count > CANONICAL_ROSTER.len() {
        return Err(ResumeError::TooManyUnits { side, count });
    }
    for (at, unit) in board.units() {
        let max_hp = unit.kind.archetype().max_hp;
        if unit.max_hp != max_hp || unit.hp <= 0 || unit.hp > max_hp {
            return Err(ResumeError::InvalidUnit { side, at });
        }
    }
    if phase != Phase::Finished && !board.has_commander() {
        return Err(ResumeError::MissingCommander(side));
    }
    Ok(())
}

impl Match {
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            id: self.id,
            name: self.name.clone(),
            host_id: self.host_id.clone(),
            guest_id: self.guest_id.clone(),
            status: if self.phase == Phase::Waiting {
                MatchStatus::Waiting
            } else {
                MatchStatus::Playing
            },
            phase: self.phase,
            mode: self.mode,
            turn: self.turn,
            host_ready: self.host_ready,
            guest_ready: self.guest_ready,
            host_board: self.host_board.clone(),
            guest_board: self.guest_board.clone(),
            host_time: self.clock.remaining(Side::Host),
            guest_time: self.clock.remaining(Side::Guest),
            last_move_time: self.last_move_time,
            created_at: self.created_at,
            logs: self.log.clone(),
            winner: self.winner,
        }
    }

    /// Rebuild a match from a stored snapshot (sequencer restart)
    pub fn from_snapshot(snapshot: MatchSnapshot) -> Result<Self, ResumeError> {
        if snapshot.phase > Phase::Waiting && snapshot.guest_id.is_none() {
            return Err(ResumeError::MissingGuest(snapshot.phase));
        }
        if snapshot.phase == Phase::Finished && snapshot.winner.is_none() {
            return Err(ResumeError::MissingWinner);
        }
        check_board(
            &snapshot.host_board,
            Side::Host,
            snapshot.host_ready,
            snapshot.phase,
        )?;
        check_board(
            &snapshot.guest_board,
            Side::Guest,
            snapshot.guest_ready,
            snapshot.phase,
        )?;

        Ok(Self {
            id: snapshot.id,
            name: snapshot.name,
            host_id: snapshot.host_id,
            guest_id: snapshot.guest_id,
            mode: snapshot.mode,
            phase: snapshot.phase,
            turn: snapshot.turn,
            host_ready: snapshot.host_ready,
            guest_ready: snapshot.guest_ready,
            host_board: snapshot.host_board,
            guest_board: snapshot.guest_board,
            clock: Clock::from_parts(snapshot.host_time, snapshot.guest_time),
            last_move_time: snapshot.last_move_time,
            log: snapshot.logs,
            winner: snapshot.winner,
            created_at: snapshot.created_at,
        })
    }
}

/// What an observer learns about a cell of a board they do not own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FogCell {
    /// Nothing known
    Unknown,
    /// A unit here was hit and survived; type stays hidden
    Hit,
    /// The unit here has attacked and exposed itself
    Revealed {
        #[serde(rename = "type")]
        kind: UnitKind,
        #[serde(rename = "wasHit")]
        was_hit: bool,
    },
}

fn fog(board: &Board) -> Vec<FogCell> {
    board
        .cells()
        .iter()
        .map(|cell| match cell {
            Cell::Empty => FogCell::Unknown,
            Cell::Occupied(unit) if unit.revealed_position => FogCell::Revealed {
                kind: unit.kind,
                was_hit: unit.was_hit,
            },
            Cell::Occupied(unit) if unit.was_hit => FogCell::Hit,
            Cell::Occupied(_) => FogCell::Unknown,
        })
        .collect()
}

/// Per-viewer projection of a snapshot. Participants see their own board in
/// full; every other board is fogged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    /// Viewer's side, absent for non-participants
    pub side: Option<Side>,
    pub status: MatchStatus,
    pub phase: Phase,
    pub mode: TimeControl,
    pub turn: Side,
    pub host_ready: bool,
    pub guest_ready: bool,
    pub guest_joined: bool,
    pub own_board: Option<Board>,
    pub enemy_board: Vec<FogCell>,
    /// Only filled for non-participants, who see both boards fogged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_fog: Option<Vec<FogCell>>,
    pub host_time: f64,
    pub guest_time: f64,
    pub last_move_time: Option<u64>,
    pub logs: EventLog,
    pub winner: Option<Side>,
}

impl PlayerView {
    pub fn for_player(snapshot: &MatchSnapshot, player_id: &str) -> Self {
        Self::for_side(snapshot, snapshot.side_of_player(player_id))
    }

    pub fn for_side(snapshot: &MatchSnapshot, side: Option<Side>) -> Self {
        let (own_board, enemy_board, host_fog) = match side {
            Some(side) => (
                Some(snapshot.board(side).clone()),
                fog(snapshot.board(side.opponent())),
                None,
            ),
            None => (
                None,
                fog(&snapshot.guest_board),
                Some(fog(&snapshot.host_board)),
            ),
        };

        Self {
            id: snapshot.id,
            name: snapshot.name.clone(),
            side,
            status: snapshot.status,
            phase: snapshot.phase,
            mode: snapshot.mode,
            turn: snapshot.turn,
            host_ready: snapshot.host_ready,
            guest_ready: snapshot.guest_ready,
            guest_joined: snapshot.guest_id.is_some(),
            own_board,
            enemy_board,
            host_fog,
            host_time: snapshot.host_time,
            guest_time: snapshot.guest_time,
            last_move_time: snapshot.last_move_time,
            logs: snapshot.logs.clone(),
            winner: snapshot.winner,
        }
    }
}

/// Lobby listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub id: Uuid,
    pub name: String,
    pub mode: TimeControl,
    pub status: MatchStatus,
    pub created_at: u64,
}

impl From<&MatchSnapshot> for MatchSummary {
    fn from(snapshot: &MatchSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name.clone(),
            mode: snapshot.mode,
            status: snapshot.status,
            created_at: snapshot.created_at,
        }
    }
}
