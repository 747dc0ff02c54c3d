//! Deployment validation and seeded random layouts

use std::collections::{BTreeMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::board::{Board, Coord, Side, Unit, BOARD_SIZE};
use super::roster::{required_count, UnitKind, CANONICAL_ROSTER};

/// One unit in a proposed deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub x: u8,
    pub y: u8,
    pub kind: UnitKind,
}

impl Placement {
    pub fn coord(&self) -> Coord {
        Coord {
            x: self.x,
            y: self.y,
        }
    }
}

/// Why a deployment was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("expected {expected} units, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("expected {expected} {kind:?} units, got {actual}")]
    WrongComposition {
        kind: UnitKind,
        expected: usize,
        actual: usize,
    },

    #[error("cell {0} is off the board")]
    OutOfBounds(Coord),

    #[error("cell {0} is outside the deployment zone")]
    OutOfZone(Coord),

    #[error("more than one unit on cell {0}")]
    Overlap(Coord),
}

/// Checks deployments against roster and zone rules
pub struct SetupValidator;

impl SetupValidator {
    /// Validate a proposal for `side` and build its starting board.
    ///
    /// Units are created fresh at full health; nothing from the proposal but
    /// position and kind is trusted.
    pub fn validate(placements: &[Placement], side: Side) -> Result<Board, PlacementError> {
        let mut seen = HashSet::new();
        for placement in placements {
            let at = placement.coord();
            if !at.is_valid() {
                return Err(PlacementError::OutOfBounds(at));
            }
            if !seen.insert(at) {
                return Err(PlacementError::Overlap(at));
            }
            if !side.owns_row(at.y) {
                return Err(PlacementError::OutOfZone(at));
            }
        }

        if placements.len() != CANONICAL_ROSTER.len() {
            return Err(PlacementError::WrongCount {
                expected: CANONICAL_ROSTER.len(),
                actual: placements.len(),
            });
        }

        let mut counts: BTreeMap<UnitKind, usize> = BTreeMap::new();
        for placement in placements {
            *counts.entry(placement.kind).or_default() += 1;
        }
        for kind in UnitKind::ALL {
            let expected = required_count(kind);
            let actual = counts.get(&kind).copied().unwrap_or(0);
            if actual != expected {
                return Err(PlacementError::WrongComposition {
                    kind,
                    expected,
                    actual,
                });
            }
        }

        let mut board = Board::empty();
        for placement in placements {
            board
                .place(placement.coord(), Unit::new(placement.kind))
                .map_err(|_| PlacementError::Overlap(placement.coord()))?;
        }
        Ok(board)
    }
}

/// Every cell a side may deploy into
pub fn zone_cells(side: Side) -> Vec<Coord> {
    (0..BOARD_SIZE)
        .filter(|y| side.owns_row(*y))
        .flat_map(|y| (0..BOARD_SIZE).map(move |x| Coord { x, y }))
        .collect()
}

/// Draw a valid canonical layout for `side` from the given random source
pub fn random_placement<R: Rng + ?Sized>(side: Side, rng: &mut R) -> Vec<Placement> {
    let mut cells = zone_cells(side);
    cells.shuffle(rng);
    CANONICAL_ROSTER
        .iter()
        .zip(cells)
        .map(|(kind, at)| Placement {
            x: at.x,
            y: at.y,
            kind: *kind,
        })
        .collect()
}
