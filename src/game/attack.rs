//! Attack resolution - affected cells and damage application

use std::collections::BTreeSet;

use super::board::{Coord, BOARD_SIZE};
use super::roster::AttackPattern;

/// Diagonal steps taken by a burst from the target cell
const BURST_REACH: i32 = 2;
/// Half-width of the area blast (1 => 3x3)
const BLAST_RADIUS: i32 = 1;

/// Stateless attack helpers shared by every session
pub struct AttackResolver;

impl AttackResolver {
    /// Cells hit by an attack of `pattern` aimed at `target`.
    ///
    /// The set is ordered by (x, y) and never holds a cell twice, so damage
    /// applied by iterating it lands at most once per cell. Off-board targets
    /// affect nothing.
    pub fn resolve(pattern: AttackPattern, target: Coord) -> BTreeSet<Coord> {
        let mut cells = BTreeSet::new();
        if !target.is_valid() {
            return cells;
        }

        match pattern {
            AttackPattern::Single => {
                cells.insert(target);
            }
            AttackPattern::Row => {
                cells.extend((0..BOARD_SIZE).map(|x| Coord { x, y: target.y }));
            }
            AttackPattern::DiagonalBurst => {
                cells.insert(target);
                for (dx, dy) in [(-1, -1), (1, 1), (-1, 1), (1, -1)] {
                    for step in 1..=BURST_REACH {
                        if let Some(at) = target.offset(dx * step, dy * step) {
                            cells.insert(at);
                        }
                    }
                }
            }
            AttackPattern::AreaBlast => {
                for dy in -BLAST_RADIUS..=BLAST_RADIUS {
                    for dx in -BLAST_RADIUS..=BLAST_RADIUS {
                        if let Some(at) = target.offset(dx, dy) {
                            cells.insert(at);
                        }
                    }
                }
            }
        }

        cells
    }

    /// Affected cells ordered by board index (row-major), the order damage is
    /// applied in
    pub fn resolve_in_board_order(pattern: AttackPattern, target: Coord) -> Vec<Coord> {
        let mut cells: Vec<Coord> = Self::resolve(pattern, target).into_iter().collect();
        cells.sort_by_key(Coord::index);
        cells
    }

    /// Apply damage to hit points, returns (new_hp, destroyed)
    pub fn apply_damage(current_hp: i32, damage: i32) -> (i32, bool) {
        let new_hp = current_hp.saturating_sub(damage.max(0));
        (new_hp, new_hp <= 0)
    }

    /// Restore hit points without exceeding the maximum
    pub fn apply_heal(current_hp: i32, amount: i32, max_hp: i32) -> i32 {
        current_hp.saturating_add(amount.max(0)).min(max_hp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c(x: u8, y: u8) -> Coord {
        Coord { x, y }
    }

    fn set(cells: &[(u8, u8)]) -> BTreeSet<Coord> {
        cells.iter().map(|&(x, y)| c(x, y)).collect()
    }

    #[test]
    fn single_hits_only_target() {
        assert_eq!(
            AttackResolver::resolve(AttackPattern::Single, c(5, 2)),
            set(&[(5, 2)])
        );
    }

    #[test]
    fn row_covers_whole_row() {
        let cells = AttackResolver::resolve(AttackPattern::Row, c(3, 4));
        let expected: BTreeSet<Coord> = (0..8).map(|x| c(x, 4)).collect();
        assert_eq!(cells, expected);
    }

    #[test]
    fn diagonal_burst_from_centre() {
        let cells = AttackResolver::resolve(AttackPattern::DiagonalBurst, c(4, 4));
        assert_eq!(
            cells,
            set(&[
                (4, 4),
                (3, 3),
                (2, 2),
                (5, 5),
                (6, 6),
                (3, 5),
                (2, 6),
                (5, 3),
                (6, 2)
            ])
        );
    }

    #[test]
    fn diagonal_burst_clips_at_corner() {
        let cells = AttackResolver::resolve(AttackPattern::DiagonalBurst, c(0, 0));
        assert_eq!(cells, set(&[(0, 0), (1, 1), (2, 2)]));
    }

    #[test]
    fn area_blast_clips_at_corner() {
        let cells = AttackResolver::resolve(AttackPattern::AreaBlast, c(0, 0));
        assert_eq!(cells, set(&[(0, 0), (1, 0), (0, 1), (1, 1)]));
    }

    #[test]
    fn area_blast_is_three_by_three() {
        let cells = AttackResolver::resolve(AttackPattern::AreaBlast, c(4, 4));
        assert_eq!(cells.len(), 9);
        assert!(cells.contains(&c(3, 3)));
        assert!(cells.contains(&c(5, 5)));
        assert!(!cells.contains(&c(6, 6)));
    }

    #[test]
    fn off_board_target_hits_nothing() {
        assert!(AttackResolver::resolve(AttackPattern::Row, c(9, 0)).is_empty());
    }

    #[test]
    fn board_order_is_row_major() {
        let cells = AttackResolver::resolve_in_board_order(AttackPattern::AreaBlast, c(1, 1));
        let indices: Vec<usize> = cells.iter().map(Coord::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 8, 9, 10, 16, 17, 18]);
    }

    #[test]
    fn damage_and_heal_clamp() {
        assert_eq!(AttackResolver::apply_damage(64, 10), (54, false));
        assert_eq!(AttackResolver::apply_damage(10, 16), (-6, true));
        assert_eq!(AttackResolver::apply_heal(5, 10, 10), 10);
        assert_eq!(AttackResolver::apply_heal(5, 10, 32), 15);
    }

    fn pattern() -> impl Strategy<Value = AttackPattern> {
        prop_oneof![
            Just(AttackPattern::Single),
            Just(AttackPattern::Row),
            Just(AttackPattern::DiagonalBurst),
            Just(AttackPattern::AreaBlast),
        ]
    }

    proptest! {
        #[test]
        fn resolved_cells_stay_on_board(p in pattern(), x in 0u8..8, y in 0u8..8) {
            let cells = AttackResolver::resolve(p, c(x, y));
            prop_assert!(!cells.is_empty());
            prop_assert!(cells.len() <= 9);
            prop_assert!(cells.contains(&c(x, y)));
            for cell in &cells {
                prop_assert!(cell.is_valid());
            }
        }

        #[test]
        fn resolution_is_deterministic(p in pattern(), x in 0u8..8, y in 0u8..8) {
            let a = AttackResolver::resolve_in_board_order(p, c(x, y));
            let b = AttackResolver::resolve_in_board_order(p, c(x, y));
            prop_assert_eq!(&a, &b);
            let mut deduped = a.clone();
            deduped.dedup();
            prop_assert_eq!(deduped.len(), a.len());
        }
    }
}
