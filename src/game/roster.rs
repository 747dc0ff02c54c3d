//! Unit catalog - archetype stats and the canonical roster

use serde::{Deserialize, Serialize};

/// Unit types available to both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Leader - losing it loses the match
    Commander,
    /// Sweeps a full row
    Tank,
    /// Diagonal burst
    Jet,
    /// High single-cell damage
    Sniper,
    /// Small area blast
    Scanner,
    /// Field medic
    Infantry,
}

impl UnitKind {
    pub const ALL: [UnitKind; 6] = [
        UnitKind::Commander,
        UnitKind::Tank,
        UnitKind::Jet,
        UnitKind::Sniper,
        UnitKind::Scanner,
        UnitKind::Infantry,
    ];

    pub fn archetype(self) -> &'static Archetype {
        archetype(self)
    }
}

/// Shape of the area an attack affects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttackPattern {
    /// Exactly the target cell
    Single,
    /// Every cell in the target's row
    Row,
    /// Target plus two steps along each diagonal
    DiagonalBurst,
    /// 3x3 block centred on the target
    AreaBlast,
}

/// Immutable combat attributes of a unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Archetype {
    pub kind: UnitKind,
    pub name: &'static str,
    pub max_hp: i32,
    pub damage: i32,
    pub pattern: AttackPattern,
    /// Hit points restored per heal action, if the unit can heal
    pub heal: Option<i32>,
}

impl Archetype {
    pub fn can_heal(&self) -> bool {
        self.heal.is_some()
    }
}

/// Hit points restored by a single heal action
pub const HEAL_AMOUNT: i32 = 10;

const COMMANDER: Archetype = Archetype {
    kind: UnitKind::Commander,
    name: "Commander",
    max_hp: 64,
    damage: 100,
    pattern: AttackPattern::Single,
    heal: None,
};

const TANK: Archetype = Archetype {
    kind: UnitKind::Tank,
    name: "Tank",
    max_hp: 32,
    damage: 2,
    pattern: AttackPattern::Row,
    heal: None,
};

const JET: Archetype = Archetype {
    kind: UnitKind::Jet,
    name: "Jet",
    max_hp: 20,
    damage: 2,
    pattern: AttackPattern::DiagonalBurst,
    heal: None,
};

const SNIPER: Archetype = Archetype {
    kind: UnitKind::Sniper,
    name: "Sniper",
    max_hp: 15,
    damage: 10,
    pattern: AttackPattern::Single,
    heal: None,
};

const SCANNER: Archetype = Archetype {
    kind: UnitKind::Scanner,
    name: "Scanner",
    max_hp: 20,
    damage: 1,
    pattern: AttackPattern::AreaBlast,
    heal: None,
};

const INFANTRY: Archetype = Archetype {
    kind: UnitKind::Infantry,
    name: "Infantry",
    max_hp: 10,
    damage: 16,
    pattern: AttackPattern::Single,
    heal: Some(HEAL_AMOUNT),
};

/// Look up the attributes of a unit type
pub fn archetype(kind: UnitKind) -> &'static Archetype {
    match kind {
        UnitKind::Commander => &COMMANDER,
        UnitKind::Tank => &TANK,
        UnitKind::Jet => &JET,
        UnitKind::Sniper => &SNIPER,
        UnitKind::Scanner => &SCANNER,
        UnitKind::Infantry => &INFANTRY,
    }
}

/// The roster every side must field, in deployment order
pub const CANONICAL_ROSTER: [UnitKind; 10] = [
    UnitKind::Commander,
    UnitKind::Tank,
    UnitKind::Tank,
    UnitKind::Jet,
    UnitKind::Jet,
    UnitKind::Sniper,
    UnitKind::Sniper,
    UnitKind::Scanner,
    UnitKind::Infantry,
    UnitKind::Infantry,
];

/// How many units of a kind the canonical roster contains
pub fn required_count(kind: UnitKind) -> usize {
    CANONICAL_ROSTER.iter().filter(|k| **k == kind).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_composition() {
        assert_eq!(CANONICAL_ROSTER.len(), 10);
        assert_eq!(required_count(UnitKind::Commander), 1);
        assert_eq!(required_count(UnitKind::Tank), 2);
        assert_eq!(required_count(UnitKind::Jet), 2);
        assert_eq!(required_count(UnitKind::Sniper), 2);
        assert_eq!(required_count(UnitKind::Scanner), 1);
        assert_eq!(required_count(UnitKind::Infantry), 2);
    }

    #[test]
    fn only_infantry_heals() {
        for kind in UnitKind::ALL {
            assert_eq!(kind.archetype().can_heal(), kind == UnitKind::Infantry);
            assert_eq!(kind.archetype().kind, kind);
        }
    }

    #[test]
    fn patterns_match_catalog() {
        assert_eq!(archetype(UnitKind::Tank).pattern, AttackPattern::Row);
        assert_eq!(archetype(UnitKind::Jet).pattern, AttackPattern::DiagonalBurst);
        assert_eq!(archetype(UnitKind::Scanner).pattern, AttackPattern::AreaBlast);
        assert_eq!(archetype(UnitKind::Commander).max_hp, 64);
        assert_eq!(archetype(UnitKind::Sniper).damage, 10);
    }
}
