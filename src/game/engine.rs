//! Turn engine - authoritative match state machine
//!
//! A [`Match`] is only ever changed through [`Match::apply`]. Each command is
//! validated and applied to a scratch copy which replaces the live state only
//! when the whole command succeeds, so a rejection never leaves a partial
//! update behind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attack::AttackResolver;
use super::board::{Board, Coord, Side};
use super::clock::{elapsed_secs, Clock, TimeControl};
use super::log::{EventLog, LogKind};
use super::roster::{archetype, UnitKind};
use super::setup::{Placement, PlacementError, SetupValidator};

/// Match lifecycle. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Host created the match, no guest yet
    Waiting,
    /// Both present, deploying units
    Setup,
    /// Turns in progress
    Playing,
    /// Terminal
    Finished,
}

/// Who issued a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// A player identified by the opaque id from the identity provider
    Player(String),
    /// The server itself (clock sweeper)
    System,
}

impl Actor {
    pub fn player(id: impl Into<String>) -> Self {
        Actor::Player(id.into())
    }
}

/// Commands accepted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Join,
    SubmitPlacement { placements: Vec<Placement> },
    Move { source: Coord, target: Coord },
    Attack { source: Coord, target: Coord },
    Heal { source: Coord, target: Coord },
    Surrender,
    /// Claim a win because the side on turn has run out of time
    ClaimTimeout,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::SubmitPlacement { .. } => "submit_placement",
            Command::Move { .. } => "move",
            Command::Attack { .. } => "attack",
            Command::Heal { .. } => "heal",
            Command::Surrender => "surrender",
            Command::ClaimTimeout => "claim_timeout",
        }
    }
}

/// What an accepted command did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Resolution {
    Joined,
    PlacementAccepted { battle_started: bool },
    Moved,
    Attacked { hits: usize, kills: Vec<UnitKind> },
    Healed { hp: i32 },
    Surrendered { winner: Side },
    CommanderDestroyed { winner: Side },
    ClockExpired { loser: Side },
}

/// Rejection reasons. A rejected command leaves the match untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("match is finished")]
    MatchFinished,

    #[error("command not allowed during the {0:?} phase")]
    WrongPhase(Phase),

    #[error("not a participant in this match")]
    NotParticipant,

    #[error("only players may issue this command")]
    SystemNotAllowed,

    #[error("the host cannot join their own match")]
    CannotJoinOwnMatch,

    #[error("placement already submitted")]
    AlreadyReady,

    #[error("not your turn")]
    NotYourTurn,

    #[error("cell {0} is off the board")]
    OutOfBounds(Coord),

    /// Raw client coordinates that do not fit a board cell at all
    #[error("cell is off the board")]
    OffBoard,

    #[error("no friendly unit at {0}")]
    NoUnitAtSource(Coord),

    #[error("cell {0} is occupied")]
    TargetOccupied(Coord),

    #[error("{0:?} cannot heal")]
    CannotHeal(UnitKind),

    #[error("no damaged friendly unit at {0}")]
    NothingToHeal(Coord),

    #[error("opponent still has time on the clock")]
    ClockRunning,

    #[error("invalid placement: {0}")]
    Placement(#[from] PlacementError),
}

impl CommandError {
    /// Stable machine-readable category
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Placement(_) => "placement_invalid",
            _ => "invalid_command",
        }
    }
}

/// Authoritative state of one match
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) host_id: String,
    pub(super) guest_id: Option<String>,
    pub(super) mode: TimeControl,
    pub(super) phase: Phase,
    pub(super) turn: Side,
    pub(super) host_ready: bool,
    pub(super) guest_ready: bool,
    pub(super) host_board: Board,
    pub(super) guest_board: Board,
    pub(super) clock: Clock,
    pub(super) last_move_time: Option<u64>,
    pub(super) log: EventLog,
    pub(super) winner: Option<Side>,
    pub(super) created_at: u64,
}

impl Match {
    /// New match in `Waiting`, empty boards and full clocks
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        host_id: impl Into<String>,
        mode: TimeControl,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            host_id: host_id.into(),
            guest_id: None,
            mode,
            phase: Phase::Waiting,
            turn: Side::Host,
            host_ready: false,
            guest_ready: false,
            host_board: Board::empty(),
            guest_board: Board::empty(),
            clock: Clock::new(mode),
            last_move_time: None,
            log: EventLog::new(),
            winner: None,
            created_at: now_ms,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    #[cfg(test)]
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn board(&self, side: Side) -> &Board {
        match side {
            Side::Host => &self.host_board,
            Side::Guest => &self.guest_board,
        }
    }

    pub fn is_ready(&self, side: Side) -> bool {
        match side {
            Side::Host => self.host_ready,
            Side::Guest => self.guest_ready,
        }
    }

    /// Side played by a given player id, if any
    pub fn side_of_player(&self, player_id: &str) -> Option<Side> {
        if self.host_id == player_id {
            Some(Side::Host)
        } else if self.guest_id.as_deref() == Some(player_id) {
            Some(Side::Guest)
        } else {
            None
        }
    }

    /// Validate and apply a command atomically
    pub fn apply(
        &mut self,
        actor: &Actor,
        command: Command,
        now_ms: u64,
    ) -> Result<Resolution, CommandError> {
        let mut next = self.clone();
        let resolution = next.apply_in_place(actor, command, now_ms)?;
        *self = next;
        Ok(resolution)
    }

    fn apply_in_place(
        &mut self,
        actor: &Actor,
        command: Command,
        now_ms: u64,
    ) -> Result<Resolution, CommandError> {
        if self.phase == Phase::Finished {
            return Err(CommandError::MatchFinished);
        }

        match command {
            Command::Join => self.join(actor, now_ms),
            Command::SubmitPlacement { placements } => {
                let side = self.side_of(actor)?;
                self.submit_placement(side, &placements, now_ms)
            }
            Command::Surrender => {
                let side = self.side_of(actor)?;
                self.surrender(side, now_ms)
            }
            Command::ClaimTimeout => self.claim_timeout(actor, now_ms),
            action @ (Command::Move { .. } | Command::Attack { .. } | Command::Heal { .. }) => {
                let side = self.side_of(actor)?;
                self.take_turn(side, action, now_ms)
            }
        }
    }

    fn side_of(&self, actor: &Actor) -> Result<Side, CommandError> {
        match actor {
            Actor::System => Err(CommandError::SystemNotAllowed),
            Actor::Player(id) => self.side_of_player(id).ok_or(CommandError::NotParticipant),
        }
    }

    fn require_phase(&self, phase: Phase) -> Result<(), CommandError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(CommandError::WrongPhase(self.phase))
        }
    }

    fn advance_to(&mut self, phase: Phase) {
        debug_assert!(phase > self.phase, "phase must only advance");
        self.phase = phase;
    }

    fn finish(&mut self, winner: Side) {
        self.winner = Some(winner);
        self.advance_to(Phase::Finished);
    }

    fn join(&mut self, actor: &Actor, now_ms: u64) -> Result<Resolution, CommandError> {
        self.require_phase(Phase::Waiting)?;
        let player_id = match actor {
            Actor::System => return Err(CommandError::SystemNotAllowed),
            Actor::Player(id) => id,
        };
        if *player_id == self.host_id {
            return Err(CommandError::CannotJoinOwnMatch);
        }

        self.guest_id = Some(player_id.clone());
        self.advance_to(Phase::Setup);
        self.log
            .push(LogKind::System, "Guest joined. Deploy your forces.", now_ms);
        Ok(Resolution::Joined)
    }

    fn submit_placement(
        &mut self,
        side: Side,
        placements: &[Placement],
        now_ms: u64,
    ) -> Result<Resolution, CommandError> {
        self.require_phase(Phase::Setup)?;
        if self.is_ready(side) {
            return Err(CommandError::AlreadyReady);
        }

        let board = SetupValidator::validate(placements, side)?;
        match side {
            Side::Host => {
                self.host_board = board;
                self.host_ready = true;
            }
            Side::Guest => {
                self.guest_board = board;
                self.guest_ready = true;
            }
        }

        let battle_started = self.host_ready && self.guest_ready;
        if battle_started {
            self.advance_to(Phase::Playing);
            self.clock = Clock::new(self.mode);
            self.turn = Side::Host;
            self.last_move_time = Some(now_ms);
            self.log.push(
                LogKind::System,
                "The battle has begun! Deployment phase complete.",
                now_ms,
            );
        }

        Ok(Resolution::PlacementAccepted { battle_started })
    }

    fn surrender(&mut self, side: Side, now_ms: u64) -> Result<Resolution, CommandError> {
        if !matches!(self.phase, Phase::Setup | Phase::Playing) {
            return Err(CommandError::WrongPhase(self.phase));
        }

        let winner = side.opponent();
        self.finish(winner);
        self.log.push(
            LogKind::Surrender,
            format!("{} has surrendered.", side.label()),
            now_ms,
        );
        Ok(Resolution::Surrendered { winner })
    }

    fn claim_timeout(&mut self, actor: &Actor, now_ms: u64) -> Result<Resolution, CommandError> {
        self.require_phase(Phase::Playing)?;
        if let Actor::Player(_) = actor {
            self.side_of(actor)?;
        }

        let on_turn = self.turn;
        if self.clock.remaining_at(on_turn, self.elapsed_since_handoff(now_ms)) > 0.0 {
            return Err(CommandError::ClockRunning);
        }
        Ok(self.forfeit_on_time(on_turn, now_ms))
    }

    fn elapsed_since_handoff(&self, now_ms: u64) -> f64 {
        self.last_move_time
            .map_or(0.0, |last| elapsed_secs(last, now_ms))
    }

    fn forfeit_on_time(&mut self, loser: Side, now_ms: u64) -> Resolution {
        let elapsed = self.elapsed_since_handoff(now_ms);
        self.clock.debit(loser, elapsed);
        self.last_move_time = Some(now_ms);

        let winner = loser.opponent();
        self.finish(winner);
        self.log.push(
            LogKind::Win,
            format!(
                "{} ran out of time. Victory for {}.",
                loser.label(),
                winner.label()
            ),
            now_ms,
        );
        Resolution::ClockExpired { loser }
    }

    fn take_turn(
        &mut self,
        side: Side,
        action: Command,
        now_ms: u64,
    ) -> Result<Resolution, CommandError> {
        self.require_phase(Phase::Playing)?;
        if side != self.turn {
            return Err(CommandError::NotYourTurn);
        }

        if self.clock.remaining_at(side, self.elapsed_since_handoff(now_ms)) <= 0.0 {
            return Ok(self.forfeit_on_time(side, now_ms));
        }

        let resolution = match action {
            Command::Move { source, target } => self.move_unit(side, source, target, now_ms)?,
            Command::Attack { source, target } => self.attack(side, source, target, now_ms)?,
            Command::Heal { source, target } => self.heal(side, source, target, now_ms)?,
            _ => return Err(CommandError::WrongPhase(self.phase)),
        };

        self.end_turn(side, now_ms);
        Ok(resolution)
    }

    /// Debit the actor's clock and hand the turn over
    fn end_turn(&mut self, side: Side, now_ms: u64) {
        let elapsed = self.elapsed_since_handoff(now_ms);
        self.clock.debit(side, elapsed);
        self.last_move_time = Some(now_ms);
        if self.phase == Phase::Playing {
            self.turn = side.opponent();
        }
    }

    fn move_unit(
        &mut self,
        side: Side,
        source: Coord,
        target: Coord,
        now_ms: u64,
    ) -> Result<Resolution, CommandError> {
        check_bounds(source)?;
        check_bounds(target)?;

        let board = match side {
            Side::Host => &mut self.host_board,
            Side::Guest => &mut self.guest_board,
        };
        if board.unit_at(source).is_none() {
            return Err(CommandError::NoUnitAtSource(source));
        }
        if board.unit_at(target).is_some() {
            return Err(CommandError::TargetOccupied(target));
        }

        let unit = board
            .take(source)
            .ok_or(CommandError::NoUnitAtSource(source))?;
        board
            .place(target, unit)
            .map_err(|_| CommandError::TargetOccupied(target))?;

        self.log.push(
            LogKind::Move,
            format!("{} moved a unit.", side.label()),
            now_ms,
        );
        Ok(Resolution::Moved)
    }

    fn attack(
        &mut self,
        side: Side,
        source: Coord,
        target: Coord,
        now_ms: u64,
    ) -> Result<Resolution, CommandError> {
        check_bounds(source)?;
        check_bounds(target)?;

        let (own, enemy) = match side {
            Side::Host => (&mut self.host_board, &mut self.guest_board),
            Side::Guest => (&mut self.guest_board, &mut self.host_board),
        };
        let attacker = own
            .unit_at(source)
            .map(|u| archetype(u.kind))
            .ok_or(CommandError::NoUnitAtSource(source))?;

        let mut hits = 0;
        let mut kills = Vec::new();
        for at in AttackResolver::resolve_in_board_order(attacker.pattern, target) {
            let Some(unit) = enemy.unit_at_mut(at) else {
                continue;
            };
            hits += 1;

            let (hp, destroyed) = AttackResolver::apply_damage(unit.hp, attacker.damage);
            if !destroyed {
                unit.hp = hp;
                unit.was_hit = true;
                continue;
            }

            let Some(fallen) = enemy.take(at) else {
                continue;
            };
            kills.push(fallen.kind);
            self.log.push(
                LogKind::Kill,
                format!(
                    "Enemy {} destroyed by {}!",
                    archetype(fallen.kind).name,
                    attacker.name
                ),
                now_ms,
            );

            if fallen.kind == UnitKind::Commander {
                self.log.push(
                    LogKind::Win,
                    format!(
                        "The enemy Commander has fallen! Victory for {}.",
                        side.label()
                    ),
                    now_ms,
                );
                self.finish(side);
                return Ok(Resolution::CommanderDestroyed { winner: side });
            }
        }

        if let Some(unit) = own.unit_at_mut(source) {
            unit.revealed_position = true;
        }

        let outcome = if hits > 0 { "HIT!" } else { "Miss." };
        self.log.push(
            LogKind::Attack,
            format!("{} attacked with {}. {}", side.label(), attacker.name, outcome),
            now_ms,
        );
        Ok(Resolution::Attacked { hits, kills })
    }

    fn heal(
        &mut self,
        side: Side,
        source: Coord,
        target: Coord,
        now_ms: u64,
    ) -> Result<Resolution, CommandError> {
        check_bounds(source)?;
        check_bounds(target)?;

        let board = match side {
            Side::Host => &mut self.host_board,
            Side::Guest => &mut self.guest_board,
        };
        let healer = board
            .unit_at(source)
            .map(|u| archetype(u.kind))
            .ok_or(CommandError::NoUnitAtSource(source))?;
        let amount = healer.heal.ok_or(CommandError::CannotHeal(healer.kind))?;

        let patient = board
            .unit_at_mut(target)
            .filter(|u| u.is_damaged())
            .ok_or(CommandError::NothingToHeal(target))?;
        patient.hp = AttackResolver::apply_heal(patient.hp, amount, patient.max_hp);
        let hp = patient.hp;

        self.log.push(
            LogKind::Heal,
            format!("{} performed field repairs.", side.label()),
            now_ms,
        );
        Ok(Resolution::Healed { hp })
    }
}

fn check_bounds(at: Coord) -> Result<(), CommandError> {
    if at.is_valid() {
        Ok(())
    } else {
        Err(CommandError::OutOfBounds(at))
    }
}
