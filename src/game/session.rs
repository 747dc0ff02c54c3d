//! Session sequencing - one task per match, commands applied one at a time

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::store::{MatchStore, StoreError};
use crate::util::time::unix_millis;

use super::clock::TimeControl;
use super::engine::{Actor, Command, CommandError, Match, Phase};
use super::snapshot::{MatchSnapshot, ResumeError};

/// Result handed back to whoever submitted a command
pub type CommandReply = Result<MatchSnapshot, CommandError>;

/// Command queued for a session
#[derive(Debug)]
pub struct SessionCommand {
    pub actor: Actor,
    pub command: Command,
    /// Unix millis, stamped where the command entered the server
    pub received_at: u64,
    pub reply: Option<oneshot::Sender<CommandReply>>,
}

/// Session level failures
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] CommandError),

    #[error("match {0} not found")]
    NotFound(Uuid),

    #[error("match session is unavailable")]
    Unavailable,

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("cannot resume match: {0}")]
    Resume(#[from] ResumeError),
}

/// Tunables for sequencer tasks
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Inbound command queue depth per match
    pub command_capacity: usize,
    /// Broadcast buffer per match
    pub snapshot_capacity: usize,
    /// How long a finished match stays readable before its task exits
    pub retention: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            snapshot_capacity: 64,
            retention: Duration::from_secs(300),
        }
    }
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot_tx: broadcast::Sender<MatchSnapshot>,
    latest: watch::Receiver<MatchSnapshot>,
}

impl SessionHandle {
    /// Submit a command stamped with the current time and wait for its result
    pub async fn submit(
        &self,
        actor: Actor,
        command: Command,
    ) -> Result<MatchSnapshot, SessionError> {
        self.submit_at(actor, command, unix_millis()).await
    }

    pub async fn submit_at(
        &self,
        actor: Actor,
        command: Command,
        received_at: u64,
    ) -> Result<MatchSnapshot, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand {
                actor,
                command,
                received_at,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| SessionError::Unavailable)?;

        let reply = reply_rx.await.map_err(|_| SessionError::Unavailable)?;
        Ok(reply?)
    }

    /// Queue a command without waiting; false if the queue is full or closed
    pub fn try_enqueue(&self, actor: Actor, command: Command) -> bool {
        self.command_tx
            .try_send(SessionCommand {
                actor,
                command,
                received_at: unix_millis(),
                reply: None,
            })
            .is_ok()
    }

    /// Stream of snapshots, one per applied command
    pub fn subscribe(&self) -> broadcast::Receiver<MatchSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Latest applied state
    pub fn snapshot(&self) -> MatchSnapshot {
        self.latest.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.latest.borrow().phase
    }

    /// True once the sequencer behind this handle has stopped
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    fn same_session(&self, other: &SessionHandle) -> bool {
        self.command_tx.same_channel(&other.command_tx)
    }
}

/// Exclusive owner of one match's state
pub struct SessionSequencer {
    state: Match,
    command_rx: mpsc::Receiver<SessionCommand>,
    snapshot_tx: broadcast::Sender<MatchSnapshot>,
    latest_tx: watch::Sender<MatchSnapshot>,
    store: MatchStore,
    retention: Duration,
}

impl SessionSequencer {
    pub fn new(state: Match, store: MatchStore, settings: &SessionSettings) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(settings.command_capacity.max(1));
        let (snapshot_tx, _) = broadcast::channel(settings.snapshot_capacity.max(1));
        let (latest_tx, latest) = watch::channel(state.snapshot());

        let handle = SessionHandle {
            id: state.id(),
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            latest,
        };

        let sequencer = Self {
            state,
            command_rx,
            snapshot_tx,
            latest_tx,
            store,
            retention: settings.retention,
        };

        (sequencer, handle)
    }

    /// Drain commands until the queue closes, or until the retention window
    /// passes quietly after the match finished. Hands the queue back so the
    /// caller can unregister the session before it stops accepting commands.
    pub async fn run(mut self) -> mpsc::Receiver<SessionCommand> {
        let match_id = self.state.id();
        info!(match_id = %match_id, phase = ?self.state.phase(), "Session started");

        loop {
            let next = if self.state.phase() == Phase::Finished {
                match tokio::time::timeout(self.retention, self.command_rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        info!(match_id = %match_id, "Retention window elapsed");
                        break;
                    }
                }
            } else {
                self.command_rx.recv().await
            };

            let Some(command) = next else {
                debug!(match_id = %match_id, "Command queue closed");
                break;
            };
            self.handle(command).await;
        }

        info!(match_id = %match_id, "Session ended");
        self.command_rx
    }

    async fn handle(&mut self, queued: SessionCommand) {
        let match_id = self.state.id();
        let name = queued.command.name();
        let phase_before = self.state.phase();

        let reply = match self
            .state
            .apply(&queued.actor, queued.command, queued.received_at)
        {
            Ok(resolution) => {
                debug!(match_id = %match_id, command = name, ?resolution, "Command applied");
                if self.state.phase() != phase_before {
                    info!(
                        match_id = %match_id,
                        from = ?phase_before,
                        to = ?self.state.phase(),
                        winner = ?self.state.winner(),
                        "Phase changed"
                    );
                }
                let snapshot = self.state.snapshot();
                self.publish(&snapshot).await;
                Ok(snapshot)
            }
            Err(err) => {
                if queued.actor == Actor::System {
                    debug!(match_id = %match_id, command = name, reason = %err, "System command skipped");
                } else {
                    warn!(match_id = %match_id, command = name, reason = %err, "Command rejected");
                }
                Err(err)
            }
        };

        if let Some(reply_tx) = queued.reply {
            let _ = reply_tx.send(reply);
        }
    }

    async fn publish(&self, snapshot: &MatchSnapshot) {
        if let Err(e) = self.store.save(snapshot).await {
            error!(match_id = %snapshot.id, error = %e, "Failed to persist snapshot");
        }
        self.latest_tx.send_replace(snapshot.clone());
        // No subscribers is fine
        let _ = self.snapshot_tx.send(snapshot.clone());
    }
}

/// Registry of live sessions keyed by match id
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
    store: MatchStore,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(store: MatchStore, settings: SessionSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
            settings,
        }
    }

    /// Create and start a new match hosted by `host_id`
    pub async fn create(
        self: &Arc<Self>,
        host_id: &str,
        name: &str,
        mode: TimeControl,
    ) -> Result<SessionHandle, SessionError> {
        let state = Match::new(Uuid::new_v4(), name, host_id, mode, unix_millis());
        self.store.create(&state.snapshot()).await?;

        info!(match_id = %state.id(), host_id, mode = mode.display_name(), "Created new match");
        Ok(self.launch(state))
    }

    /// Live session for `id`; handles whose sequencer already stopped are skipped
    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions
            .get(id)
            .map(|s| s.value().clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Live session for `id`, resuming it from storage when needed
    pub async fn get_or_resume(self: &Arc<Self>, id: Uuid) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.get(&id) {
            return Ok(handle);
        }
        let snapshot = self
            .store
            .load(id)
            .await?
            .ok_or(SessionError::NotFound(id))?;
        self.resume(snapshot)
    }

    /// Start a sequencer from a stored snapshot. Returns the existing handle
    /// if the match is already live.
    pub fn resume(self: &Arc<Self>, snapshot: MatchSnapshot) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.get(&snapshot.id) {
            return Ok(handle);
        }
        let state = Match::from_snapshot(snapshot)?;
        info!(match_id = %state.id(), phase = ?state.phase(), "Resuming match");
        Ok(self.launch(state))
    }

    /// Resume every unfinished match in storage (startup)
    pub async fn resume_unfinished(self: &Arc<Self>) -> Result<usize, SessionError> {
        let snapshots = self.store.list_unfinished().await?;
        let mut resumed = 0;
        for snapshot in snapshots {
            let id = snapshot.id;
            match self.resume(snapshot) {
                Ok(_) => resumed += 1,
                Err(e) => warn!(match_id = %id, error = %e, "Skipping unresumable match"),
            }
        }
        Ok(resumed)
    }

    fn launch(self: &Arc<Self>, state: Match) -> SessionHandle {
        let id = state.id();
        match self.sessions.entry(id) {
            Entry::Occupied(existing) if !existing.get().is_closed() => existing.get().clone(),
            entry => {
                let (sequencer, handle) =
                    SessionSequencer::new(state, self.store.clone(), &self.settings);
                drop(entry.insert(handle.clone()));

                let registry = Arc::clone(self);
                let owned = handle.clone();
                tokio::spawn(async move {
                    let queue = sequencer.run().await;
                    registry
                        .sessions
                        .remove_if(&id, |_, current| current.same_session(&owned));
                    info!(match_id = %id, "Match removed from registry");
                    drop(queue);
                });

                handle
            }
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn playing_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().phase() == Phase::Playing)
            .count()
    }

    /// Periodically ask every playing session to settle expired clocks.
    /// The engine itself never watches the wall clock; this is the outer
    /// layer turning silence plus an empty clock into a forfeit.
    pub async fn run_clock_sweeper(self: Arc<Self>, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let playing: Vec<SessionHandle> = self
                .sessions
                .iter()
                .filter(|entry| entry.value().phase() == Phase::Playing)
                .map(|entry| entry.value().clone())
                .collect();

            for handle in playing {
                if !handle.try_enqueue(Actor::System, Command::ClaimTimeout) {
                    debug!(match_id = %handle.id, "Sweep skipped, queue busy");
                }
            }
        }
    }
}
