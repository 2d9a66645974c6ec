//! Zone session state and authoritative tick loop

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::snapshot_interval;
use crate::ws::protocol::ServerMsg;
use crate::zone::{
    AuthorityToken, Replicate, ShrinkDriver, Tick, TickRate, ZoneEvent, ZoneMirror, ZoneSettings,
};

use super::snapshot::SnapshotCadence;
use super::SessionCommand;

/// Simulation and broadcast rates for a session
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub simulation_tps: u32,
    pub snapshot_tps: u32,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub seed: u64,
    pub settings: Arc<ZoneSettings>,
    pub tick_rate: u32,
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub broadcast_tx: broadcast::Sender<ServerMsg>,
    pub subscriber_count: Arc<AtomicUsize>,
    /// Latest zone as an observer sees it
    pub mirror: Arc<RwLock<ZoneMirror>>,
}

impl SessionHandle {
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcast_tx.subscribe()
    }

    pub fn mirror(&self) -> ZoneMirror {
        self.mirror.read().clone()
    }
}

/// Registry of all running sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_subscribers(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.value().subscriber_count())
            .sum()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative zone session
pub struct ZoneSession {
    id: Uuid,
    driver: ShrinkDriver,
    rate: TickRate,
    tick: Tick,
    command_rx: mpsc::Receiver<SessionCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    cadence: SnapshotCadence,
    subscribers: HashSet<Uuid>,
    subscriber_count: Arc<AtomicUsize>,
    mirror: Arc<RwLock<ZoneMirror>>,
    had_subscribers: bool,
    stop_requested: bool,
}

impl ZoneSession {
    /// Create a new session
    pub fn new(
        id: Uuid,
        token: AuthorityToken,
        settings: ZoneSettings,
        seed: u64,
        timing: SessionTiming,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(64);
        let subscriber_count = Arc::new(AtomicUsize::new(0));
        let mirror = Arc::new(RwLock::new(ZoneMirror::new()));
        let rate = TickRate::new(timing.simulation_tps);

        let handle = SessionHandle {
            id,
            seed,
            settings: Arc::new(settings.clone()),
            tick_rate: rate.ticks_per_second(),
            command_tx,
            broadcast_tx: broadcast_tx.clone(),
            subscriber_count: subscriber_count.clone(),
            mirror: mirror.clone(),
        };

        let session = Self {
            id,
            driver: ShrinkDriver::new(token, settings, rate, seed),
            rate,
            tick: Tick::default(),
            command_rx,
            broadcast_tx,
            cadence: SnapshotCadence::new(snapshot_interval(
                rate.ticks_per_second(),
                timing.snapshot_tps,
            )),
            subscribers: HashSet::new(),
            subscriber_count,
            mirror,
            had_subscribers: false,
            stop_requested: false,
        };

        (session, handle)
    }

    /// Run the authoritative tick loop until stopped or abandoned
    pub async fn run(mut self) {
        info!(session_id = %self.id, "Zone session started");

        let tick_duration = Duration::from_secs_f64(self.rate.delta_secs());
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let started = Instant::now();

        let reason = loop {
            tick_interval.tick().await;

            // Tick from elapsed time, so late wakeups catch the zone up
            let elapsed = started.elapsed().as_secs_f64();
            self.tick = Tick((elapsed * self.rate.ticks_per_second() as f64 + 1e-6) as u64);

            self.process_commands();

            if self.stop_requested {
                break "stopped";
            }

            self.run_tick();

            if self.had_subscribers && self.subscribers.is_empty() {
                info!(session_id = %self.id, "All observers left, ending session");
                break "abandoned";
            }
        };

        info!(session_id = %self.id, tick = self.tick.0, reason, "Zone session ended");

        let _ = self.broadcast_tx.send(ServerMsg::SessionEnded {
            session_id: self.id,
            reason: reason.to_string(),
        });
    }

    /// Process all pending commands
    fn process_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                SessionCommand::Subscribe { client_id } => {
                    if self.subscribers.insert(client_id) {
                        self.had_subscribers = true;
                        self.cadence.force_next();
                        debug!(session_id = %self.id, client_id = %client_id, "Observer subscribed");
                    }
                }
                SessionCommand::Leave { client_id } => {
                    if self.subscribers.remove(&client_id) {
                        debug!(session_id = %self.id, client_id = %client_id, "Observer left");
                    }
                }
                SessionCommand::Stop => {
                    self.stop_requested = true;
                }
            }
        }

        self.subscriber_count
            .store(self.subscribers.len(), Ordering::Relaxed);
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        let events = self.driver.step(self.tick);

        for event in &events {
            self.log_event(event);
            let _ = self.broadcast_tx.send(ServerMsg::ZoneEvent {
                tick: self.tick.0,
                event: event.clone(),
            });
        }

        if !events.is_empty() {
            self.cadence.force_next();
        }

        if self.cadence.should_send() {
            let zone = self.driver.snapshot(self.tick);
            self.mirror.write().apply(zone);
            let _ = self.broadcast_tx.send(ServerMsg::ZoneSnapshot { zone });
        }
    }

    fn log_event(&self, event: &ZoneEvent) {
        match event {
            ZoneEvent::PhaseStarted {
                index,
                target_radius,
                duration_secs,
                ..
            } => {
                info!(
                    session_id = %self.id,
                    phase = index,
                    target_radius,
                    duration_secs,
                    "Zone phase started"
                );
            }
            ZoneEvent::PhaseCompleted { index, radius, .. } => {
                info!(session_id = %self.id, phase = index, radius, "Zone phase completed");
            }
            ZoneEvent::SequenceCompleted { radius, .. } => {
                info!(session_id = %self.id, radius, "Zone reached its final circle");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::{Phase, PhaseTable, SessionRole};

    fn spawn_session(settings: ZoneSettings) -> (tokio::task::JoinHandle<()>, SessionHandle) {
        let token = SessionRole::Server.claim_authority().unwrap();
        let timing = SessionTiming {
            simulation_tps: 20,
            snapshot_tps: 10,
        };
        let (session, handle) = ZoneSession::new(Uuid::new_v4(), token, settings, 1, timing);
        (tokio::spawn(session.run()), handle)
    }

    fn one_second_phase() -> ZoneSettings {
        ZoneSettings::new(20.0, false, PhaseTable::new(vec![Phase::new(1.0, 10.0)]))
    }

    #[tokio::test(start_paused = true)]
    async fn broadcasts_events_and_snapshots_until_final_circle() {
        let (task, handle) = spawn_session(one_second_phase());
        let mut rx = handle.subscribe();
        let client_id = Uuid::new_v4();
        handle
            .command_tx
            .send(SessionCommand::Subscribe { client_id })
            .await
            .unwrap();

        let mut snapshots = Vec::new();
        loop {
            match rx.recv().await.unwrap() {
                ServerMsg::ZoneSnapshot { zone } => snapshots.push(zone),
                ServerMsg::ZoneEvent {
                    event: ZoneEvent::SequenceCompleted { radius, .. },
                    ..
                } => {
                    assert_eq!(radius, 10.0);
                    break;
                }
                _ => {}
            }
        }

        // The forced snapshot after the final event
        let last = loop {
            if let ServerMsg::ZoneSnapshot { zone } = rx.recv().await.unwrap() {
                break zone;
            }
        };
        assert_eq!(last.radius, 10.0);
        assert!(last.completed);

        assert!(snapshots.len() >= 5);
        assert!(snapshots.windows(2).all(|w| w[1].radius <= w[0].radius));
        assert_eq!(handle.subscriber_count(), 1);
        assert_eq!(handle.mirror().current_radius(), Some(10.0));
        assert!(handle.mirror().has_completed_all_phases());

        handle.command_tx.send(SessionCommand::Stop).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn session_ends_when_last_observer_leaves() {
        let (task, handle) = spawn_session(one_second_phase());
        let mut rx = handle.subscribe();
        let client_id = Uuid::new_v4();

        handle
            .command_tx
            .send(SessionCommand::Subscribe { client_id })
            .await
            .unwrap();
        handle
            .command_tx
            .send(SessionCommand::Leave { client_id })
            .await
            .unwrap();

        task.await.unwrap();

        let ended = loop {
            match rx.recv().await {
                Ok(ServerMsg::SessionEnded { reason, .. }) => break reason,
                Ok(_) => continue,
                Err(e) => panic!("channel closed before SessionEnded: {e}"),
            }
        };
        assert_eq!(ended, "abandoned");
    }

    #[test]
    fn registry_tracks_sessions() {
        let registry = SessionRegistry::new();
        let token = SessionRole::Server.claim_authority().unwrap();
        let timing = SessionTiming {
            simulation_tps: 20,
            snapshot_tps: 10,
        };
        let (_session, handle) =
            ZoneSession::new(Uuid::new_v4(), token, ZoneSettings::default(), 5, timing);
        let id = handle.id;

        registry.insert(handle);
        assert_eq!(registry.active_sessions(), 1);
        assert_eq!(registry.total_subscribers(), 0);
        assert!(registry.get(&id).is_some());

        assert!(registry.remove(&id).is_some());
        assert_eq!(registry.active_sessions(), 0);
    }
}
