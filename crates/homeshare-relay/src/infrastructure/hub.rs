//! The hub: one task that owns the relay engine.
//!
//! Connection tasks never touch the registry or the session store.  They send
//! [`HubCommand`]s over a bounded channel; the hub applies each command to the
//! [`RelayEngine`] in arrival order and routes the resulting events into each
//! connection's outbound channel.
//!
//! # Why an actor instead of a `Mutex`? (for beginners)
//!
//! The relay engine's rules span several maps at once (a disconnect touches
//! the registry *and* every session the device took part in).  With one owner
//! task there is nothing to lock and no way to interleave two half-applied
//! events: the hub handles exactly one command at a time, which is the
//! ordering the protocol assumes.
//!
//! # Timers
//!
//! - Grace removal: each [`Effect::ScheduleRemoval`] spawns a sleep that
//!   posts the transfer id back to the hub on a private channel.
//! - Idle reaping: a `tokio::time::interval` tick calls
//!   [`RelayEngine::reap_idle`].

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use homeshare_core::{ClientEvent, DeviceId, RelayEvent, TransferId};

use crate::application::relay_engine::{Effect, RelayEngine};
use crate::domain::config::RelayConfig;

/// Outbound half of a connection: events the hub wants written to it.
pub type Outbound = mpsc::UnboundedSender<RelayEvent>;

/// A request from a connection task to the hub.
#[derive(Debug)]
pub enum HubCommand {
    /// A WebSocket handshake completed.
    Connect { id: DeviceId, outbound: Outbound },
    /// A decoded event arrived from device `from`.
    Event { from: DeviceId, event: ClientEvent },
    /// The connection of device `id` closed.
    Disconnect { id: DeviceId },
}

/// Cloneable handle used by connection tasks to reach the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Sends a command, waiting if the hub's queue is full.
    ///
    /// Returns `false` if the hub has stopped.
    pub async fn send(&self, command: HubCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }
}

/// Spawns the hub task and returns a handle to it.
///
/// The hub runs until every [`HubHandle`] clone has been dropped, then clears
/// its state and exits.
pub fn spawn_hub(config: &RelayConfig) -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
    let (expiries_tx, expiries_rx) = mpsc::unbounded_channel();
    let hub = Hub::new(config, expiries_tx);
    let task = tokio::spawn(hub.run(rx, expiries_rx));
    (HubHandle { commands: tx }, task)
}

// ── Hub task ──────────────────────────────────────────────────────────────────

struct Hub {
    engine: RelayEngine,
    connections: HashMap<DeviceId, Outbound>,
    reap_interval: Duration,
    reaper_enabled: bool,
    expiries_tx: mpsc::UnboundedSender<TransferId>,
}

impl Hub {
    fn new(config: &RelayConfig, expiries_tx: mpsc::UnboundedSender<TransferId>) -> Self {
        Self {
            engine: RelayEngine::new(config),
            connections: HashMap::new(),
            reap_interval: config.reap_interval,
            reaper_enabled: config.reaper_enabled(),
            expiries_tx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<HubCommand>,
        mut expiries: mpsc::UnboundedReceiver<TransferId>,
    ) {
        let mut reaper = interval(self.reap_interval.max(Duration::from_millis(10)));
        reaper.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                Some(transfer_id) = expiries.recv() => {
                    self.engine.expire(&transfer_id);
                }
                _ = reaper.tick(), if self.reaper_enabled => {
                    let effects = self.engine.reap_idle(Instant::now().into_std());
                    self.dispatch(effects);
                }
            }
        }

        self.engine.shutdown();
        self.connections.clear();
        info!("relay hub stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        let effects = match command {
            HubCommand::Connect { id, outbound } => {
                self.connections.insert(id, outbound);
                self.engine.connect(id, unix_millis())
            }
            HubCommand::Event { from, event } => {
                debug!("device {from} → relay: {}", event.name());
                self.engine.handle(from, event, Instant::now().into_std())
            }
            HubCommand::Disconnect { id } => {
                self.connections.remove(&id);
                self.engine.disconnect(id)
            }
        };
        self.dispatch(effects);
    }

    fn dispatch(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, event } => self.deliver(to, event),
                Effect::ScheduleRemoval { transfer_id, after } => {
                    let expiries = self.expiries_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        // The hub may be gone by now; nothing left to clean up then.
                        let _ = expiries.send(transfer_id);
                    });
                }
            }
        }
    }

    fn deliver(&mut self, to: DeviceId, event: RelayEvent) {
        let Some(outbound) = self.connections.get(&to) else {
            debug!("no connection for {to}; dropping {}", event.name());
            return;
        };
        if outbound.send(event).is_err() {
            // The writer task ended; its Disconnect command is on the way.
            warn!("connection {to} closed before delivery");
            self.connections.remove(&to);
        }
    }
}

/// Milliseconds since the Unix epoch, for `Device::connected_at`.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
