//! Broadcast hub
//!
//! One coordinator task owns the subscriber registry and consumes a bounded
//! command queue. Registration, unregistration, delivery passes and the
//! removal of failed subscribers are all executed by that task, one command
//! at a time, so the registry is never mutated from two places.
//!
//! ```text
//!  register / unregister / submit / flush
//!        │            (bounded mpsc, backpressure on full)
//!        ▼
//!  ┌──────────────┐  publish after mutation  ┌───────────────┐
//!  │ Coordinator  │ ───────────────────────► │ watch channel │ ◄── snapshot() / count()
//!  └──────┬───────┘                          └───────────────┘
//!         │ per event: serialize once, filter, write (bounded), batch-remove failures
//!         ▼
//!   sink 1   sink 2   ...   sink N
//! ```
//!
//! A pass finishes before the next command is taken, so events submitted by
//! one producer reach each subscriber in submission order.
//!
//! Payloads are encoded when a [`BroadcastEvent`] is built, so an unencodable
//! payload fails at construction and never enters the queue. The pass only
//! wraps the already-encoded value in its envelope.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use crate::client::{SubscriberId, SubscriberInfo, SubscriberSink};
use crate::error::{BroadcasterError, Result, SinkError};
use crate::events::{BroadcastEvent, EventKind};
use crate::filter::{matches, SubscriptionFilter};
use crate::stats::{DeliveryCounters, DeliveryStats};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Read-only registry view published after every mutation
pub type RegistrySnapshot = Arc<BTreeMap<SubscriberId, SubscriberInfo>>;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Pending commands before `submit` starts waiting
    pub queue_capacity: usize,
    /// Deadline for a single write to one subscriber
    pub write_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

enum Command {
    Register {
        id: SubscriberId,
        sink: Arc<dyn SubscriberSink>,
        filter: SubscriptionFilter,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        id: SubscriberId,
        ack: oneshot::Sender<bool>,
    },
    Submit(BroadcastEvent),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to the hub coordinator
#[derive(Clone)]
pub struct BroadcastHub {
    commands: mpsc::Sender<Command>,
    registry: watch::Receiver<RegistrySnapshot>,
    counters: Arc<DeliveryCounters>,
}

impl BroadcastHub {
    /// Spawn the coordinator on the current tokio runtime
    pub fn spawn(config: HubConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (registry_tx, registry_rx) = watch::channel(RegistrySnapshot::default());
        let counters = Arc::new(DeliveryCounters::default());

        let coordinator = Coordinator {
            subscribers: HashMap::new(),
            commands: commands_rx,
            registry: registry_tx,
            counters: Arc::clone(&counters),
            write_timeout: config.write_timeout,
        };
        tokio::spawn(coordinator.run());

        Self {
            commands: commands_tx,
            registry: registry_rx,
            counters,
        }
    }

    /// Add a subscriber, or replace the sink and filter of an existing id.
    /// Resolves once the registry reflects the change.
    pub async fn register(
        &self,
        id: SubscriberId,
        sink: Arc<dyn SubscriberSink>,
        filter: SubscriptionFilter,
    ) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Register {
            id,
            sink,
            filter,
            ack,
        })
        .await?;
        done.await.map_err(|_| BroadcasterError::HubClosed)
    }

    /// Remove a subscriber and close its sink.
    /// Returns `false` if the id was not registered.
    pub async fn unregister(&self, id: SubscriberId) -> Result<bool> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Unregister { id, ack }).await?;
        done.await.map_err(|_| BroadcasterError::HubClosed)
    }

    /// Queue an event for delivery. Waits only while the queue is full.
    pub async fn submit(&self, event: BroadcastEvent) -> Result<()> {
        self.send(Command::Submit(event)).await
    }

    /// Resolves after every command queued before this call has been handled
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush(ack)).await?;
        done.await.map_err(|_| BroadcasterError::HubClosed)
    }

    /// Stop the coordinator and close every subscriber
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Shutdown(ack)).await?;
        done.await.map_err(|_| BroadcasterError::HubClosed)
    }

    /// Current subscribers (id -> peer, filter). Never waits on delivery.
    pub fn snapshot(&self) -> RegistrySnapshot {
        Arc::clone(&self.registry.borrow())
    }

    pub fn count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Whether any registered subscriber's filter admits `kind`
    pub fn has_subscriber_for(&self, kind: EventKind) -> bool {
        self.registry
            .borrow()
            .values()
            .any(|info| matches(kind.as_str(), &info.filter))
    }

    pub fn stats(&self) -> DeliveryStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BroadcasterError::HubClosed)
    }
}

struct Subscriber {
    sink: Arc<dyn SubscriberSink>,
    filter: SubscriptionFilter,
}

/// Sole owner of the registry
struct Coordinator {
    subscribers: HashMap<SubscriberId, Subscriber>,
    commands: mpsc::Receiver<Command>,
    registry: watch::Sender<RegistrySnapshot>,
    counters: Arc<DeliveryCounters>,
    write_timeout: Duration,
}

impl Coordinator {
    async fn run(mut self) {
        info!("Broadcast hub started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register {
                    id,
                    sink,
                    filter,
                    ack,
                } => {
                    self.register(id, sink, filter).await;
                    let _ = ack.send(());
                }
                Command::Unregister { id, ack } => {
                    let removed = self.unregister(id).await;
                    let _ = ack.send(removed);
                }
                Command::Submit(event) => self.deliver(event).await,
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
                Command::Shutdown(ack) => {
                    self.commands.close();
                    self.close_all().await;
                    let _ = ack.send(());
                    info!("Broadcast hub stopped");
                    return;
                }
            }
        }

        // Every handle dropped
        self.close_all().await;
        info!("Broadcast hub stopped");
    }

    async fn register(&mut self, id: SubscriberId, sink: Arc<dyn SubscriberSink>, filter: SubscriptionFilter) {
        let filter_spec = filter.to_string();
        let peer = sink.peer();
        let new_sink = Arc::clone(&sink);
        let previous = self.subscribers.insert(id, Subscriber { sink, filter });
        self.publish();

        if let Some(previous) = previous {
            // Re-registering the same sink keeps it open
            if !Arc::ptr_eq(&previous.sink, &new_sink) {
                previous.sink.close().await;
            }

            info!(
                "Client {} ({}) re-registered with filter '{}'. Total clients: {}",
                id,
                peer,
                filter_spec,
                self.subscribers.len()
            );
        } else {
            info!(
                "Client {} ({}) registered with filter '{}'. Total clients: {}",
                id,
                peer,
                filter_spec,
                self.subscribers.len()
            );
        }
    }

    async fn unregister(&mut self, id: SubscriberId) -> bool {
        let Some(subscriber) = self.subscribers.remove(&id) else {
            debug!("Unregister for unknown client {}", id);
            return false;
        };

        self.publish();
        subscriber.sink.close().await;
        info!(
            "Client {} unregistered (filter: '{}'). Total clients: {}",
            id,
            subscriber.filter,
            self.subscribers.len()
        );
        true
    }

    async fn deliver(&mut self, event: BroadcastEvent) {
        let kind = event.kind();
        self.counters.record_event();

        if self.subscribers.is_empty() {
            return;
        }

        // Serialized once, shared by every recipient
        let payload: Arc<str> = match event.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!("Failed to serialize '{}' event {}: {}", kind, event.event_id(), e);
                return;
            }
        };

        let targets: Vec<(SubscriberId, Arc<dyn SubscriberSink>)> = self
            .subscribers
            .iter()
            .filter(|(_, subscriber)| subscriber.filter.accepts(kind))
            .map(|(id, subscriber)| (*id, Arc::clone(&subscriber.sink)))
            .collect();

        let write_timeout = self.write_timeout;
        let results = join_all(targets.into_iter().map(|(id, sink)| {
            let payload = Arc::clone(&payload);
            async move {
                let result = match tokio::time::timeout(write_timeout, sink.send_text(payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(SinkError::Timeout(write_timeout)),
                };
                (id, result)
            }
        }))
        .await;

        let attempted = results.len();
        let mut failed = Vec::new();
        for (id, result) in results {
            if let Err(e) = result {
                warn!("Broadcast error to client {}: {}", id, e);
                failed.push(id);
            }
        }
        let succeeded = attempted - failed.len();
        self.counters.record_pass(attempted, succeeded, failed.len());

        if kind.is_high_frequency() {
            trace!("Broadcast '{}' to {} clients", kind, succeeded);
        } else {
            info!("Broadcast '{}' to {} clients", kind, succeeded);
        }

        if !failed.is_empty() {
            self.remove_failed(&failed).await;
        }
    }

    /// Batched removal after a full pass
    async fn remove_failed(&mut self, failed: &[SubscriberId]) {
        let removed: Vec<Subscriber> = failed
            .iter()
            .filter_map(|id| self.subscribers.remove(id))
            .collect();
        self.publish();

        for subscriber in &removed {
            subscriber.sink.close().await;
        }

        self.counters.record_removed(removed.len());
        info!(
            "Removed {} failed clients. Remaining: {}",
            removed.len(),
            self.subscribers.len()
        );
    }

    async fn close_all(&mut self) {
        let subscribers: Vec<Subscriber> = self.subscribers.drain().map(|(_, s)| s).collect();
        self.publish();

        for subscriber in subscribers {
            subscriber.sink.close().await;
        }
    }

    fn publish(&self) {
        let snapshot: BTreeMap<SubscriberId, SubscriberInfo> = self
            .subscribers
            .iter()
            .map(|(id, subscriber)| {
                (
                    *id,
                    SubscriberInfo {
                        peer: subscriber.sink.peer(),
                        filter: subscriber.filter.to_string(),
                    },
                )
            })
            .collect();
        self.registry.send_replace(Arc::new(snapshot));
    }
}
