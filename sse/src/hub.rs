use crate::error::Error;
use crate::subscription::{StateCell, Subscription, SubscriptionId};
use events::Event;
use log::*;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Depth of the queue feeding the control loop. Callers wait when it is full.
const COMMAND_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Number of recent events replayed to each new subscriber. Zero disables replay.
    pub replay_buffer_size: usize,
    /// Live events a subscriber may have queued before further events are
    /// dropped for it.
    pub subscriber_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            replay_buffer_size: 0,
            subscriber_capacity: 32,
        }
    }
}

/// Requests processed one at a time by the control loop.
pub(crate) enum Command {
    Subscribe {
        id: SubscriptionId,
        inbox: mpsc::Sender<Arc<Event>>,
        state: StateCell,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: Option<oneshot::Sender<bool>>,
    },
    Publish {
        event: Arc<Event>,
        reply: oneshot::Sender<usize>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running broadcast hub.
///
/// Cloning is cheap; every clone talks to the same control loop. All
/// subscriber-set mutations and every publish are serialized through that
/// loop, so the set of subscribers at the moment of a publish is well defined
/// and every subscriber sees events in the same order.
#[derive(Clone, Debug)]
pub struct Hub {
    commands: mpsc::Sender<Command>,
    inbox_capacity: usize,
}

impl Hub {
    /// Starts the control loop on the current tokio runtime.
    pub fn spawn(config: HubConfig) -> Self {
        let (commands, queue) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        tokio::spawn(ControlLoop::new(config, queue).run());

        info!(
            "Started broadcast hub (replay buffer: {}, subscriber capacity: {})",
            config.replay_buffer_size, config.subscriber_capacity
        );

        Self {
            commands,
            // Room for the replayed history on top of the live allowance.
            inbox_capacity: config.subscriber_capacity.max(1) + config.replay_buffer_size,
        }
    }

    /// Registers a new subscription under a freshly generated identity.
    pub async fn subscribe(&self) -> Result<Subscription, Error> {
        self.subscribe_with_id(SubscriptionId::new()).await
    }

    /// Registers a new subscription under `id`, which must not belong to a
    /// live subscription. Events published after this returns are delivered
    /// to it, preceded by the replay buffer if one is configured.
    pub async fn subscribe_with_id(&self, id: SubscriptionId) -> Result<Subscription, Error> {
        let (inbox_tx, inbox_rx) = mpsc::channel(self.inbox_capacity);
        let state = StateCell::new();
        let (reply, registered) = oneshot::channel();

        self.send(Command::Subscribe {
            id: id.clone(),
            inbox: inbox_tx,
            state: state.clone(),
            reply,
        })
        .await?;

        registered.await.map_err(|_| Error::HubClosed)??;

        Ok(Subscription::new(id, inbox_rx, state, self.commands.clone()))
    }

    /// Removes a subscription. Returns false if no live subscription had
    /// this identity, including after shutdown.
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let (reply, removed) = oneshot::channel();
        let command = Command::Unsubscribe {
            id: id.clone(),
            reply: Some(reply),
        };

        if self.send(command).await.is_err() {
            return false;
        }
        removed.await.unwrap_or(false)
    }

    /// Delivers `event` to every current subscriber and returns how many
    /// accepted it. Subscribers whose inbox is full miss this event.
    pub async fn publish(&self, event: Event) -> Result<usize, Error> {
        let (reply, delivered) = oneshot::channel();

        self.send(Command::Publish {
            event: Arc::new(event),
            reply,
        })
        .await?;

        delivered.await.map_err(|_| Error::HubClosed)
    }

    pub async fn subscriber_count(&self) -> Result<usize, Error> {
        let (reply, count) = oneshot::channel();
        self.send(Command::Count { reply }).await?;
        count.await.map_err(|_| Error::HubClosed)
    }

    /// Completes every live subscription and stops the control loop. Later
    /// publishes and subscribes fail with [`Error::HubClosed`]. Calling this
    /// again is a no-op.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = done.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, command: Command) -> Result<(), Error> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::HubClosed)
    }
}

struct SubscriberEntry {
    inbox: mpsc::Sender<Arc<Event>>,
    state: StateCell,
}

/// The subscriber set. Owned by the control loop and never shared.
#[derive(Default)]
struct SubscriberSet {
    entries: HashMap<SubscriptionId, SubscriberEntry>,
}

impl SubscriberSet {
    fn register(&mut self, id: SubscriptionId, entry: SubscriberEntry) -> Result<(), Error> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateSubscription(id));
        }
        self.entries.insert(id, entry);
        Ok(())
    }

    fn unregister(&mut self, id: &SubscriptionId) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                Self::release(entry);
                true
            }
            None => false,
        }
    }

    /// Offers `event` to every subscriber without waiting on any of them.
    fn broadcast(&mut self, event: &Arc<Event>) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();

        for (id, entry) in self.entries.iter() {
            match entry.inbox.try_send(Arc::clone(event)) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        "Subscription {} is not keeping up, dropping event {} for it",
                        id,
                        event.id()
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => gone.push(id.clone()),
            }
        }

        for id in gone {
            debug!("Subscription {id} went away, removing it");
            self.unregister(&id);
        }

        delivered
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn drain(&mut self) {
        for (_, entry) in self.entries.drain() {
            Self::release(entry);
        }
    }

    fn release(entry: SubscriberEntry) {
        entry.state.begin_completing();
        drop(entry.inbox);
        entry.state.close();
    }
}

/// Bounded history of the most recent events.
struct ReplayBuffer {
    events: VecDeque<Arc<Event>>,
    capacity: usize,
}

impl ReplayBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, event: &Arc<Event>) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(Arc::clone(event));
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<Event>> {
        self.events.iter()
    }
}

struct ControlLoop {
    queue: mpsc::Receiver<Command>,
    subscribers: SubscriberSet,
    replay: ReplayBuffer,
}

impl ControlLoop {
    fn new(config: HubConfig, queue: mpsc::Receiver<Command>) -> Self {
        Self {
            queue,
            subscribers: SubscriberSet::default(),
            replay: ReplayBuffer::new(config.replay_buffer_size),
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.queue.recv().await {
            match command {
                Command::Subscribe {
                    id,
                    inbox,
                    state,
                    reply,
                } => {
                    let result = self.subscribe(id, inbox, state);
                    let _ = reply.send(result);
                }
                Command::Unsubscribe { id, reply } => {
                    let removed = self.subscribers.unregister(&id);
                    if removed {
                        debug!("Unsubscribed {id}");
                    } else {
                        trace!("Unsubscribe for unknown subscription {id}");
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(removed);
                    }
                }
                Command::Publish { event, reply } => {
                    let delivered = self.subscribers.broadcast(&event);
                    self.replay.record(&event);
                    trace!("Delivered event {} to {delivered} subscriber(s)", event.id());
                    let _ = reply.send(delivered);
                }
                Command::Count { reply } => {
                    let _ = reply.send(self.subscribers.len());
                }
                Command::Shutdown { reply } => {
                    self.shutdown();
                    let _ = reply.send(());
                    // Commands still queued are dropped with the receiver,
                    // which their callers observe as a closed hub.
                    return;
                }
            }
        }

        // Every handle is gone; nobody can publish any more.
        self.shutdown();
    }

    fn subscribe(
        &mut self,
        id: SubscriptionId,
        inbox: mpsc::Sender<Arc<Event>>,
        state: StateCell,
    ) -> Result<(), Error> {
        // The inbox is sized to hold the whole replay buffer, so none of
        // these can be refused for lack of space.
        for event in self.replay.iter() {
            if inbox.try_send(Arc::clone(event)).is_err() {
                break;
            }
        }

        self.subscribers
            .register(id.clone(), SubscriberEntry { inbox, state })?;
        debug!("Subscribed {id} ({} live)", self.subscribers.len());
        Ok(())
    }

    fn shutdown(&mut self) {
        info!(
            "Shutting down broadcast hub, completing {} subscription(s)",
            self.subscribers.len()
        );
        self.queue.close();
        self.subscribers.drain();
    }
}
