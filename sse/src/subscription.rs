use crate::hub::Command;
use events::Event;
use log::*;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Unique identifier for a subscription (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for SubscriptionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a subscription. Transitions only move forward:
/// `Active` → `Completing` → `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Registered with the hub and receiving events.
    Active,
    /// Removal has been requested (unsubscribe or hub shutdown).
    Completing,
    /// The hub has released the inbox. Nothing will be sent to it again.
    Closed,
}

const ACTIVE: u8 = 0;
const COMPLETING: u8 = 1;
const CLOSED: u8 = 2;

/// State shared between a subscription handle and the hub's entry for it.
#[derive(Debug, Clone)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ACTIVE)))
    }

    pub(crate) fn get(&self) -> SubscriptionState {
        match self.0.load(Ordering::Acquire) {
            ACTIVE => SubscriptionState::Active,
            COMPLETING => SubscriptionState::Completing,
            _ => SubscriptionState::Closed,
        }
    }

    /// Moves `Active` to `Completing`. Returns false if the subscription had
    /// already left `Active`.
    pub(crate) fn begin_completing(&self) -> bool {
        self.0
            .compare_exchange(ACTIVE, COMPLETING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn close(&self) {
        self.0.store(CLOSED, Ordering::Release);
    }
}

/// What a subscriber sees when it waits on its inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(Arc<Event>),
    /// The hub released this subscription and every buffered event has
    /// been drained. No further deliveries will follow.
    Completed,
}

/// One consumer's interest in the hub's events.
///
/// Dropping a subscription that is still active asks the hub to remove it,
/// so a stream handler that goes away for any reason never leaves a stale
/// entry behind.
pub struct Subscription {
    id: SubscriptionId,
    inbox: mpsc::Receiver<Arc<Event>>,
    state: StateCell,
    commands: mpsc::Sender<Command>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        inbox: mpsc::Receiver<Arc<Event>>,
        state: StateCell,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            id,
            inbox,
            state,
            commands,
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state.get()
    }

    /// Waits for the next event, or for completion once the hub has let go
    /// of this subscription.
    pub async fn recv(&mut self) -> Delivery {
        match self.inbox.recv().await {
            Some(event) => Delivery::Event(event),
            None => {
                self.state.close();
                Delivery::Completed
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). Returns `None` when the
    /// inbox is empty but the subscription is still live.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        match self.inbox.try_recv() {
            Ok(event) => Some(Delivery::Event(event)),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.state.close();
                Some(Delivery::Completed)
            }
        }
    }

    /// Removes this subscription from the hub and waits for the hub to
    /// acknowledge it. Returns false if the hub had already dropped it.
    pub async fn unsubscribe(self) -> bool {
        if !self.state.begin_completing() {
            return false;
        }

        let (reply, removed) = oneshot::channel();
        let command = Command::Unsubscribe {
            id: self.id.clone(),
            reply: Some(reply),
        };

        let removed = match self.commands.send(command).await {
            Ok(()) => removed.await.unwrap_or(false),
            Err(_) => false,
        };
        self.state.close();
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.state.begin_completing() {
            return;
        }

        debug!("Subscription {} dropped, requesting removal", self.id);
        let command = Command::Unsubscribe {
            id: self.id.clone(),
            reply: None,
        };
        // A full command queue leaves the entry in place until the next
        // publish finds its inbox closed and removes it.
        if self.commands.try_send(command).is_err() {
            trace!("Deferred removal of subscription {}", self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }

    #[test]
    fn state_only_moves_forward() {
        let state = StateCell::new();
        assert_eq!(state.get(), SubscriptionState::Active);

        assert!(state.begin_completing());
        assert_eq!(state.get(), SubscriptionState::Completing);
        assert!(!state.begin_completing());

        state.close();
        assert_eq!(state.get(), SubscriptionState::Closed);
        assert!(!state.begin_completing());
        assert_eq!(state.get(), SubscriptionState::Closed);
    }
}
