//! Session status holder with ordered fan-out to subscribers.
//!
//! Every transition is committed and queued to all subscribers while the
//! store lock is held, so each subscriber sees every transition exactly once
//! and in commit order. A subscriber only receives transitions that happen
//! after it subscribed.

use super::types::{Session, SessionStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<SessionStatus>,
}

#[derive(Default)]
struct StoreState {
    status: SessionStatus,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    closed: bool,
}

impl StoreState {
    fn add_subscriber(&mut self) -> (u64, mpsc::UnboundedReceiver<SessionStatus>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id;
        self.next_id += 1;
        if !self.closed {
            self.subscribers.push(Subscriber { id, sender });
        }
        (id, receiver)
    }

    fn commit(&mut self, next: SessionStatus) -> bool {
        if self.closed {
            debug!(status = next.label(), "ignoring transition on closed store");
            return false;
        }

        debug!(from = self.status.label(), to = next.label(), "session transition");
        self.status = next;

        let status = &self.status;
        // Receivers that went away without unsubscribing are pruned here.
        self.subscribers
            .retain(|subscriber| subscriber.sender.send(status.clone()).is_ok());
        true
    }
}

type Shared = Arc<Mutex<StoreState>>;

fn lock(shared: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    // Every critical section leaves the state consistent, so a poisoned lock is still usable.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owning side of the session state. Only the provider and the login
/// completer hold one; views get a [`SessionHandle`].
pub struct SessionStore {
    shared: Shared,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Creates a store in the `Loading` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        lock(&self.shared).status.clone()
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        subscribe(&self.shared)
    }

    /// Moves to `Authenticated(session)`. Returns false if the store is closed.
    pub fn set_authenticated(&self, session: Session) -> bool {
        self.transition(SessionStatus::Authenticated(session))
    }

    /// Moves to `Unauthenticated`. Returns false if the store is closed.
    pub fn clear(&self) -> bool {
        self.transition(SessionStatus::Unauthenticated)
    }

    /// Resolves the initial `Loading` state. Does nothing if another
    /// transition already happened, so a slow restoration cannot overwrite a
    /// login that completed first.
    pub(crate) fn settle(&self, session: Option<Session>) -> bool {
        let mut state = lock(&self.shared);
        if !state.status.is_loading() {
            return false;
        }
        let next = match session {
            Some(session) => SessionStatus::Authenticated(session),
            None => SessionStatus::Unauthenticated,
        };
        state.commit(next)
    }

    /// Tears the store down: subscribers are dropped and later mutations are ignored.
    pub fn close(&self) {
        let mut state = lock(&self.shared);
        state.closed = true;
        state.subscribers.clear();
        debug!("session store closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared).subscribers.len()
    }

    fn transition(&self, next: SessionStatus) -> bool {
        lock(&self.shared).commit(next)
    }
}

/// Read and subscribe access to a store. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Shared,
}

impl SessionHandle {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        lock(&self.shared).status.clone()
    }

    pub fn subscribe(&self) -> Subscription {
        subscribe(&self.shared)
    }

    /// Returns the current status together with a subscription that starts
    /// right after it, with no transition lost in between.
    pub fn snapshot_and_subscribe(&self) -> (SessionStatus, Subscription) {
        let mut state = lock(&self.shared);
        let status = state.status.clone();
        let (id, receiver) = state.add_subscriber();
        drop(state);
        (
            status,
            Subscription {
                id,
                receiver,
                shared: Arc::downgrade(&self.shared),
            },
        )
    }

    /// Registers a listener invoked for every transition on a spawned task.
    /// Dropping the returned guard unsubscribes it. Must be called inside a
    /// tokio runtime.
    pub fn subscribe_fn<F>(&self, mut listener: F) -> ListenerGuard
    where
        F: FnMut(SessionStatus) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(status) = subscription.recv().await {
                listener(status);
            }
        });
        ListenerGuard { task }
    }

    /// Waits until the status leaves `Loading`. Returns `None` if the store is
    /// torn down first.
    pub async fn settled(&self) -> Option<SessionStatus> {
        let (status, mut subscription) = self.snapshot_and_subscribe();
        if !status.is_loading() {
            return Some(status);
        }
        while let Some(status) = subscription.recv().await {
            if !status.is_loading() {
                return Some(status);
            }
        }
        None
    }
}

fn subscribe(shared: &Shared) -> Subscription {
    let (id, receiver) = lock(shared).add_subscriber();
    Subscription {
        id,
        receiver,
        shared: Arc::downgrade(shared),
    }
}

/// Ordered queue of transitions for one subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<SessionStatus>,
    shared: Weak<Mutex<StoreState>>,
}

impl Subscription {
    /// Next transition, or `None` once the store is closed and drained.
    pub async fn recv(&mut self) -> Option<SessionStatus> {
        self.receiver.recv().await
    }

    /// Next already-delivered transition, if any.
    pub fn try_recv(&mut self) -> Option<SessionStatus> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared)
                .subscribers
                .retain(|subscriber| subscriber.id != self.id);
        }
    }
}

/// Keeps a callback listener alive; aborts it on drop.
pub struct ListenerGuard {
    task: JoinHandle<()>,
}

impl ListenerGuard {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}
