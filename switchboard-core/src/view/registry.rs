//! `registry.rs`
//!
//! The interest registry: notification name → ordered observers, and
//! listener name → listener.
//!
//! Two independent `parking_lot::RwLock`s guard the two maps. Lock order is
//! always listeners → observers; no callback ever runs while either is held.
//! Broadcasts copy the observer list out from under the read lock first, so
//! callbacks may add or remove observers (themselves included), register
//! listeners, or broadcast again without deadlocking or disturbing the
//! in-flight delivery.
//!
//! Opt-in serialized broadcasts never hold a lock across callbacks either:
//! the first broadcaster for a name drains a per-name queue, and anyone else
//! broadcasting that name meanwhile just enqueues.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ahash::RandomState;
use compact_str::CompactString;
use dashmap::{DashMap, mapref::entry::Entry};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use crate::config::DispatchConfig;
use crate::error::SwitchboardResult;
use crate::notification::Notification;
use crate::observer::{Identity, Observer};
use crate::util::downcast::downcast_arc;
use crate::view::listener::Listener;

static INSTANCE: Lazy<Mutex<Option<Arc<View>>>> = Lazy::new(|| Mutex::new(None));

type ObserverMap = HashMap<CompactString, Vec<Observer>, RandomState>;
type ListenerMap = HashMap<CompactString, Arc<dyn Listener>, RandomState>;

/// Snapshot buffer; most names have only a handful of observers
type Snapshot = SmallVec<[Observer; 4]>;

/// Clears a name's pending queue if its drainer unwinds, so later broadcasts
/// for that name are not queued forever.
struct DrainGuard<'a> {
    pending: &'a DashMap<CompactString, VecDeque<Notification>, RandomState>,
    name: &'a str,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.pending.remove(self.name);
        }
    }
}

/// Delivery counters, updated with relaxed atomics
#[derive(Debug, Default)]
struct DispatchCounters {
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    total_delivery_time: AtomicU64, // nanoseconds
}

/// Point-in-time copy of the delivery counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub broadcasts: u64,
    pub deliveries: u64,
    pub average_broadcast_time_ns: u64,
}

pub struct View {
    observers: RwLock<ObserverMap>,
    listeners: RwLock<ListenerMap>,

    /// Names currently being delivered with `serialize_broadcasts`, each with
    /// the broadcasts queued behind it. Entries exist only while draining.
    pending_broadcasts: DashMap<CompactString, VecDeque<Notification>, RandomState>,

    serialize_broadcasts: bool,
    slow_broadcast_threshold: Duration,
    counters: DispatchCounters,
}

impl View {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&DispatchConfig::default())
    }

    #[must_use]
    pub fn with_config(config: &DispatchConfig) -> Self {
        Self {
            observers: RwLock::new(HashMap::with_capacity_and_hasher(
                config.initial_capacity,
                RandomState::new(),
            )),
            listeners: RwLock::new(HashMap::with_capacity_and_hasher(
                config.initial_capacity,
                RandomState::new(),
            )),
            pending_broadcasts: DashMap::with_hasher(RandomState::new()),
            serialize_broadcasts: config.serialize_broadcasts,
            slow_broadcast_threshold: config.slow_broadcast_threshold,
            counters: DispatchCounters::default(),
        }
    }

    /// Process-wide instance, created on first access.
    pub fn instance() -> Arc<Self> {
        Self::instance_with(Self::new)
    }

    /// Process-wide instance, built by `factory` if none exists yet.
    pub fn instance_with<F>(factory: F) -> Arc<Self>
    where
        F: FnOnce() -> Self,
    {
        let mut slot = INSTANCE.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            info!("Creating process-wide View instance");
            Arc::new(factory())
        }))
    }

    /// Drop the process-wide instance; the next `instance()` builds a fresh one.
    pub fn reset_instance() {
        INSTANCE.lock().take();
    }

    // ────────────────────────────────────────────────────────────
    // Observers
    // ────────────────────────────────────────────────────────────

    /// Append `observer` to the list for `name`. No de-duplication.
    pub fn register_observer(&self, name: &str, observer: Observer) {
        let mut observers = self.observers.write();
        observers
            .entry(CompactString::new(name))
            .or_default()
            .push(observer);

        debug!(notification = name, "Observer registered");
    }

    /// Deliver `notification` to every observer registered for its name at
    /// the moment of the call, in registration order.
    ///
    /// Observers removed by an earlier callback are still invoked in this
    /// broadcast; observers added during it are not. The first callback
    /// error aborts the remainder and is returned to the caller.
    ///
    /// With `serialize_broadcasts`, a broadcast for a name that is already
    /// being delivered (on any thread, nested or not) is queued and returns
    /// `Ok(())` at once; the in-flight broadcaster delivers it afterwards.
    pub fn notify_observers(&self, notification: &Notification) -> SwitchboardResult<()> {
        if self.serialize_broadcasts {
            self.notify_serialized(notification)
        } else {
            self.deliver(notification)
        }
    }

    fn notify_serialized(&self, notification: &Notification) -> SwitchboardResult<()> {
        let name = CompactString::new(notification.name());

        match self.pending_broadcasts.entry(name.clone()) {
            Entry::Occupied(mut queued) => {
                queued.get_mut().push_back(notification.clone());
                trace!(notification = %name, "Broadcast queued behind in-flight delivery");
                return Ok(());
            }
            Entry::Vacant(slot) => {
                slot.insert(VecDeque::new());
            }
        }

        let _draining = DrainGuard {
            pending: &self.pending_broadcasts,
            name: &name,
        };

        let result = self.deliver(notification);

        // queued broadcasters already returned, so their failures can only be logged
        while let Some(queued) = self.next_pending(&name) {
            if let Err(err) = self.deliver(&queued) {
                let _ = err.trace();
            }
        }

        result
    }

    /// Pop the next queued broadcast, or retire the entry once the queue is empty.
    fn next_pending(&self, name: &str) -> Option<Notification> {
        if self
            .pending_broadcasts
            .remove_if(name, |_, queue| queue.is_empty())
            .is_some()
        {
            return None;
        }

        // only the draining thread pops, so a non-empty queue stays non-empty
        self.pending_broadcasts
            .get_mut(name)
            .and_then(|mut queue| queue.pop_front())
    }

    fn deliver(&self, notification: &Notification) -> SwitchboardResult<()> {
        let snapshot: Snapshot = {
            let observers = self.observers.read();
            match observers.get(notification.name()) {
                Some(list) => list.iter().cloned().collect(),
                None => return Ok(()),
            }
        };

        let start = Instant::now();
        self.counters.broadcasts.fetch_add(1, Ordering::Relaxed);

        for observer in &snapshot {
            trace!(notification = notification.name(), identity = ?observer.identity(), "Delivering");
            self.counters.deliveries.fetch_add(1, Ordering::Relaxed);
            observer.notify_observer(notification)?;
        }

        let elapsed = start.elapsed();
        self.counters
            .total_delivery_time
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);

        if elapsed > self.slow_broadcast_threshold {
            warn!(
                notification = notification.name(),
                observers = snapshot.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow broadcast"
            );
        }

        Ok(())
    }

    /// Remove the first observer for `name` registered under `identity`.
    ///
    /// Deletes the `name` key once its list is empty. Returns whether an
    /// observer was removed; absent names or identities are a no-op.
    pub fn remove_observer(&self, name: &str, identity: &Identity) -> bool {
        let mut observers = self.observers.write();
        Self::remove_observer_locked(&mut observers, name, identity)
    }

    fn remove_observer_locked(observers: &mut ObserverMap, name: &str, identity: &Identity) -> bool {
        let Some(list) = observers.get_mut(name) else {
            return false;
        };

        let removed = match list.iter().position(|o| o.compare_identity(identity)) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        };

        if list.is_empty() {
            observers.remove(name);
        }

        if removed {
            debug!(notification = name, ?identity, "Observer removed");
        }

        removed
    }

    #[must_use]
    pub fn has_observers(&self, name: &str) -> bool {
        self.observers.read().contains_key(name)
    }

    #[must_use]
    pub fn observer_count(&self, name: &str) -> usize {
        self.observers.read().get(name).map_or(0, Vec::len)
    }

    // ────────────────────────────────────────────────────────────
    // Listeners
    // ────────────────────────────────────────────────────────────

    /// Register `listener` under its name and subscribe it to its interests.
    ///
    /// Rejected (returns `false`, nothing changes) if the name is taken;
    /// re-registration requires removing the existing listener first.
    pub fn register_listener(&self, listener: Arc<dyn Listener>) -> bool {
        let name = CompactString::new(listener.listener_name());
        let interests = listener.notification_interests();

        {
            let mut listeners = self.listeners.write();
            if listeners.contains_key(&name) {
                debug!(listener = %name, "Listener already registered, ignoring");
                return false;
            }

            listeners.insert(name.clone(), Arc::clone(&listener));

            if !interests.is_empty() {
                let identity = Identity::of(&listener);
                let target = Arc::clone(&listener);
                let observer = Observer::new(
                    move |notification| target.handle_notification(notification),
                    identity,
                );

                let mut observers = self.observers.write();
                for interest in &interests {
                    observers
                        .entry(interest.clone())
                        .or_default()
                        .push(observer.clone());
                }
            }
        }

        debug!(listener = %name, interests = interests.len(), "Listener registered");
        listener.on_registered();
        true
    }

    #[must_use]
    pub fn retrieve_listener(&self, name: &str) -> Option<Arc<dyn Listener>> {
        self.listeners.read().get(name).cloned()
    }

    /// Retrieve and downcast; `None` if absent or of another type
    #[must_use]
    pub fn retrieve_listener_as<T: Listener>(&self, name: &str) -> Option<Arc<T>> {
        self.retrieve_listener(name).and_then(downcast_arc::<T, _>)
    }

    /// Unsubscribe the listener from its interests, drop it from the
    /// registry, then fire its `on_removed` hook.
    pub fn remove_listener(&self, name: &str) -> Option<Arc<dyn Listener>> {
        let candidate = self.retrieve_listener(name)?;
        let identity = Identity::of(&candidate);
        let interests = candidate.notification_interests();

        let removed = {
            let mut listeners = self.listeners.write();

            // lost a race with another removal (and possibly a re-registration)
            match listeners.get(name) {
                Some(current) if Identity::of(current) == identity => {}
                _ => return None,
            }

            {
                let mut observers = self.observers.write();
                for interest in &interests {
                    Self::remove_observer_locked(&mut observers, interest, &identity);
                }
            }

            listeners.remove(name)?
        };

        debug!(listener = name, "Listener removed");
        removed.on_removed();
        Some(removed)
    }

    #[must_use]
    pub fn has_listener(&self, name: &str) -> bool {
        self.listeners.read().contains_key(name)
    }

    // ────────────────────────────────────────────────────────────
    // Diagnostics
    // ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        let broadcasts = self.counters.broadcasts.load(Ordering::Relaxed);
        let total = self.counters.total_delivery_time.load(Ordering::Relaxed);

        DispatchStats {
            broadcasts,
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            average_broadcast_time_ns: if broadcasts > 0 { total / broadcasts } else { 0 },
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("notification_names", &self.observers.read().len())
            .field("listener_count", &self.listeners.read().len())
            .field("serialize_broadcasts", &self.serialize_broadcasts)
            .finish()
    }
}
