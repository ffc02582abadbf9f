//! `listener.rs`
//!
//! Named, lifecycle-aware units that declare interest in notification names.

use std::any::Any;
use std::sync::Arc;

use compact_str::CompactString;
use parking_lot::RwLock;

use crate::error::SwitchboardResult;
use crate::facade::Notifier;
use crate::notification::{Body, Notification};
use crate::util::downcast::AsAnyArc;

/// Capability interface for anything registered with the [`View`](super::View).
///
/// Methods take `&self`: a listener is shared between the registry and every
/// in-flight broadcast, so mutable state lives behind interior mutability.
pub trait Listener: AsAnyArc {
    /// Registry key; must not change while registered
    fn listener_name(&self) -> &str;

    /// Notification names this listener wants delivered
    fn notification_interests(&self) -> Vec<CompactString> {
        Vec::new()
    }

    fn handle_notification(&self, _notification: &Notification) -> SwitchboardResult<()> {
        Ok(())
    }

    /// Called by the facade before registration
    fn initialize_notifier(&self, _notifier: Notifier) {}

    fn on_registered(&self) {}

    fn on_removed(&self) {}
}

/// Embeddable base with a name, an optional view component and a notifier slot.
///
/// Concrete listeners hold one of these and forward `listener_name` and
/// `initialize_notifier` to it, keeping the default no-op lifecycle hooks.
pub struct ListenerBase {
    name: CompactString,
    view_component: RwLock<Option<Body>>,
    notifier: RwLock<Option<Notifier>>,
}

impl ListenerBase {
    pub const DEFAULT_NAME: &'static str = "Listener";

    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: CompactString::new(if name.is_empty() {
                Self::DEFAULT_NAME
            } else {
                name
            }),
            view_component: RwLock::new(None),
            notifier: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_view_component<T: Any + Send + Sync>(self, component: Arc<T>) -> Self {
        *self.view_component.write() = Some(component);
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn view_component<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.view_component
            .read()
            .clone()
            .and_then(|component| component.downcast::<T>().ok())
    }

    pub fn set_view_component(&self, component: Option<Body>) {
        *self.view_component.write() = component;
    }

    pub fn set_notifier(&self, notifier: Notifier) {
        *self.notifier.write() = Some(notifier);
    }

    #[must_use]
    pub fn notifier(&self) -> Option<Notifier> {
        self.notifier.read().clone()
    }

    /// Broadcast through the owning facade; a no-op before registration.
    pub fn send_notification(
        &self,
        name: &str,
        body: Option<Body>,
        kind: Option<&str>,
    ) -> SwitchboardResult<()> {
        match self.notifier() {
            Some(notifier) => notifier.send_notification(name, body, kind),
            None => Ok(()),
        }
    }
}

impl Listener for ListenerBase {
    fn listener_name(&self) -> &str {
        &self.name
    }

    fn initialize_notifier(&self, notifier: Notifier) {
        self.set_notifier(notifier);
    }
}

impl std::fmt::Debug for ListenerBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerBase")
            .field("name", &self.name)
            .field("has_notifier", &self.notifier.read().is_some())
            .finish_non_exhaustive()
    }
}
