//! `facade.rs`
//!
//! Single entry point over one [`Model`], one [`Controller`] and one [`View`].
//! Pure delegation: the facade adds no locking or storage of its own beyond
//! the lazily created process-wide instance.

use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::controller::{Command, Controller};
use crate::error::SwitchboardResult;
use crate::model::{Holder, Model};
use crate::notification::{Body, Notification};
use crate::view::{Listener, View};

static INSTANCE: Lazy<Mutex<Option<Arc<Facade>>>> = Lazy::new(|| Mutex::new(None));

/// Weak handle collaborators use to reach their facade.
///
/// Weak so that listeners and holders stored inside the registries do not
/// keep the facade (and thus themselves) alive.
#[derive(Clone, Default)]
pub struct Notifier {
    facade: Weak<Facade>,
}

impl Notifier {
    #[must_use]
    pub fn new(facade: Weak<Facade>) -> Self {
        Self { facade }
    }

    /// Notifier not bound to any facade; sending through it does nothing
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn facade(&self) -> Option<Arc<Facade>> {
        self.facade.upgrade()
    }

    pub fn send_notification(
        &self,
        name: &str,
        body: Option<Body>,
        kind: Option<&str>,
    ) -> SwitchboardResult<()> {
        match self.facade.upgrade() {
            Some(facade) => facade.send_notification(name, body, kind),
            None => {
                debug!(notification = name, "Notifier has no facade, dropping notification");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("attached", &(self.facade.strong_count() > 0))
            .finish()
    }
}

pub struct Facade {
    model: Arc<Model>,
    controller: Arc<Controller>,
    view: Arc<View>,
    this: Weak<Facade>,
}

impl Facade {
    /// Facade over fresh, private registries (never the process-wide ones).
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_config(&DispatchConfig::default())
    }

    /// Isolated facade whose view is tuned by `config`.
    #[must_use]
    pub fn with_config(config: &DispatchConfig) -> Arc<Self> {
        let view = Arc::new(View::with_config(config));
        Self::with_parts(
            Arc::new(Model::new()),
            Arc::new(Controller::new(view)),
        )
    }

    /// Facade over existing registries; the view is the controller's.
    #[must_use]
    pub fn with_parts(model: Arc<Model>, controller: Arc<Controller>) -> Arc<Self> {
        let view = Arc::clone(controller.view());
        let facade = Arc::new_cyclic(|this| Self {
            model,
            controller,
            view,
            this: this.clone(),
        });

        facade.controller.attach_facade(Arc::downgrade(&facade));
        facade
    }

    /// Process-wide facade. On first access initializes the model, then the
    /// controller, then the view, each exactly once.
    pub fn instance() -> Arc<Self> {
        let mut slot = INSTANCE.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            info!("Creating process-wide Facade instance");
            let model = Model::instance();
            let controller = Controller::instance();
            let view = View::instance();
            debug_assert!(Arc::ptr_eq(&view, controller.view()));

            Self::with_parts(model, controller)
        }))
    }

    /// Drop the process-wide facade and every process-wide registry.
    pub fn reset_instance() {
        INSTANCE.lock().take();
        Controller::reset_instance();
        Model::reset_instance();
        View::reset_instance();
    }

    #[must_use]
    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.this.clone())
    }

    #[must_use]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    #[must_use]
    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    #[must_use]
    pub fn view(&self) -> &Arc<View> {
        &self.view
    }

    // ────────────────────────────────────────────────────────────
    // Commands
    // ────────────────────────────────────────────────────────────

    pub fn register_command<C, F>(&self, name: &str, factory: F)
    where
        C: Command + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.controller.register_command(name, factory);
    }

    pub fn remove_command(&self, name: &str) -> bool {
        self.controller.remove_command(name)
    }

    #[must_use]
    pub fn has_command(&self, name: &str) -> bool {
        self.controller.has_command(name)
    }

    // ────────────────────────────────────────────────────────────
    // Holders
    // ────────────────────────────────────────────────────────────

    pub fn register_holder(&self, holder: Arc<dyn Holder>) {
        holder.initialize_notifier(self.notifier());
        self.model.register_holder(holder);
    }

    #[must_use]
    pub fn retrieve_holder(&self, name: &str) -> Option<Arc<dyn Holder>> {
        self.model.retrieve_holder(name)
    }

    #[must_use]
    pub fn retrieve_holder_as<T: Holder>(&self, name: &str) -> Option<Arc<T>> {
        self.model.retrieve_holder_as(name)
    }

    pub fn remove_holder(&self, name: &str) -> Option<Arc<dyn Holder>> {
        self.model.remove_holder(name)
    }

    #[must_use]
    pub fn has_holder(&self, name: &str) -> bool {
        self.model.has_holder(name)
    }

    // ────────────────────────────────────────────────────────────
    // Listeners
    // ────────────────────────────────────────────────────────────

    /// `false` if a listener with the same name is already registered
    pub fn register_listener(&self, listener: Arc<dyn Listener>) -> bool {
        listener.initialize_notifier(self.notifier());
        self.view.register_listener(listener)
    }

    #[must_use]
    pub fn retrieve_listener(&self, name: &str) -> Option<Arc<dyn Listener>> {
        self.view.retrieve_listener(name)
    }

    #[must_use]
    pub fn retrieve_listener_as<T: Listener>(&self, name: &str) -> Option<Arc<T>> {
        self.view.retrieve_listener_as(name)
    }

    pub fn remove_listener(&self, name: &str) -> Option<Arc<dyn Listener>> {
        self.view.remove_listener(name)
    }

    #[must_use]
    pub fn has_listener(&self, name: &str) -> bool {
        self.view.has_listener(name)
    }

    // ────────────────────────────────────────────────────────────
    // Broadcast
    // ────────────────────────────────────────────────────────────

    /// Build a notification and deliver it; returns once every observer in
    /// the snapshot has run (or the first one has failed).
    pub fn send_notification(
        &self,
        name: &str,
        body: Option<Body>,
        kind: Option<&str>,
    ) -> SwitchboardResult<()> {
        let notification = Notification::with_parts(name, body, kind)?;
        self.notify_observers(&notification)
    }

    pub fn notify_observers(&self, notification: &Notification) -> SwitchboardResult<()> {
        self.view.notify_observers(notification)
    }
}

impl std::fmt::Debug for Facade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Facade")
            .field("model", &self.model)
            .field("controller", &self.controller)
            .field("view", &self.view)
            .finish()
    }
}
