//! `registry.rs`
//!
//! The command registry: notification name → command factory.
//!
//! The controller subscribes to the [`View`] once per command name, with its
//! own identity, and builds a fresh command on every matching broadcast.
//! Register/remove are serialized by a wiring lock held across the map update
//! and the View call; the command map lock itself is never held while the
//! View is touched or while a command runs.
//!
//! Holding `wiring` while taking the View's observer lock cannot deadlock:
//! the View never calls into the controller while holding its own locks
//! (observers run only after the snapshot is taken), and dispatch never
//! takes `wiring`. Keep it that way if either side changes.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use ahash::RandomState;
use compact_str::CompactString;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use crate::controller::command::{Command, CommandFactory, command_factory};
use crate::error::SwitchboardResult;
use crate::facade::{Facade, Notifier};
use crate::notification::Notification;
use crate::observer::{Identity, Observer};
use crate::view::View;

static INSTANCE: Lazy<Mutex<Option<Arc<Controller>>>> = Lazy::new(|| Mutex::new(None));

type CommandMap = HashMap<CompactString, CommandFactory, RandomState>;

/// State shared between the controller and the observers it registers
struct Dispatcher {
    commands: RwLock<CommandMap>,
    facade: RwLock<Weak<Facade>>,
}

impl Dispatcher {
    fn execute(&self, notification: &Notification) -> SwitchboardResult<()> {
        let Some(factory) = self.commands.read().get(notification.name()).cloned() else {
            return Ok(());
        };

        let notifier = Notifier::new(self.facade.read().clone());
        let mut command: Box<dyn Command> = factory();
        command.initialize_notifier(notifier);

        trace!(notification = notification.name(), "Executing command");
        command.execute(notification)
    }
}

pub struct Controller {
    view: Arc<View>,
    dispatcher: Arc<Dispatcher>,
    identity: Identity,
    wiring: Mutex<()>,
}

impl Controller {
    /// Controller wired to `view`, independent of the process-wide instances.
    #[must_use]
    pub fn new(view: Arc<View>) -> Self {
        Self {
            view,
            dispatcher: Arc::new(Dispatcher {
                commands: RwLock::new(HashMap::with_hasher(RandomState::new())),
                facade: RwLock::new(Weak::new()),
            }),
            identity: Identity::unique(),
            wiring: Mutex::new(()),
        }
    }

    /// Process-wide instance bound to the process-wide [`View`].
    pub fn instance() -> Arc<Self> {
        let mut slot = INSTANCE.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            info!("Creating process-wide Controller instance");
            Arc::new(Self::new(View::instance()))
        }))
    }

    pub fn reset_instance() {
        INSTANCE.lock().take();
    }

    /// Point the notifier handed to commands at `facade`.
    pub(crate) fn attach_facade(&self, facade: Weak<Facade>) {
        *self.dispatcher.facade.write() = facade;
    }

    #[must_use]
    pub fn view(&self) -> &Arc<View> {
        &self.view
    }

    /// The identity this controller's observers are registered under
    #[must_use]
    pub const fn identity(&self) -> Identity {
        self.identity
    }

    /// Map `name` to a command built by `factory`.
    ///
    /// Re-registering a name swaps the factory without adding a second
    /// observer, so each broadcast still runs exactly one command.
    pub fn register_command<C, F>(&self, name: &str, factory: F)
    where
        C: Command + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.register_command_factory(name, command_factory(factory));
    }

    pub fn register_command_factory(&self, name: &str, factory: CommandFactory) {
        let _wiring = self.wiring.lock();

        if !self.has_command(name) {
            let dispatcher = Arc::clone(&self.dispatcher);
            self.view.register_observer(
                name,
                Observer::new(move |notification| dispatcher.execute(notification), self.identity),
            );
        }

        let replaced = self
            .dispatcher
            .commands
            .write()
            .insert(CompactString::new(name), factory)
            .is_some();

        debug!(notification = name, replaced, "Command registered");
    }

    /// Run the command registered for the notification's name, if any.
    pub fn execute_command(&self, notification: &Notification) -> SwitchboardResult<()> {
        self.dispatcher.execute(notification)
    }

    /// Drop the mapping for `name` and unsubscribe from the View.
    /// Returns whether a mapping existed.
    pub fn remove_command(&self, name: &str) -> bool {
        let _wiring = self.wiring.lock();

        if !self.has_command(name) {
            return false;
        }

        self.view.remove_observer(name, &self.identity);
        self.dispatcher.commands.write().remove(name);

        debug!(notification = name, "Command removed");
        true
    }

    #[must_use]
    pub fn has_command(&self, name: &str) -> bool {
        self.dispatcher.commands.read().contains_key(name)
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("identity", &self.identity)
            .field("command_count", &self.dispatcher.commands.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::command::FnCommand;
    use parking_lot::Mutex as PlMutex;

    #[derive(Default)]
    struct ControllerTestVo {
        input: i64,
        result: i64,
    }

    #[derive(Default)]
    struct ControllerTestCommand;

    impl Command for ControllerTestCommand {
        fn execute(&mut self, notification: &Notification) -> SwitchboardResult<()> {
            let mut vo = notification.body::<PlMutex<ControllerTestVo>>().unwrap().lock();
            vo.result = 2 * vo.input;
            Ok(())
        }
    }

    /// Accumulates instead of overwriting, to expose double execution
    #[derive(Default)]
    struct ControllerTestCommand2;

    impl Command for ControllerTestCommand2 {
        fn execute(&mut self, notification: &Notification) -> SwitchboardResult<()> {
            let mut vo = notification.body::<PlMutex<ControllerTestVo>>().unwrap().lock();
            vo.result += 2 * vo.input;
            Ok(())
        }
    }

    fn vo_note(name: &str, input: i64) -> (Arc<PlMutex<ControllerTestVo>>, Notification) {
        let vo = Arc::new(PlMutex::new(ControllerTestVo { input, result: 0 }));
        let note = Notification::new(name)
            .unwrap()
            .with_shared_body(Arc::clone(&vo));
        (vo, note)
    }

    #[test]
    fn test_register_and_execute_command() {
        let controller = Controller::new(Arc::new(View::new()));
        controller.register_command("ControllerTest", ControllerTestCommand::default);

        let (vo, note) = vo_note("ControllerTest", 12);
        controller.execute_command(&note).unwrap();

        assert_eq!(vo.lock().result, 24);
    }

    #[test]
    fn test_register_and_remove_command() {
        let view = Arc::new(View::new());
        let controller = Controller::new(Arc::clone(&view));
        controller.register_command("ControllerRemoveTest", ControllerTestCommand::default);
        assert!(view.has_observers("ControllerRemoveTest"));

        let (vo, note) = vo_note("ControllerRemoveTest", 12);
        view.notify_observers(&note).unwrap();
        assert_eq!(vo.lock().result, 24);

        vo.lock().result = 0;
        assert!(controller.remove_command("ControllerRemoveTest"));
        assert!(!view.has_observers("ControllerRemoveTest"));

        view.notify_observers(&note).unwrap();
        assert_eq!(vo.lock().result, 0);
    }

    #[test]
    fn test_has_command() {
        let controller = Controller::new(Arc::new(View::new()));
        controller.register_command("hasCommandTest", ControllerTestCommand::default);
        assert!(controller.has_command("hasCommandTest"));

        controller.remove_command("hasCommandTest");
        assert!(!controller.has_command("hasCommandTest"));
        assert!(!controller.remove_command("hasCommandTest"));
    }

    #[test]
    fn test_reregister_replaces_factory_with_single_observer() {
        let view = Arc::new(View::new());
        let controller = Controller::new(Arc::clone(&view));

        controller.register_command("Swap", ControllerTestCommand::default);
        controller.register_command("Swap", ControllerTestCommand2::default);
        assert_eq!(view.observer_count("Swap"), 1);

        let (vo, note) = vo_note("Swap", 12);
        view.notify_observers(&note).unwrap();
        assert_eq!(vo.lock().result, 24);
    }

    #[test]
    fn test_command_may_register_commands_while_running() {
        let view = Arc::new(View::new());
        let controller = Arc::new(Controller::new(Arc::clone(&view)));

        let inner = Arc::clone(&controller);
        controller.register_command("Bootstrap", move || {
            let inner = Arc::clone(&inner);
            FnCommand::new(move |_, _| {
                inner.register_command("Late", ControllerTestCommand::default);
                inner.remove_command("Bootstrap");
                Ok(())
            })
        });

        view.notify_observers(&Notification::new("Bootstrap").unwrap()).unwrap();
        assert!(controller.has_command("Late"));
        assert!(!controller.has_command("Bootstrap"));
        assert!(!view.has_observers("Bootstrap"));
    }

    #[test]
    fn test_concurrent_wiring_and_dispatch_settle_on_one_observer() {
        use std::thread;

        let view = Arc::new(View::new());
        let controller = Arc::new(Controller::new(Arc::clone(&view)));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let controller = Arc::clone(&controller);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    controller.register_command("Churn", ControllerTestCommand::default);
                    controller.remove_command("Churn");
                }
            }));
        }
        for _ in 0..2 {
            let view = Arc::clone(&view);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let (_, note) = vo_note("Churn", 3);
                    view.notify_observers(&note).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!controller.has_command("Churn"));
        assert_eq!(view.observer_count("Churn"), 0);

        controller.register_command("Churn", ControllerTestCommand::default);
        controller.register_command("Churn", ControllerTestCommand::default);
        assert_eq!(view.observer_count("Churn"), 1);
    }
}
