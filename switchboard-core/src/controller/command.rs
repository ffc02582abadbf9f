//! `command.rs`
//!
//! One-shot handlers constructed per dispatch by the
//! [`Controller`](super::Controller).

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use crate::error::SwitchboardResult;
use crate::facade::Notifier;
use crate::notification::Notification;

/// A unit of business logic run in response to a notification.
///
/// A fresh instance is built for every dispatch, so nothing carries over
/// between notifications unless the command stores it elsewhere.
pub trait Command {
    /// Called by the framework before `execute`
    fn initialize_notifier(&mut self, _notifier: Notifier) {}

    fn execute(&mut self, notification: &Notification) -> SwitchboardResult<()>;
}

/// Builds a new command for each dispatch
pub type CommandFactory = Arc<dyn Fn() -> Box<dyn Command> + Send + Sync>;

/// Erase a typed factory closure into a [`CommandFactory`].
pub fn command_factory<C, F>(factory: F) -> CommandFactory
where
    C: Command + 'static,
    F: Fn() -> C + Send + Sync + 'static,
{
    Arc::new(move || Box::new(factory()) as Box<dyn Command>)
}

/// Adapter running a closure as a command
pub struct FnCommand<F> {
    run: F,
    notifier: Notifier,
}

impl<F> FnCommand<F> {
    pub fn new(run: F) -> Self
    where
        F: FnMut(&Notifier, &Notification) -> SwitchboardResult<()>,
    {
        Self {
            run,
            notifier: Notifier::detached(),
        }
    }
}

impl<F> Command for FnCommand<F>
where
    F: FnMut(&Notifier, &Notification) -> SwitchboardResult<()>,
{
    fn initialize_notifier(&mut self, notifier: Notifier) {
        self.notifier = notifier;
    }

    fn execute(&mut self, notification: &Notification) -> SwitchboardResult<()> {
        (self.run)(&self.notifier, notification)
    }
}

/// Runs once at the start of [`MacroCommand::execute`], after the notifier
/// has been injected
pub type MacroInitializer = Box<dyn FnOnce(&mut MacroCommand)>;

/// Composite command running its sub-commands in FIFO order.
///
/// Sub-commands are added either while the factory builds the macro or by an
/// initializer the framework runs when the macro executes. `execute` drains
/// the queue, so a second `execute` on the same instance runs nothing. The
/// controller never reuses an instance.
///
/// ```rust,ignore
/// controller.register_command("Startup", || {
///     MacroCommand::with_initializer(|startup| {
///         startup.add_sub_command(PrepareModel::default);
///         startup.add_sub_command(PrepareView::default);
///     })
/// });
/// ```
#[derive(Default)]
pub struct MacroCommand {
    sub_commands: VecDeque<CommandFactory>,
    notifier: Option<Notifier>,
    initializer: Option<MacroInitializer>,
}

impl MacroCommand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Macro whose sub-commands are queued by `initializer` when it executes.
    #[must_use]
    pub fn with_initializer<I>(initializer: I) -> Self
    where
        I: FnOnce(&mut MacroCommand) + 'static,
    {
        Self {
            initializer: Some(Box::new(initializer)),
            ..Self::default()
        }
    }

    /// Run the pending initializer, if any. Called by `execute`; calling it
    /// earlier just queues the sub-commands sooner.
    pub fn initialize_macro_command(&mut self) {
        if let Some(initializer) = self.initializer.take() {
            initializer(self);
        }
    }

    #[must_use]
    pub fn notifier(&self) -> Option<&Notifier> {
        self.notifier.as_ref()
    }

    pub fn add_sub_command<C, F>(&mut self, factory: F)
    where
        C: Command + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.sub_commands.push_back(command_factory(factory));
    }

    pub fn add_sub_command_factory(&mut self, factory: CommandFactory) {
        self.sub_commands.push_back(factory);
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.sub_commands.len()
    }
}

impl Command for MacroCommand {
    fn initialize_notifier(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    /// Stops at the first failing sub-command; the rest stay queued.
    fn execute(&mut self, notification: &Notification) -> SwitchboardResult<()> {
        self.initialize_macro_command();

        while let Some(factory) = self.sub_commands.pop_front() {
            let mut command = factory();
            if let Some(notifier) = &self.notifier {
                command.initialize_notifier(notifier.clone());
            }

            trace!(notification = notification.name(), remaining = self.sub_commands.len(), "Running sub-command");
            command.execute(notification)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwitchboardError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MacroVo {
        input: i64,
        result1: i64,
        result2: i64,
    }

    #[derive(Default)]
    struct DoubleIt;

    impl Command for DoubleIt {
        fn execute(&mut self, notification: &Notification) -> SwitchboardResult<()> {
            let mut vo = notification.body::<Mutex<MacroVo>>().unwrap().lock();
            vo.result1 = 2 * vo.input;
            Ok(())
        }
    }

    #[derive(Default)]
    struct SquareIt;

    impl Command for SquareIt {
        fn execute(&mut self, notification: &Notification) -> SwitchboardResult<()> {
            let mut vo = notification.body::<Mutex<MacroVo>>().unwrap().lock();
            vo.result2 = vo.input * vo.input;
            Ok(())
        }
    }

    fn note_for(vo: &Arc<Mutex<MacroVo>>) -> Notification {
        Notification::new("MacroCommandTest")
            .unwrap()
            .with_shared_body(Arc::clone(vo))
    }

    #[test]
    fn test_macro_runs_sub_commands_in_order() {
        let vo = Arc::new(Mutex::new(MacroVo {
            input: 5,
            ..MacroVo::default()
        }));

        let mut command = MacroCommand::new();
        command.add_sub_command(DoubleIt::default);
        command.add_sub_command(SquareIt::default);
        command.execute(&note_for(&vo)).unwrap();

        let vo = vo.lock();
        assert_eq!(vo.result1, 10);
        assert_eq!(vo.result2, 25);
    }

    #[test]
    fn test_macro_drains_on_execute() {
        let vo = Arc::new(Mutex::new(MacroVo::default()));
        let runs = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&runs);
        let mut command = MacroCommand::new();
        command.add_sub_command(move || {
            let counter = Arc::clone(&counter);
            FnCommand::new(move |_, _| {
                *counter.lock() += 1;
                Ok(())
            })
        });

        assert_eq!(command.pending(), 1);
        command.execute(&note_for(&vo)).unwrap();
        command.execute(&note_for(&vo)).unwrap();

        assert_eq!(command.pending(), 0);
        assert_eq!(*runs.lock(), 1);
    }

    #[test]
    fn test_macro_stops_at_failing_sub_command() {
        let vo = Arc::new(Mutex::new(MacroVo {
            input: 3,
            ..MacroVo::default()
        }));

        let mut command = MacroCommand::new();
        command.add_sub_command(|| FnCommand::new(|_, _| Err(SwitchboardError::handler("first fails"))));
        command.add_sub_command(SquareIt::default);

        assert!(command.execute(&note_for(&vo)).is_err());
        assert_eq!(command.pending(), 1);
        assert_eq!(vo.lock().result2, 0);
    }

    #[test]
    fn test_initializer_queues_sub_commands_on_execute() {
        let vo = Arc::new(Mutex::new(MacroVo {
            input: 5,
            ..MacroVo::default()
        }));
        let saw_notifier = Arc::new(Mutex::new(false));

        let flag = Arc::clone(&saw_notifier);
        let mut command = MacroCommand::with_initializer(move |macro_command| {
            *flag.lock() = macro_command.notifier().is_some();
            macro_command.add_sub_command(DoubleIt::default);
            macro_command.add_sub_command(SquareIt::default);
        });
        assert_eq!(command.pending(), 0);

        command.initialize_notifier(Notifier::detached());
        command.execute(&note_for(&vo)).unwrap();

        assert!(*saw_notifier.lock());
        let vo = vo.lock();
        assert_eq!(vo.result1, 10);
        assert_eq!(vo.result2, 25);
    }

    #[test]
    fn test_initializer_runs_once() {
        let vo = Arc::new(Mutex::new(MacroVo::default()));
        let runs = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&runs);
        let mut command = MacroCommand::with_initializer(move |_| *counter.lock() += 1);
        command.initialize_macro_command();
        command.execute(&note_for(&vo)).unwrap();
        command.execute(&note_for(&vo)).unwrap();

        assert_eq!(*runs.lock(), 1);
    }
}
