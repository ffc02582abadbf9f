//! In-process publish/subscribe and command dispatch.
//!
//! Three registries wire application components together without direct
//! references between them:
//!
//! - [`View`]: notification name → observers, plus named [`Listener`]s
//! - [`Controller`]: notification name → [`Command`] factory
//! - [`Model`]: named data [`Holder`]s
//!
//! [`Facade`] composes one of each behind a single entry point.

pub mod error;

pub mod config;

pub mod logging;

pub mod notification;
pub use notification::{Body, Notification};

pub mod observer;
pub use observer::{Identity, Observer};

pub mod model {
    pub mod holder;
    pub use holder::{DataHolder, Holder};

    pub mod registry;
    pub use registry::Model;
}

pub mod view {
    pub mod listener;
    pub use listener::{Listener, ListenerBase};

    pub mod registry;
    pub use registry::{DispatchStats, View};
}

pub mod controller {
    pub mod command;
    pub use command::{
        Command, CommandFactory, FnCommand, MacroCommand, MacroInitializer, command_factory,
    };

    pub mod registry;
    pub use registry::Controller;
}

pub mod facade;
pub use facade::{Facade, Notifier};

pub mod util {
    pub mod downcast;
}

pub use config::{Config, DispatchConfig};
pub use controller::{Command, Controller, MacroCommand};
pub use error::{SwitchboardError, SwitchboardResult};
pub use model::{DataHolder, Holder, Model};
pub use view::{Listener, ListenerBase, View};
