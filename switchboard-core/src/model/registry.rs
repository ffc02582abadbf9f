//! `registry.rs`
//!
//! The component registry: holder name → data holder. Pure keyed storage;
//! registering under a taken name replaces the previous holder.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use compact_str::CompactString;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::model::holder::Holder;
use crate::util::downcast::downcast_arc;

static INSTANCE: Lazy<Mutex<Option<Arc<Model>>>> = Lazy::new(|| Mutex::new(None));

type HolderMap = HashMap<CompactString, Arc<dyn Holder>, RandomState>;

#[derive(Default)]
pub struct Model {
    holders: RwLock<HolderMap>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance() -> Arc<Self> {
        let mut slot = INSTANCE.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            info!("Creating process-wide Model instance");
            Arc::new(Self::new())
        }))
    }

    pub fn reset_instance() {
        INSTANCE.lock().take();
    }

    /// Store `holder` under its name, overwriting any previous holder, then
    /// fire its `on_registered` hook (outside the lock).
    pub fn register_holder(&self, holder: Arc<dyn Holder>) {
        let name = CompactString::new(holder.holder_name());
        let replaced = self
            .holders
            .write()
            .insert(name.clone(), Arc::clone(&holder))
            .is_some();

        debug!(holder = %name, replaced, "Holder registered");
        holder.on_registered();
    }

    #[must_use]
    pub fn retrieve_holder(&self, name: &str) -> Option<Arc<dyn Holder>> {
        self.holders.read().get(name).cloned()
    }

    #[must_use]
    pub fn retrieve_holder_as<T: Holder>(&self, name: &str) -> Option<Arc<T>> {
        self.retrieve_holder(name).and_then(downcast_arc::<T, _>)
    }

    /// Remove and return the holder, firing `on_removed` if one was found.
    pub fn remove_holder(&self, name: &str) -> Option<Arc<dyn Holder>> {
        let removed = self.holders.write().remove(name)?;

        debug!(holder = name, "Holder removed");
        removed.on_removed();
        Some(removed)
    }

    #[must_use]
    pub fn has_holder(&self, name: &str) -> bool {
        self.holders.read().contains_key(name)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("holder_count", &self.holders.read().len())
            .finish()
    }
}
