//! `holder.rs`
//!
//! Named data-storage units kept by the [`Model`](super::Model).

use std::any::Any;
use std::sync::Arc;

use compact_str::CompactString;
use parking_lot::RwLock;

use crate::facade::Notifier;
use crate::notification::Body;
use crate::util::downcast::AsAnyArc;

/// Capability interface for data holders.
pub trait Holder: AsAnyArc {
    /// Registry key; must not change while registered
    fn holder_name(&self) -> &str;

    /// Opaque payload, if the holder exposes one
    fn data(&self) -> Option<Body> {
        None
    }

    fn set_data(&self, _data: Option<Body>) {}

    /// Called by the facade before registration
    fn initialize_notifier(&self, _notifier: Notifier) {}

    fn on_registered(&self) {}

    fn on_removed(&self) {}
}

/// Embeddable base holding a name and an opaque data slot.
pub struct DataHolder {
    name: CompactString,
    data: RwLock<Option<Body>>,
    notifier: RwLock<Option<Notifier>>,
}

impl DataHolder {
    pub const DEFAULT_NAME: &'static str = "Holder";

    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: CompactString::new(if name.is_empty() {
                Self::DEFAULT_NAME
            } else {
                name
            }),
            data: RwLock::new(None),
            notifier: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_data<T: Any + Send + Sync>(self, data: T) -> Self {
        *self.data.write() = Some(Arc::new(data));
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data downcast to `T`; `None` if empty or of another type
    #[must_use]
    pub fn data_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.data
            .read()
            .clone()
            .and_then(|data| data.downcast::<T>().ok())
    }

    #[must_use]
    pub fn notifier(&self) -> Option<Notifier> {
        self.notifier.read().clone()
    }
}

impl Holder for DataHolder {
    fn holder_name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> Option<Body> {
        self.data.read().clone()
    }

    fn set_data(&self, data: Option<Body>) {
        *self.data.write() = data;
    }

    fn initialize_notifier(&self, notifier: Notifier) {
        *self.notifier.write() = Some(notifier);
    }
}

impl std::fmt::Debug for DataHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataHolder")
            .field("name", &self.name)
            .field("has_data", &self.data.read().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_accessor() {
        let holder = DataHolder::new("TestHolder");
        assert_eq!(holder.holder_name(), "TestHolder");
        assert_eq!(DataHolder::new("").name(), DataHolder::DEFAULT_NAME);
    }

    #[test]
    fn test_data_roundtrip_through_slot() {
        let holder = DataHolder::new("colors").with_data(vec!["red", "green", "blue"]);
        assert_eq!(holder.data_as::<Vec<&str>>().unwrap().len(), 3);

        holder.set_data(Some(Arc::new(7_u32)));
        assert!(holder.data_as::<Vec<&str>>().is_none());
        assert_eq!(holder.data_as::<u32>().as_deref(), Some(&7));

        holder.set_data(None);
        assert!(holder.data().is_none());
    }
}
