//! `notification.rs`
//!
//! Immutable named event value broadcast through the [`View`](crate::view::View).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;

use crate::error::{SwitchboardError, SwitchboardResult};

/// Opaque payload shared by every observer of one broadcast
pub type Body = Arc<dyn Any + Send + Sync>;

/// A named event with an optional payload and an optional free-form type tag.
///
/// Built once by the broadcaster and never mutated afterwards; observers only
/// ever see `&Notification`.
#[derive(Clone)]
pub struct Notification {
    name: CompactString,
    body: Option<Body>,
    kind: Option<CompactString>,
}

impl Notification {
    /// Create a notification without body or type tag.
    ///
    /// Fails with [`SwitchboardError::InvalidInput`] if `name` is empty.
    pub fn new(name: &str) -> SwitchboardResult<Self> {
        if name.is_empty() {
            return Err(SwitchboardError::invalid_input(
                "name",
                "notification name must not be empty",
            ));
        }

        Ok(Self {
            name: CompactString::new(name),
            body: None,
            kind: None,
        })
    }

    /// Full constructor used by the facade's `send_notification`.
    pub fn with_parts(name: &str, body: Option<Body>, kind: Option<&str>) -> SwitchboardResult<Self> {
        let mut notification = Self::new(name)?;
        notification.body = body;
        notification.kind = kind.map(CompactString::new);
        Ok(notification)
    }

    #[must_use]
    pub fn with_body<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.body = Some(Arc::new(value));
        self
    }

    /// Attach a payload the caller keeps a handle to (e.g. a value object
    /// the handlers write results into).
    #[must_use]
    pub fn with_shared_body<T: Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        self.body = Some(value);
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(CompactString::new(kind));
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Payload downcast to `T`, `None` if absent or of another type
    #[must_use]
    pub fn body<T: Any>(&self) -> Option<&T> {
        self.body.as_deref().and_then(|body| body.downcast_ref::<T>())
    }

    #[must_use]
    pub fn body_arc(&self) -> Option<Body> {
        self.body.clone()
    }

    #[inline]
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("name", &self.name)
            .field("has_body", &self.body.is_some())
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "Notification '{}' ({kind})", self.name),
            None => write!(f, "Notification '{}'", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_empty_name_rejected() {
        let result = Notification::new("");
        assert!(matches!(
            result,
            Err(SwitchboardError::InvalidInput { ref field, .. }) if field == "name"
        ));
    }

    #[test]
    fn test_body_and_kind_accessors() {
        let note = Notification::new("TestNote")
            .unwrap()
            .with_body(5_i32)
            .with_kind("TestNoteType");

        assert_eq!(note.name(), "TestNote");
        assert_eq!(note.kind(), Some("TestNoteType"));
        assert_eq!(note.body::<i32>(), Some(&5));
        assert_eq!(note.body::<String>(), None);
    }

    #[test]
    fn test_shared_body_is_visible_to_caller() {
        let shared = Arc::new(Mutex::new(0_u32));
        let note = Notification::new("Shared")
            .unwrap()
            .with_shared_body(Arc::clone(&shared));

        *note.body::<Mutex<u32>>().unwrap().lock() = 7;
        assert_eq!(*shared.lock(), 7);
    }

    #[test]
    fn test_display() {
        let note = Notification::with_parts("Ping", None, Some("heartbeat")).unwrap();
        assert_eq!(note.to_string(), "Notification 'Ping' (heartbeat)");
        assert!(!note.has_body());
    }
}
