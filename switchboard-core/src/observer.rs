//! `observer.rs`
//!
//! A registered (callback, identity) pair. The identity is only ever used to
//! find the observer again on removal; it never owns the callback's target.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SwitchboardResult;
use crate::notification::Notification;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque handle compared by address or token, never by value.
///
/// Two listeners holding identical data still get distinct identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Address of a shared target (pointer metadata stripped)
    Address(usize),

    /// Process-unique token
    Token(u64),
}

impl Identity {
    /// Identity of whatever `target` points at.
    ///
    /// Only meaningful while the allocation is alive: once it is freed a new
    /// `Arc` may reuse the address. `View::register_listener` keeps each
    /// listener alive for as long as its observers are registered; callers
    /// passing `Identity::of` to `View::register_observer` must keep `target`
    /// alive themselves (capturing it in the callback is enough).
    #[must_use]
    pub fn of<T: ?Sized>(target: &Arc<T>) -> Self {
        Self::Address(Arc::as_ptr(target).cast::<()>() as usize)
    }

    #[must_use]
    pub fn unique() -> Self {
        Self::Token(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Observer callback; an `Err` aborts the remainder of the broadcast
pub type ObserverFn = dyn Fn(&Notification) -> SwitchboardResult<()> + Send + Sync;

/// Callback plus the identity it was registered under.
///
/// Cloning only bumps the callback's reference count, which is what makes
/// snapshotting an observer list cheap.
#[derive(Clone)]
pub struct Observer {
    callback: Arc<ObserverFn>,
    identity: Identity,
}

impl Observer {
    pub fn new<F>(callback: F, identity: Identity) -> Self
    where
        F: Fn(&Notification) -> SwitchboardResult<()> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            identity,
        }
    }

    /// Observer with a fresh [`Identity::unique`] token
    pub fn anonymous<F>(callback: F) -> Self
    where
        F: Fn(&Notification) -> SwitchboardResult<()> + Send + Sync + 'static,
    {
        Self::new(callback, Identity::unique())
    }

    #[inline]
    pub fn notify_observer(&self, notification: &Notification) -> SwitchboardResult<()> {
        (self.callback)(notification)
    }

    #[inline]
    #[must_use]
    pub fn compare_identity(&self, identity: &Identity) -> bool {
        self.identity == *identity
    }

    #[inline]
    #[must_use]
    pub const fn identity(&self) -> Identity {
        self.identity
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_invokes_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let observer = Observer::anonymous(move |note| {
            counter.fetch_add(*note.body::<usize>().unwrap_or(&0), Ordering::SeqCst);
            Ok(())
        });

        let note = Notification::new("ObserverTestNote").unwrap().with_body(10_usize);
        observer.notify_observer(&note).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_identity_compares_by_address_not_value() {
        let a = Arc::new(String::from("same"));
        let b = Arc::new(String::from("same"));

        assert_eq!(Identity::of(&a), Identity::of(&Arc::clone(&a)));
        assert_ne!(Identity::of(&a), Identity::of(&b));
    }

    #[test]
    fn test_compare_identity() {
        let target = Arc::new(());
        let observer = Observer::new(|_| Ok(()), Identity::of(&target));

        assert!(observer.compare_identity(&Identity::of(&target)));
        assert!(!observer.compare_identity(&Identity::unique()));
    }

    #[test]
    fn test_unique_tokens_differ() {
        assert_ne!(Identity::unique(), Identity::unique());
    }
}
