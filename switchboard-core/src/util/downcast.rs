//! src/util/downcast.rs

use std::any::Any;
use std::sync::Arc;

/// Lets a registry hand back `Arc<dyn Trait>` entries as their concrete type.
///
/// Blanket-implemented; collaborator traits only need it as a supertrait.
pub trait AsAnyArc: Any + Send + Sync {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// `None` if `value` is not a `T`
pub fn downcast_arc<T, U>(value: Arc<U>) -> Option<Arc<T>>
where
    T: Any + Send + Sync,
    U: AsAnyArc + ?Sized,
{
    value.into_any_arc().downcast::<T>().ok()
}
