use std::sync::Arc;
use tracing::error;

use crate::{any::ServiceId, Instance};

/// Releases resources held by a singleton when its container is disposed or dropped.
///
/// Finalizers run in LIFO order of activation (not the order of registration).
///
/// # Warning
/// [`Drop`] isn't an equivalent of a finalizer: an instance can outlive its container when
/// callers still hold it, while the finalizer marks the end of the container's ownership.
pub trait Finalizer<T: ?Sized>: Send + Sync + 'static {
    fn finalize(&self, instance: Arc<T>);
}

impl<F, T> Finalizer<T> for F
where
    F: Fn(Arc<T>) + Send + Sync + 'static,
    T: ?Sized,
{
    #[inline]
    fn finalize(&self, instance: Arc<T>) {
        self(instance);
    }
}

pub(crate) type BoxedFinalizer = Box<dyn Fn(&Instance) + Send + Sync>;

#[must_use]
pub(crate) fn boxed_finalizer<T, Fin>(finalizer: Fin) -> BoxedFinalizer
where
    T: ?Sized + Send + Sync + 'static,
    Fin: Finalizer<T>,
{
    Box::new(move |instance: &Instance| match instance.downcast::<T>() {
        Some(instance) => finalizer.finalize(instance),
        None => error!(
            expected = ServiceId::of::<T>().name,
            actual = instance.service().name,
            "Finalizer skipped, instance has another type"
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::boxed_finalizer;
    use crate::Instance;

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    struct Pool;

    #[test]
    #[traced_test]
    fn test_boxed_finalizer() {
        let call_count = Arc::new(AtomicU8::new(0));
        let finalizer = boxed_finalizer({
            let call_count = call_count.clone();
            move |_: Arc<Pool>| {
                call_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        finalizer(&Instance::new(Arc::new(Pool)));
        finalizer(&Instance::new(Arc::new(1u8)));

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Finalizer skipped"));
    }
}
