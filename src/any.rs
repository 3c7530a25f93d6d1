use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};
use std::sync::Arc;

/// Key under which a service is registered and requested.
///
/// Any `'static` type can be a service id, including trait objects like `dyn Repo`.
#[derive(Debug, Clone, Copy)]
pub struct ServiceId {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for ServiceId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceId {}

impl PartialOrd for ServiceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for ServiceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for ServiceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl ServiceId {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let name = self.name;
        let end = name.find(|c: char| matches!(c, '<' | '(' | '[')).unwrap_or(name.len());
        name[..end].rfind("::").map_or(name, |start| &name[start + 2..])
    }
}

/// Type-erased service pointer.
///
/// Always wraps the `Arc<T>` of the service type it was created for, so unsized services
/// keep a single identity no matter how many times the instance is cloned.
#[derive(Clone)]
pub struct Instance {
    service: ServiceId,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    #[inline]
    #[must_use]
    pub fn new<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            service: ServiceId::of::<T>(),
            value: Arc::new(value),
        }
    }

    /// Service id the instance was created for
    #[inline]
    #[must_use]
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// Returns `None` if the instance was not created for `T`
    #[inline]
    #[must_use]
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + 'static,
    {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("service", &self.service.name).finish_non_exhaustive()
    }
}
