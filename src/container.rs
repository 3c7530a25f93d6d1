use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use tracing::{debug, error, info_span};

use crate::{
    activator::ActivationCache,
    any::ServiceId,
    config::Config,
    errors::{DisposeErrorKind, InstantiateErrorKind, RegisterErrorKind, ResolveErrorKind, ScopeErrorKind},
    injectable::{Injectable, Upcast},
    loader::{BulkLoader, ExportFn, ExportScanner},
    registration::{OverridePolicy, Registration},
    registry::{finalize, Entry, Insertion, Registry},
    Instance,
};

/// Dependency injection container.
///
/// Cloning is cheap and every clone refers to the same registry.
/// A child container created with [`Self::child`] resolves services it doesn't register
/// through its parent, but doesn't keep the parent alive.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    #[inline]
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_loader(config, ExportScanner)
    }

    /// Creates a root container with a custom bulk loader.
    /// Child containers share the loader.
    #[must_use]
    pub fn with_loader(config: Config, loader: impl BulkLoader + 'static) -> Self {
        Self {
            inner: Arc::new(ContainerInner::new(config, Arc::new(loader), None)),
        }
    }

    /// Creates a child container with an empty registry.
    /// Lookups that miss locally cascade to this container.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::AlreadyDisposed`] if the container is disposed
    pub fn child(&self) -> Result<Container, ScopeErrorKind> {
        if self.inner.is_disposed() {
            let err = ScopeErrorKind::AlreadyDisposed;
            error!("{}", err);
            return Err(err);
        }

        debug!("Child container created");
        Ok(Self {
            inner: Arc::new(ContainerInner::new(
                self.inner.config,
                self.inner.loader.clone(),
                Some(Arc::downgrade(&self.inner)),
            )),
        })
    }

    /// Registers a pre-built instance, returned for every resolution
    ///
    /// # Errors
    /// See [`Self::register_with`]
    #[inline]
    pub fn register_instance<T>(&self, instance: Arc<T>) -> Result<(), RegisterErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_with(Registration::instance(instance), OverridePolicy::Reject)
    }

    /// Registers a pre-built instance owned by the container, so its finalizer runs on dispose
    ///
    /// # Errors
    /// See [`Self::register_with`]
    #[inline]
    pub fn register_instance_as_singleton<T>(&self, instance: Arc<T>) -> Result<(), RegisterErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_with(Registration::instance(instance).singleton(), OverridePolicy::Reject)
    }

    /// # Errors
    /// See [`Self::register_with`]
    #[inline]
    pub fn register_factory<T, F>(&self, factory: F) -> Result<(), RegisterErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Result<Arc<T>, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.register_with(Registration::factory(factory), OverridePolicy::Reject)
    }

    /// # Warning
    /// The factory result isn't cached, see [`Registration::factory`]
    ///
    /// # Errors
    /// See [`Self::register_with`]
    #[inline]
    pub fn register_factory_as_singleton<T, F>(&self, factory: F) -> Result<(), RegisterErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Result<Arc<T>, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.register_with(Registration::factory(factory).singleton(), OverridePolicy::Reject)
    }

    /// Registers `T` under its own service id
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::MultipleOrNoPublicConstructors`] if `T` doesn't declare exactly one constructor
    /// - See [`Self::register_with`]
    #[inline]
    pub fn register<T: Injectable>(&self) -> Result<(), RegisterErrorKind> {
        self.register_with(Registration::of::<T>()?, OverridePolicy::Reject)
    }

    /// # Errors
    /// See [`Self::register`]
    #[inline]
    pub fn register_as_singleton<T: Injectable>(&self) -> Result<(), RegisterErrorKind> {
        self.register_with(Registration::of::<T>()?.singleton(), OverridePolicy::Reject)
    }

    /// Registers `Impl` under the `Contract` service id
    ///
    /// # Errors
    /// See [`Self::register`]
    #[inline]
    pub fn register_type<Contract, Impl>(&self) -> Result<(), RegisterErrorKind>
    where
        Contract: ?Sized + Send + Sync + 'static,
        Impl: Injectable + Upcast<Contract>,
    {
        self.register_with(Registration::implementation::<Contract, Impl>()?, OverridePolicy::Reject)
    }

    /// # Errors
    /// See [`Self::register`]
    #[inline]
    pub fn register_type_as_singleton<Contract, Impl>(&self) -> Result<(), RegisterErrorKind>
    where
        Contract: ?Sized + Send + Sync + 'static,
        Impl: Injectable + Upcast<Contract>,
    {
        self.register_with(
            Registration::implementation::<Contract, Impl>()?.singleton(),
            OverridePolicy::Reject,
        )
    }

    /// Registers with an explicit override policy.
    /// A replaced singleton is finalized.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::DuplicateRegistration`] if the service id is taken and the policy is [`OverridePolicy::Reject`]
    /// - Returns [`RegisterErrorKind::AlreadyDisposed`] if the container is disposed
    pub fn register_with(&self, registration: Registration, policy: OverridePolicy) -> Result<(), RegisterErrorKind> {
        let span = info_span!("register", service = registration.service.name, ?policy);
        let _guard = span.enter();

        let replaced = self.inner.write(|registry| match registry.insert(registration, policy)? {
            Insertion::Inserted => Ok((true, Vec::new())),
            Insertion::Replaced(entry) => Ok((true, vec![entry])),
            Insertion::Kept => Ok((false, Vec::new())),
        });

        match replaced {
            Ok(replaced) => {
                finalize(replaced);
                Ok(())
            }
            Err(err) => {
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Scans the unit with the container's bulk loader and merges the result as one batch.
    /// Replaced singletons are finalized.
    ///
    /// Returns the number of written registrations.
    ///
    /// # Errors
    /// - Returns the bulk loader error, if any. Nothing is registered in this case
    /// - Returns [`RegisterErrorKind::DuplicateRegistration`] if a service id is taken and the policy is [`OverridePolicy::Reject`]
    /// - Returns [`RegisterErrorKind::AlreadyDisposed`] if the container is disposed
    pub fn load_bulk(&self, unit: &[ExportFn], policy: OverridePolicy) -> Result<usize, RegisterErrorKind> {
        let span = info_span!("load_bulk", exports = unit.len(), ?policy);
        let _guard = span.enter();

        let result = self.inner.loader.scan(unit).and_then(|registrations| {
            self.inner.write(|registry| {
                let (written, replaced) = registry.merge(registrations, policy)?;
                Ok((written > 0, (written, replaced)))
            })
        });

        match result {
            Ok((written, replaced)) => {
                finalize(replaced);
                debug!(written, "Bulk loaded");
                Ok(written)
            }
            Err(err) => {
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Loads the process-wide [`crate::EXPORTS`] unit
    ///
    /// # Errors
    /// See [`Self::load_bulk`]
    #[cfg(feature = "auto")]
    #[inline]
    pub fn load_exports(&self, policy: OverridePolicy) -> Result<usize, RegisterErrorKind> {
        self.load_bulk(&crate::loader::EXPORTS, policy)
    }

    /// Resolves a service by its type
    ///
    /// # Errors
    /// See [`Self::resolve_id`]
    pub fn resolve<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let expected = ServiceId::of::<T>();
        let instance = self.resolve_id(expected)?;

        instance.downcast::<T>().ok_or_else(|| {
            let err = ResolveErrorKind::IncorrectType {
                expected,
                actual: instance.service(),
            };
            error!("{}", err);
            err
        })
    }

    /// Resolves a service by its id.
    /// Singletons are activated at most once, transient services are built per call.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::UnregisteredType`] if the service isn't registered in the container chain
    /// - Returns [`ResolveErrorKind::UnregisteredDependency`] if a dependency of the graph isn't registered
    /// - Returns [`ResolveErrorKind::CircularDependency`] if the graph contains a cycle
    /// - Returns [`ResolveErrorKind::AlreadyDisposed`] if the container is disposed
    /// - Returns [`ResolveErrorKind::Instantiate`] if a factory or a constructor failed
    pub fn resolve_id(&self, service: ServiceId) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("resolve", service = service.name);
        let _guard = span.enter();

        self.inner.resolve(service).map_err(|err| {
            error!("{}", err);
            err
        })
    }

    /// Resolves a service by its id and casts it to `T`.
    /// Returns `None` if the instance isn't of type `T`.
    ///
    /// # Errors
    /// See [`Self::resolve_id`]
    pub fn resolve_as<T>(&self, service: ServiceId) -> Result<Option<Arc<T>>, ResolveErrorKind>
    where
        T: ?Sized + 'static,
    {
        let instance = self.resolve_id(service)?;
        let value = instance.downcast::<T>();
        if value.is_none() {
            debug!(actual = instance.service().name, expected = ServiceId::of::<T>().name, "Invalid cast");
        }
        Ok(value)
    }

    /// Checks the local registry only, parents aren't consulted
    #[inline]
    #[must_use]
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.is_registered_id(&ServiceId::of::<T>())
    }

    /// Checks the local registry only, parents aren't consulted
    #[must_use]
    pub fn is_registered_id(&self, service: &ServiceId) -> bool {
        self.inner.registry.read().contains(service)
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Disposes the container: finalizes activated singletons in LIFO order of activation and clears the registry.
    /// Every later operation on the container fails.
    ///
    /// # Warning
    /// Parent and child containers aren't disposed.
    /// A child of a disposed container fails to resolve services it doesn't register itself.
    ///
    /// # Errors
    /// Returns [`DisposeErrorKind::AlreadyDisposed`] if the container is already disposed
    pub fn dispose(&self) -> Result<(), DisposeErrorKind> {
        let span = info_span!("dispose");
        let _guard = span.enter();

        let entries = {
            let mut registry = self.inner.registry.write();
            if self.inner.disposed.swap(true, Ordering::AcqRel) {
                let err = DisposeErrorKind::AlreadyDisposed;
                error!("{}", err);
                return Err(err);
            }
            self.inner.activators.invalidate();
            registry.drain()
        };

        finalize(entries);
        debug!("Container disposed");
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct ContainerInner {
    pub(crate) registry: RwLock<Registry>,
    pub(crate) activators: ActivationCache,
    parent: Option<Weak<ContainerInner>>,
    loader: Arc<dyn BulkLoader>,
    config: Config,
    disposed: AtomicBool,
}

impl ContainerInner {
    fn new(config: Config, loader: Arc<dyn BulkLoader>, parent: Option<Weak<ContainerInner>>) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            activators: ActivationCache::default(),
            parent,
            loader,
            config,
            disposed: AtomicBool::new(false),
        }
    }

    /// `None` for root containers and for children whose parent was dropped
    #[inline]
    #[must_use]
    pub(crate) fn parent(&self) -> Option<Arc<ContainerInner>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn resolve(self: &Arc<Self>, service: ServiceId) -> Result<Instance, ResolveErrorKind> {
        if self.config.compile_activators {
            self.resolve_compiled(service)
        } else {
            self.resolve_direct(service)
        }
    }

    /// Applies a registry write under the writer lock.
    /// The activation cache is invalidated if the write reports a change.
    fn write<T>(&self, write: impl FnOnce(&mut Registry) -> Result<(bool, T), RegisterErrorKind>) -> Result<T, RegisterErrorKind> {
        let mut registry = self.registry.write();
        if self.is_disposed() {
            return Err(RegisterErrorKind::AlreadyDisposed);
        }

        let (changed, value) = write(&mut registry)?;
        if changed {
            self.activators.invalidate();
        }
        Ok(value)
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if *self.disposed.get_mut() {
            return;
        }

        let entries: Vec<Arc<Entry>> = self.registry.get_mut().drain();
        finalize(entries);
        debug!("Container disposed on drop");
    }
}
