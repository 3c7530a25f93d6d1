use core::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::error;

use crate::{
    any::ServiceId,
    builder::{self, ObjectBuilder},
    errors::{InstantiateErrorKind, RegisterErrorKind},
    finalizer::{boxed_finalizer, BoxedFinalizer, Finalizer},
    injectable::{Injectable, Upcast},
    introspect::{constructor_shape, property_slots},
    Instance,
};

/// Whether a new instance is produced per resolution or one instance is shared
/// for the lifetime of the owning container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Transient,
    Singleton,
}

/// What to do when a service id is already registered in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverridePolicy {
    /// Fail with [`RegisterErrorKind::DuplicateRegistration`]
    #[default]
    Reject,
    /// The new registration wins
    Replace,
    /// The existing registration wins, the new one is dropped
    KeepExisting,
}

pub(crate) type FactoryFn = Arc<dyn Fn() -> Result<Instance, InstantiateErrorKind> + Send + Sync>;
pub(crate) type BuildFn = fn(Vec<Instance>, Vec<(&'static str, Instance)>) -> Result<Instance, InstantiateErrorKind>;
pub(crate) type PreparedBuildFn = Arc<dyn Fn(Vec<Instance>, Vec<(&'static str, Instance)>) -> Result<Instance, InstantiateErrorKind> + Send + Sync>;
pub(crate) type PrepareFn = fn() -> Result<PreparedBuildFn, InstantiateErrorKind>;

/// Introspected recipe of an implementation type
#[derive(Clone)]
pub(crate) struct Plan {
    pub(crate) implementation: ServiceId,
    pub(crate) constructor_dependencies: Vec<ServiceId>,
    pub(crate) property_dependencies: Vec<(&'static str, ServiceId)>,
    /// Validates and builds on every call
    pub(crate) build: BuildFn,
    /// Validates once and returns a reusable build procedure
    pub(crate) prepare: PrepareFn,
}

impl Plan {
    pub(crate) fn dependencies(&self) -> impl Iterator<Item = ServiceId> + '_ {
        self.constructor_dependencies
            .iter()
            .copied()
            .chain(self.property_dependencies.iter().map(|(_, service)| *service))
    }
}

#[derive(Clone)]
pub(crate) enum Source {
    Instance(Instance),
    Factory(FactoryFn),
    Construct(Plan),
}

fn build_erased<Contract, Impl>(arguments: Vec<Instance>, properties: Vec<(&'static str, Instance)>) -> Result<Instance, InstantiateErrorKind>
where
    Contract: ?Sized + Send + Sync + 'static,
    Impl: Injectable + Upcast<Contract>,
{
    let value = builder::build::<Impl>(arguments, properties)?;
    Ok(Instance::new(<Impl as Upcast<Contract>>::upcast(Arc::new(value))))
}

fn prepare_erased<Contract, Impl>() -> Result<PreparedBuildFn, InstantiateErrorKind>
where
    Contract: ?Sized + Send + Sync + 'static,
    Impl: Injectable + Upcast<Contract>,
{
    let builder = ObjectBuilder::<Impl>::new()?;
    Ok(Arc::new(
        move |arguments: Vec<Instance>, properties: Vec<(&'static str, Instance)>| {
            let value = builder.build(arguments, properties)?;
            Ok(Instance::new(<Impl as Upcast<Contract>>::upcast(Arc::new(value))))
        },
    ))
}

/// Recipe for producing instances of one service id.
///
/// Exactly one of a pre-built instance, a user factory or an implementation type drives construction.
pub struct Registration {
    pub(crate) service: ServiceId,
    pub(crate) implementation: Option<ServiceId>,
    pub(crate) source: Source,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) finalizer: Option<BoxedFinalizer>,
}

impl Registration {
    /// Registration of an already built value.
    /// The same instance is returned for every resolution, whatever the lifecycle.
    #[must_use]
    pub fn instance<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            service: ServiceId::of::<T>(),
            implementation: None,
            source: Source::Instance(Instance::new(value)),
            lifecycle: Lifecycle::Transient,
            finalizer: None,
        }
    }

    /// Registration of a user factory.
    ///
    /// # Warning
    /// The factory result is never cached, even with [`Lifecycle::Singleton`].
    /// A factory that should produce a single instance has to cache it itself.
    #[must_use]
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Result<Arc<T>, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            service: ServiceId::of::<T>(),
            implementation: None,
            source: Source::Factory(Arc::new(move || factory().map(Instance::new))),
            lifecycle: Lifecycle::Transient,
            finalizer: None,
        }
    }

    /// Registration of `Impl` under the `Contract` service id, built by introspected construction.
    ///
    /// # Errors
    /// Returns [`RegisterErrorKind::MultipleOrNoPublicConstructors`] if `Impl` doesn't declare exactly one constructor
    pub fn implementation<Contract, Impl>() -> Result<Self, RegisterErrorKind>
    where
        Contract: ?Sized + Send + Sync + 'static,
        Impl: Injectable + Upcast<Contract>,
    {
        let implementation = ServiceId::of::<Impl>();
        let constructor_dependencies = constructor_shape::<Impl>().map_err(|count| {
            let err = RegisterErrorKind::MultipleOrNoPublicConstructors {
                type_info: implementation,
                count,
            };
            error!("{}", err);
            err
        })?;

        Ok(Self {
            service: ServiceId::of::<Contract>(),
            implementation: Some(implementation),
            source: Source::Construct(Plan {
                implementation,
                constructor_dependencies,
                property_dependencies: property_slots::<Impl>(),
                build: build_erased::<Contract, Impl>,
                prepare: prepare_erased::<Contract, Impl>,
            }),
            lifecycle: Lifecycle::Transient,
            finalizer: None,
        })
    }

    /// Registration of `T` under its own service id
    ///
    /// # Errors
    /// See [`Self::implementation`]
    #[inline]
    pub fn of<T: Injectable>() -> Result<Self, RegisterErrorKind> {
        Self::implementation::<T, T>()
    }

    #[inline]
    #[must_use]
    pub fn singleton(self) -> Self {
        self.with_lifecycle(Lifecycle::Singleton)
    }

    #[inline]
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Adds a finalizer, called for the activated instance when the container is disposed or dropped.
    ///
    /// # Warning
    /// Only singletons are finalized, because transient instances aren't owned by the container.
    #[must_use]
    pub fn with_finalizer<T, Fin>(mut self, finalizer: Fin) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        Fin: Finalizer<T>,
    {
        if ServiceId::of::<T>() != self.service {
            error!(
                service = self.service.name,
                finalizer = ServiceId::of::<T>().name,
                "Finalizer type doesn't match the service, it will be skipped"
            );
        }
        self.finalizer = Some(boxed_finalizer(finalizer));
        self
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// Concrete type, absent for instance and factory registrations
    #[inline]
    #[must_use]
    pub fn implementation_type(&self) -> Option<ServiceId> {
        self.implementation
    }

    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Empty for instance and factory registrations, which are never introspected
    #[must_use]
    pub fn constructor_dependencies(&self) -> &[ServiceId] {
        match &self.source {
            Source::Construct(plan) => &plan.constructor_dependencies,
            Source::Instance(_) | Source::Factory(_) => &[],
        }
    }

    /// Empty for instance and factory registrations, which are never introspected
    #[must_use]
    pub fn property_dependencies(&self) -> &[(&'static str, ServiceId)] {
        match &self.source {
            Source::Construct(plan) => &plan.property_dependencies,
            Source::Instance(_) | Source::Factory(_) => &[],
        }
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            Source::Instance(_) => "instance",
            Source::Factory(_) => "factory",
            Source::Construct(_) => "construct",
        };
        f.debug_struct("Registration")
            .field("service", &self.service.name)
            .field("implementation", &self.implementation.map(|implementation| implementation.name))
            .field("source", &source)
            .field("lifecycle", &self.lifecycle)
            .field("finalizer", &self.finalizer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Lifecycle, Registration, Source};
    use crate::{any::ServiceId, errors::RegisterErrorKind, Constructor, Injectable, PropertySlot};

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    trait Dummy: Send + Sync {}

    struct DummyNoDeps;

    impl Dummy for DummyNoDeps {}

    impl Injectable for DummyNoDeps {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|| DummyNoDeps)]
        }
    }

    static INTROSPECTIONS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Injectable for Counted {
        fn constructors() -> Vec<Constructor<Self>> {
            INTROSPECTIONS.fetch_add(1, Ordering::SeqCst);
            vec![Constructor::new(|| Counted)]
        }
    }

    implements!(DummyNoDeps: dyn Dummy);

    struct Dal;

    struct Bll {
        _dal: Arc<Dal>,
        _dummy: Option<Arc<dyn Dummy>>,
    }

    impl Injectable for Bll {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|dal: Arc<Dal>| Bll { _dal: dal, _dummy: None })]
        }

        fn properties() -> Vec<PropertySlot<Self>> {
            vec![PropertySlot::new("dummy", |this: &mut Self, dummy: Arc<dyn Dummy>| {
                this._dummy = Some(dummy);
            })]
        }
    }

    struct Overloaded;

    impl Injectable for Overloaded {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|| Overloaded), Constructor::new(|_dal: Arc<Dal>| Overloaded)]
        }
    }

    #[test]
    #[traced_test]
    fn test_instance_and_factory_skip_introspection() {
        let before = INTROSPECTIONS.load(Ordering::SeqCst);

        let instance = Registration::instance(Arc::new(DummyNoDeps) as Arc<dyn Dummy>).singleton();
        let factory = Registration::factory(|| Ok(Arc::new(Counted)));

        assert_eq!(INTROSPECTIONS.load(Ordering::SeqCst), before);
        Registration::of::<Counted>().unwrap();
        assert_eq!(INTROSPECTIONS.load(Ordering::SeqCst), before + 1);

        assert_eq!(instance.service(), ServiceId::of::<dyn Dummy>());
        assert_eq!(instance.implementation_type(), None);
        assert_eq!(instance.lifecycle(), Lifecycle::Singleton);
        assert!(instance.constructor_dependencies().is_empty());
        assert!(instance.property_dependencies().is_empty());
        assert!(matches!(instance.source, Source::Instance(_)));

        assert_eq!(factory.service(), ServiceId::of::<Counted>());
        assert_eq!(factory.lifecycle(), Lifecycle::Transient);
        assert!(matches!(factory.source, Source::Factory(_)));
    }

    #[test]
    #[traced_test]
    fn test_implementation_introspected() {
        let registration = Registration::implementation::<Bll, Bll>().unwrap();

        assert_eq!(registration.service(), ServiceId::of::<Bll>());
        assert_eq!(registration.implementation_type(), Some(ServiceId::of::<Bll>()));
        assert_eq!(registration.constructor_dependencies(), [ServiceId::of::<Dal>()]);
        assert_eq!(registration.property_dependencies(), [("dummy", ServiceId::of::<dyn Dummy>())]);

        let contract = Registration::implementation::<dyn Dummy, DummyNoDeps>().unwrap();
        assert_eq!(contract.service(), ServiceId::of::<dyn Dummy>());
        assert_eq!(contract.implementation_type(), Some(ServiceId::of::<DummyNoDeps>()));
    }

    #[test]
    #[traced_test]
    fn test_constructor_arity_checked_on_registration() {
        assert!(matches!(
            Registration::of::<Overloaded>(),
            Err(RegisterErrorKind::MultipleOrNoPublicConstructors { count: 2, .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_finalizer_type_mismatch_logged() {
        let registration = Registration::instance(Arc::new(Dal)).with_finalizer(|_: Arc<DummyNoDeps>| {});

        assert!(registration.finalizer.is_some());
        assert!(logs_contain("Finalizer type doesn't match the service"));
    }
}
