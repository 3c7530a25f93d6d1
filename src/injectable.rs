use std::sync::Arc;

use crate::{
    any::ServiceId,
    dependency::{Arguments, Dependencies, Dependency},
    errors::InstantiateErrorKind,
    Instance,
};

/// Describes how the container builds a concrete type.
///
/// A type must declare exactly one constructor to be registered for introspected construction.
/// Property slots are optional and are set after the constructor returns.
///
/// # Examples
/// ```rust
/// use rivet::{Constructor, Injectable, PropertySlot};
/// use std::sync::Arc;
///
/// struct Dal;
/// struct Audit;
///
/// struct Service {
///     dal: Arc<Dal>,
///     audit: Option<Arc<Audit>>,
/// }
///
/// impl Injectable for Service {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|dal: Arc<Dal>| Service { dal, audit: None })]
///     }
///
///     fn properties() -> Vec<PropertySlot<Self>> {
///         vec![PropertySlot::new("audit", |this: &mut Self, audit: Arc<Audit>| this.audit = Some(audit))]
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    #[must_use]
    fn constructors() -> Vec<Constructor<Self>>;

    #[must_use]
    fn properties() -> Vec<PropertySlot<Self>> {
        Vec::new()
    }
}

pub trait ConstructorFn<Deps>: Send + Sync + 'static
where
    Deps: Dependencies,
{
    type Output;

    fn construct(&self, dependencies: Deps) -> Self::Output;
}

macro_rules! impl_constructor_fn {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Output, $($ty,)*> ConstructorFn<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Output + Send + Sync + 'static,
            $( $ty: Dependency, )*
        {
            type Output = Output;

            #[inline]
            fn construct(&self, ($($ty,)*): ($($ty,)*)) -> Self::Output {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_constructor_fn);

type ConstructFn<T> = Arc<dyn Fn(&mut Arguments) -> Result<T, InstantiateErrorKind> + Send + Sync>;

/// Constructor of `T` with its ordered parameter contracts.
/// The contracts are taken from the argument types of the wrapped closure.
pub struct Constructor<T> {
    parameters: Vec<ServiceId>,
    call: ConstructFn<T>,
}

impl<T> Clone for Constructor<T> {
    fn clone(&self) -> Self {
        Self {
            parameters: self.parameters.clone(),
            call: self.call.clone(),
        }
    }
}

impl<T> Constructor<T> {
    #[must_use]
    pub fn new<Deps, F>(constructor: F) -> Self
    where
        Deps: Dependencies,
        F: ConstructorFn<Deps, Output = T>,
    {
        Self {
            parameters: Deps::service_ids(),
            call: Arc::new(move |arguments: &mut Arguments| Deps::extract(arguments).map(|deps| constructor.construct(deps))),
        }
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[ServiceId] {
        &self.parameters
    }

    #[inline]
    pub(crate) fn call(&self, arguments: &mut Arguments) -> Result<T, InstantiateErrorKind> {
        (self.call)(arguments)
    }
}

type SetFn<T> = Arc<dyn Fn(&mut T, &Instance) -> Result<(), InstantiateErrorKind> + Send + Sync>;

/// Settable dependency of `T`, injected after construction
pub struct PropertySlot<T> {
    name: &'static str,
    service: ServiceId,
    set: SetFn<T>,
}

impl<T> Clone for PropertySlot<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            service: self.service,
            set: self.set.clone(),
        }
    }
}

impl<T: 'static> PropertySlot<T> {
    #[must_use]
    pub fn new<Dep, F>(name: &'static str, setter: F) -> Self
    where
        Dep: Dependency,
        F: Fn(&mut T, Dep) + Send + Sync + 'static,
    {
        Self {
            name,
            service: Dep::service_id(),
            set: Arc::new(move |target: &mut T, instance: &Instance| {
                let Some(value) = Dep::from_instance(instance) else {
                    return Err(InstantiateErrorKind::IncorrectArgument {
                        type_info: ServiceId::of::<T>(),
                        position: 0,
                        expected: Dep::service_id(),
                        actual: instance.service(),
                    });
                };
                setter(target, value);
                Ok(())
            }),
        }
    }
}

impl<T> PropertySlot<T> {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> ServiceId {
        self.service
    }

    #[inline]
    pub(crate) fn set(&self, target: &mut T, instance: &Instance) -> Result<(), InstantiateErrorKind> {
        (self.set)(target, instance)
    }
}

/// Conversion of a concrete service pointer into the pointer of a contract it fulfils.
///
/// Every type upcasts to itself. Trait-object contracts are declared with [`crate::implements!`].
pub trait Upcast<Contract: ?Sized>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<Contract>;
}

impl<T: Send + Sync + 'static> Upcast<T> for T {
    #[inline]
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}
