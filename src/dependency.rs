use std::{sync::Arc, vec};

use crate::{any::ServiceId, errors::InstantiateErrorKind, Instance};

/// A single injectable value, requested from the container by its service id
pub trait Dependency: Sized {
    #[must_use]
    fn service_id() -> ServiceId;

    #[must_use]
    fn from_instance(instance: &Instance) -> Option<Self>;
}

impl<T> Dependency for Arc<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    #[inline]
    fn service_id() -> ServiceId {
        ServiceId::of::<T>()
    }

    #[inline]
    fn from_instance(instance: &Instance) -> Option<Self> {
        instance.downcast::<T>()
    }
}

/// Ordered list of dependencies, implemented for tuples of [`Dependency`]
pub trait Dependencies: Sized {
    #[must_use]
    fn service_ids() -> Vec<ServiceId>;

    /// # Errors
    /// Fails if the arguments don't match the declared dependencies in number or type
    fn extract(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind>;
}

macro_rules! impl_dependencies {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> Dependencies for ($($ty,)*)
        where
            $( $ty: Dependency, )*
        {
            #[inline]
            fn service_ids() -> Vec<ServiceId> {
                Vec::from([$($ty::service_id(),)*])
            }

            #[inline]
            #[allow(unused_variables)]
            fn extract(arguments: &mut Arguments) -> Result<Self, InstantiateErrorKind> {
                Ok(($(arguments.next::<$ty>()?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependencies);

/// Constructor arguments in declared order, as handed to the object builder
pub struct Arguments {
    type_info: ServiceId,
    expected: usize,
    values: vec::IntoIter<Instance>,
    position: usize,
}

impl Arguments {
    #[inline]
    #[must_use]
    pub(crate) fn new(type_info: ServiceId, expected: usize, values: Vec<Instance>) -> Self {
        Self {
            type_info,
            expected,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Takes the next argument.
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::ArgumentCount`] if the arguments are exhausted
    /// - Returns [`InstantiateErrorKind::IncorrectArgument`] if the argument isn't of the requested type
    pub fn next<D: Dependency>(&mut self) -> Result<D, InstantiateErrorKind> {
        let Some(instance) = self.values.next() else {
            return Err(InstantiateErrorKind::ArgumentCount {
                type_info: self.type_info,
                expected: self.expected,
                actual: self.position,
            });
        };
        let position = self.position;
        self.position += 1;

        D::from_instance(&instance).ok_or(InstantiateErrorKind::IncorrectArgument {
            type_info: self.type_info,
            position,
            expected: D::service_id(),
            actual: instance.service(),
        })
    }

    /// Checks that every argument was consumed
    pub(crate) fn finish(self) -> Result<(), InstantiateErrorKind> {
        let left = self.values.len();
        if left == 0 {
            Ok(())
        } else {
            Err(InstantiateErrorKind::ArgumentCount {
                type_info: self.type_info,
                expected: self.expected,
                actual: self.position + left,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Arguments, Dependencies, Dependency};
    use crate::{any::ServiceId, errors::InstantiateErrorKind, Instance};

    use std::sync::Arc;

    struct Dal;
    struct Logger;

    #[test]
    #[allow(dead_code)]
    fn test_dependencies_impls() {
        fn dependencies<T: Dependencies>() {}
        fn dependencies_with_dep<Dep: Send + Sync + 'static>() {
            dependencies::<()>();
            dependencies::<(Arc<Dep>,)>();
            dependencies::<(Arc<Dep>, Arc<Dep>, Arc<Dep>)>();
        }
    }

    #[test]
    fn test_service_ids_order() {
        assert_eq!(
            <(Arc<Dal>, Arc<Logger>)>::service_ids(),
            [ServiceId::of::<Dal>(), ServiceId::of::<Logger>()]
        );
        assert!(<()>::service_ids().is_empty());
        assert_eq!(<Arc<Logger>>::service_id(), ServiceId::of::<Logger>());
    }

    #[test]
    fn test_extract() {
        let dal = Arc::new(Dal);
        let mut arguments = Arguments::new(
            ServiceId::of::<()>(),
            2,
            vec![Instance::new(dal.clone()), Instance::new(Arc::new(Logger))],
        );

        let (extracted_dal, _logger) = <(Arc<Dal>, Arc<Logger>)>::extract(&mut arguments).unwrap();

        assert!(Arc::ptr_eq(&dal, &extracted_dal));
        arguments.finish().unwrap();
    }

    #[test]
    fn test_extract_incorrect_argument() {
        let mut arguments = Arguments::new(
            ServiceId::of::<()>(),
            2,
            vec![Instance::new(Arc::new(Logger)), Instance::new(Arc::new(Dal))],
        );

        assert!(matches!(
            <(Arc<Dal>, Arc<Logger>)>::extract(&mut arguments),
            Err(InstantiateErrorKind::IncorrectArgument { position: 0, .. })
        ));
    }

    #[test]
    fn test_argument_count() {
        let mut arguments = Arguments::new(ServiceId::of::<()>(), 2, vec![Instance::new(Arc::new(Dal))]);
        assert!(matches!(
            <(Arc<Dal>, Arc<Logger>)>::extract(&mut arguments),
            Err(InstantiateErrorKind::ArgumentCount {
                expected: 2,
                actual: 1,
                ..
            })
        ));

        let arguments = Arguments::new(ServiceId::of::<()>(), 0, vec![Instance::new(Arc::new(Dal))]);
        assert!(matches!(
            arguments.finish(),
            Err(InstantiateErrorKind::ArgumentCount {
                expected: 0,
                actual: 1,
                ..
            })
        ));
    }
}
