use tracing::debug;

use crate::{
    any::ServiceId,
    dependency::Arguments,
    errors::InstantiateErrorKind,
    injectable::{Constructor, Injectable, PropertySlot},
    introspect::single_constructor,
    Instance,
};

/// Raw construction primitive for `T`.
///
/// Creating the builder validates that `T` still declares exactly one constructor,
/// so a prepared builder can be reused without introspecting `T` again.
pub struct ObjectBuilder<T> {
    constructor: Constructor<T>,
    properties: Vec<PropertySlot<T>>,
}

impl<T: Injectable> ObjectBuilder<T> {
    /// # Errors
    /// Returns [`InstantiateErrorKind::MultipleOrNoPublicConstructors`] if `T` doesn't declare exactly one constructor
    pub fn new() -> Result<Self, InstantiateErrorKind> {
        let constructor = single_constructor::<T>().map_err(|count| InstantiateErrorKind::MultipleOrNoPublicConstructors {
            type_info: ServiceId::of::<T>(),
            count,
        })?;

        Ok(Self {
            constructor,
            properties: T::properties(),
        })
    }

    /// Calls the constructor with `arguments` in order, then applies `properties`.
    /// Property order isn't meaningful.
    ///
    /// # Errors
    /// Fails if the arguments don't match the constructor or a property slot is unknown
    pub fn build(&self, arguments: Vec<Instance>, properties: Vec<(&'static str, Instance)>) -> Result<T, InstantiateErrorKind> {
        let type_info = ServiceId::of::<T>();

        let mut arguments = Arguments::new(type_info, self.constructor.parameters().len(), arguments);
        let mut instance = self.constructor.call(&mut arguments)?;
        arguments.finish()?;

        for (slot, value) in properties {
            let Some(property) = self.properties.iter().find(|property| property.name() == slot) else {
                return Err(InstantiateErrorKind::UnknownProperty { type_info, slot });
            };
            property.set(&mut instance, &value)?;
        }

        debug!(type_info = type_info.name, "Built");
        Ok(instance)
    }
}

/// Validates `T` and builds it in one go
///
/// # Errors
/// See [`ObjectBuilder::new`] and [`ObjectBuilder::build`]
pub fn build<T: Injectable>(arguments: Vec<Instance>, properties: Vec<(&'static str, Instance)>) -> Result<T, InstantiateErrorKind> {
    ObjectBuilder::<T>::new()?.build(arguments, properties)
}

#[cfg(test)]
mod tests {
    use super::{build, ObjectBuilder};
    use crate::{errors::InstantiateErrorKind, Constructor, Injectable, Instance, PropertySlot};

    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Dal(u8);
    struct Audit;

    struct Bll {
        dal: Arc<Dal>,
        audit: Option<Arc<Audit>>,
    }

    impl Injectable for Bll {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|dal: Arc<Dal>| Bll { dal, audit: None })]
        }

        fn properties() -> Vec<PropertySlot<Self>> {
            vec![PropertySlot::new("audit", |this: &mut Self, audit: Arc<Audit>| {
                this.audit = Some(audit);
            })]
        }
    }

    struct Ambiguous;

    impl Injectable for Ambiguous {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|| Ambiguous), Constructor::new(|| Ambiguous)]
        }
    }

    #[test]
    #[traced_test]
    fn test_build_with_properties() {
        let bll = build::<Bll>(
            vec![Instance::new(Arc::new(Dal(7)))],
            vec![("audit", Instance::new(Arc::new(Audit)))],
        )
        .unwrap();

        assert_eq!(bll.dal.0, 7);
        assert!(bll.audit.is_some());
    }

    #[test]
    #[traced_test]
    fn test_prepared_builder_reuse() {
        let builder = ObjectBuilder::<Bll>::new().unwrap();
        let dal = Arc::new(Dal(1));

        let first = builder.build(vec![Instance::new(dal.clone())], vec![]).unwrap();
        let second = builder.build(vec![Instance::new(dal.clone())], vec![]).unwrap();

        assert!(Arc::ptr_eq(&first.dal, &second.dal));
        assert!(first.audit.is_none());
    }

    #[test]
    fn test_build_revalidates_constructors() {
        assert!(matches!(
            build::<Ambiguous>(vec![], vec![]),
            Err(InstantiateErrorKind::MultipleOrNoPublicConstructors { count: 2, .. })
        ));
    }

    #[test]
    fn test_build_argument_mismatch() {
        assert!(matches!(
            build::<Bll>(vec![], vec![]),
            Err(InstantiateErrorKind::ArgumentCount {
                expected: 1,
                actual: 0,
                ..
            })
        ));
        assert!(matches!(
            build::<Bll>(
                vec![Instance::new(Arc::new(Dal(1))), Instance::new(Arc::new(Dal(2)))],
                vec![]
            ),
            Err(InstantiateErrorKind::ArgumentCount {
                expected: 1,
                actual: 2,
                ..
            })
        ));
        assert!(matches!(
            build::<Bll>(
                vec![Instance::new(Arc::new(Dal(1)))],
                vec![("logger", Instance::new(Arc::new(Audit)))]
            ),
            Err(InstantiateErrorKind::UnknownProperty { slot: "logger", .. })
        ));
    }
}
