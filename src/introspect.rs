use tracing::debug;

use crate::{
    any::ServiceId,
    injectable::{Constructor, Injectable},
};

/// Returns the single constructor of `T`, or the number of constructors it declares
pub(crate) fn single_constructor<T: Injectable>() -> Result<Constructor<T>, usize> {
    let mut constructors = T::constructors();
    if constructors.len() == 1 {
        Ok(constructors.remove(0))
    } else {
        Err(constructors.len())
    }
}

/// Ordered constructor parameter contracts of `T`
pub(crate) fn constructor_shape<T: Injectable>() -> Result<Vec<ServiceId>, usize> {
    let constructor = single_constructor::<T>()?;
    debug!(
        type_info = ServiceId::of::<T>().name,
        parameters = constructor.parameters().len(),
        "Constructor shape collected"
    );
    Ok(constructor.parameters().to_vec())
}

/// Injectable property slots of `T` as `(slot, service)` pairs
pub(crate) fn property_slots<T: Injectable>() -> Vec<(&'static str, ServiceId)> {
    T::properties().iter().map(|slot| (slot.name(), slot.service())).collect()
}

pub(crate) fn has_property_slots<T: Injectable>() -> bool {
    !T::properties().is_empty()
}
