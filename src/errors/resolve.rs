use core::fmt::{self, Display, Formatter};

use super::instantiate::InstantiateErrorKind;
use crate::any::ServiceId;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Service {0} was not registered")]
    UnregisteredType(ServiceId),
    #[error("{required_by} requires {missing}, which was not registered")]
    UnregisteredDependency { required_by: ServiceId, missing: ServiceId },
    #[error("Circular dependency detected: {path}")]
    CircularDependency { path: DependencyPath },
    #[error("Incorrect instance type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: ServiceId, actual: ServiceId },
    #[error("Container already disposed")]
    AlreadyDisposed,
    #[error(transparent)]
    Instantiate(#[from] InstantiateErrorKind),
}

/// Chain of services that were being resolved when a cycle closed.
/// The last element is the service that was requested again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPath(pub Box<[ServiceId]>);

impl DependencyPath {
    #[inline]
    #[must_use]
    pub fn services(&self) -> &[ServiceId] {
        &self.0
    }
}

impl Display for DependencyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut services = self.0.iter();
        if let Some(service) = services.next() {
            write!(f, "{}", service.short_name())?;
        }
        for service in services {
            write!(f, " -> {}", service.short_name())?;
        }
        Ok(())
    }
}
