use core::fmt::{self, Debug, Formatter};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    any::ServiceId,
    errors::RegisterErrorKind,
    injectable::{Injectable, Upcast},
    introspect::has_property_slots,
    registration::{Lifecycle, Registration},
};

#[cfg(feature = "auto")]
pub use linkme::{self, distributed_slice};

/// Export marker of one type, produced by an [`ExportFn`] of an export unit
pub type ExportFn = fn() -> Export;

/// Process-wide export unit, loaded by [`crate::Container::load_exports`].
/// Any crate linked into the binary can add exports to it with `#[distributed_slice(EXPORTS)]`.
#[cfg(feature = "auto")]
#[distributed_slice]
pub static EXPORTS: [ExportFn];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Service,
    Constructor,
    Properties,
}

/// Declarative export of a type for the bulk loader
#[derive(Clone, Copy)]
pub struct Export {
    service: ServiceId,
    marker: Marker,
    lifecycle: Lifecycle,
    register: fn() -> Result<Registration, RegisterErrorKind>,
    eligible: fn() -> bool,
}

fn always() -> bool {
    true
}

impl Export {
    /// Exports `T` under its own service id
    #[inline]
    #[must_use]
    pub fn service<T: Injectable>() -> Self {
        Self {
            service: ServiceId::of::<T>(),
            marker: Marker::Service,
            lifecycle: Lifecycle::Transient,
            register: Registration::of::<T>,
            eligible: always,
        }
    }

    /// Exports `Impl` under an explicit `Contract` service id
    #[inline]
    #[must_use]
    pub fn service_as<Contract, Impl>() -> Self
    where
        Contract: ?Sized + Send + Sync + 'static,
        Impl: Injectable + Upcast<Contract>,
    {
        Self {
            service: ServiceId::of::<Contract>(),
            marker: Marker::Service,
            lifecycle: Lifecycle::Transient,
            register: Registration::implementation::<Contract, Impl>,
            eligible: always,
        }
    }

    /// Marks `T` as built by constructor injection
    #[inline]
    #[must_use]
    pub fn constructor<T: Injectable>() -> Self {
        Self {
            marker: Marker::Constructor,
            ..Self::service::<T>()
        }
    }

    /// Marks `T` as receiving property injection.
    /// The export is skipped if `T` declares no property slots.
    #[inline]
    #[must_use]
    pub fn properties<T: Injectable>() -> Self {
        Self {
            marker: Marker::Properties,
            eligible: has_property_slots::<T>,
            ..Self::service::<T>()
        }
    }

    #[inline]
    #[must_use]
    pub fn singleton(self) -> Self {
        Self {
            lifecycle: Lifecycle::Singleton,
            ..self
        }
    }

    #[inline]
    #[must_use]
    pub fn service_id(&self) -> ServiceId {
        self.service
    }

    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}

impl Debug for Export {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Export")
            .field("service", &self.service.name)
            .field("marker", &self.marker)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Turns an export unit into registrations
pub trait BulkLoader: Send + Sync {
    /// # Errors
    /// Fails if an exported type can't be registered
    fn scan(&self, unit: &[ExportFn]) -> Result<BTreeMap<ServiceId, Registration>, RegisterErrorKind>;
}

/// Default [`BulkLoader`].
/// Two exports of one service id in a unit are rejected with [`RegisterErrorKind::DuplicateRegistration`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportScanner;

impl BulkLoader for ExportScanner {
    fn scan(&self, unit: &[ExportFn]) -> Result<BTreeMap<ServiceId, Registration>, RegisterErrorKind> {
        let mut registrations = BTreeMap::new();

        for export in unit.iter().map(|export| export()) {
            if !(export.eligible)() {
                debug!(service = export.service.name, marker = ?export.marker, "Export skipped, no property slots");
                continue;
            }
            if registrations.contains_key(&export.service) {
                return Err(RegisterErrorKind::DuplicateRegistration(export.service));
            }

            let registration = (export.register)()?.with_lifecycle(export.lifecycle);
            debug!(service = export.service.name, marker = ?export.marker, "Export scanned");
            registrations.insert(export.service, registration);
        }

        Ok(registrations)
    }
}
