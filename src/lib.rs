#[macro_use]
pub(crate) mod macros;

pub(crate) mod activator;
pub(crate) mod any;
pub(crate) mod builder;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod dependency;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod injectable;
pub(crate) mod introspect;
pub(crate) mod loader;
pub(crate) mod registration;
pub(crate) mod registry;
pub(crate) mod resolver;

pub use any::{Instance, ServiceId};
pub use builder::{build, ObjectBuilder};
pub use config::Config;
pub use container::Container;
pub use dependency::{Arguments, Dependencies, Dependency};
pub use errors::{
    DependencyPath, DisposeErrorKind, InstantiateErrorKind, RegisterErrorKind, ResolveErrorKind, ScopeErrorKind,
};
pub use finalizer::Finalizer;
pub use injectable::{Constructor, ConstructorFn, Injectable, PropertySlot, Upcast};
pub use loader::{BulkLoader, Export, ExportFn, ExportScanner};
pub use registration::{Lifecycle, OverridePolicy, Registration};

#[cfg(feature = "auto")]
pub use loader::{distributed_slice, linkme, EXPORTS};
