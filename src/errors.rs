mod container;
mod instantiate;
mod register;
mod resolve;

pub use container::{DisposeErrorKind, ScopeErrorKind};
pub use instantiate::InstantiateErrorKind;
pub use register::RegisterErrorKind;
pub use resolve::{DependencyPath, ResolveErrorKind};
