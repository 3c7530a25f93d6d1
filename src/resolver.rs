use std::{cell::RefCell, collections::HashSet, sync::Arc};
use tracing::debug;

use crate::{
    any::ServiceId,
    container::ContainerInner,
    errors::{DependencyPath, ResolveErrorKind},
    registration::{Lifecycle, Plan, Source},
    registry::Entry,
    Instance,
};

thread_local! {
    static IN_PROGRESS: RefCell<ResolutionPath> = RefCell::new(ResolutionPath::default());
}

/// Entries being resolved in the current call stack.
///
/// Entries are compared by identity, so the same service id registered in a parent and a child
/// doesn't close a cycle.
#[derive(Default)]
pub(crate) struct ResolutionPath {
    entries: Vec<(*const Entry, ServiceId)>,
}

impl ResolutionPath {
    /// # Errors
    /// Returns [`ResolveErrorKind::CircularDependency`] if the entry is already being resolved
    pub(crate) fn enter(&mut self, entry: &Entry) -> Result<(), ResolveErrorKind> {
        let key = entry as *const Entry;
        if let Some(start) = self.entries.iter().position(|(in_progress, _)| *in_progress == key) {
            let mut path = self.entries[start..].iter().map(|(_, service)| *service).collect::<Vec<_>>();
            path.push(entry.service);
            return Err(ResolveErrorKind::CircularDependency {
                path: DependencyPath(path.into_boxed_slice()),
            });
        }
        self.entries.push((key, entry.service));
        Ok(())
    }

    #[inline]
    pub(crate) fn leave(&mut self) {
        self.entries.pop();
    }
}

/// Marks an entry as being resolved on the current thread until dropped.
///
/// The mark outlives nested public `resolve` calls, so cycles closed by a factory
/// that resolves from the container are reported instead of re-entering an activation lock.
pub(crate) struct InProgress(());

impl InProgress {
    /// # Errors
    /// Returns [`ResolveErrorKind::CircularDependency`] if the entry is already being resolved on this thread
    pub(crate) fn enter(entry: &Entry) -> Result<Self, ResolveErrorKind> {
        IN_PROGRESS.with_borrow_mut(|path| path.enter(entry))?;
        Ok(Self(()))
    }
}

impl Drop for InProgress {
    fn drop(&mut self) {
        IN_PROGRESS.with_borrow_mut(ResolutionPath::leave);
    }
}

/// Attributes a missing dependency to the implementation that requires it
pub(crate) fn attribute_missing(required_by: ServiceId, dependency: ServiceId, err: ResolveErrorKind) -> ResolveErrorKind {
    match err {
        ResolveErrorKind::UnregisteredType(missing) if missing == dependency => {
            ResolveErrorKind::UnregisteredDependency { required_by, missing }
        }
        err => err,
    }
}

impl ContainerInner {
    /// Resolves by walking the dependency graph on every call
    pub(crate) fn resolve_direct(&self, service: ServiceId) -> Result<Instance, ResolveErrorKind> {
        let Some(entry) = self.lookup(&service)? else {
            return match self.parent() {
                Some(parent) => {
                    debug!(service = service.name, "Not registered locally, delegating to parent");
                    parent.resolve_direct(service)
                }
                None => Err(ResolveErrorKind::UnregisteredType(service)),
            };
        };

        if let Some(instance) = entry.concrete_instance() {
            debug!(service = service.name, "Found concrete instance");
            return Ok(instance.clone());
        }

        let plan = match &entry.source {
            Source::Instance(instance) => return Ok(instance.clone()),
            Source::Factory(factory) => {
                let _in_progress = InProgress::enter(&entry)?;
                debug!(service = service.name, "Calling factory");
                return factory().map_err(Into::into);
            }
            Source::Construct(plan) => plan,
        };

        let _in_progress = InProgress::enter(&entry)?;
        match entry.lifecycle {
            Lifecycle::Transient => self.construct_direct(plan),
            Lifecycle::Singleton => {
                if entry.concrete_instance().is_none() {
                    self.ensure_acyclic(&entry)?;
                }
                entry.activate(|| self.construct_direct(plan))
            }
        }
    }

    /// Resolves constructor dependencies in declared order, then property dependencies
    fn construct_direct(&self, plan: &Plan) -> Result<Instance, ResolveErrorKind> {
        let mut arguments = Vec::with_capacity(plan.constructor_dependencies.len());
        for dependency in &plan.constructor_dependencies {
            arguments.push(self.resolve_dependency(plan, *dependency)?);
        }

        let mut properties = Vec::with_capacity(plan.property_dependencies.len());
        for (slot, dependency) in &plan.property_dependencies {
            properties.push((*slot, self.resolve_dependency(plan, *dependency)?));
        }

        (plan.build)(arguments, properties).map_err(Into::into)
    }

    fn resolve_dependency(&self, plan: &Plan, dependency: ServiceId) -> Result<Instance, ResolveErrorKind> {
        self.resolve_direct(dependency)
            .map_err(|err| attribute_missing(plan.implementation, dependency, err))
    }

    /// Checks the static dependency graph of a cold singleton before its activation lock is taken.
    ///
    /// Two threads activating singletons of one cycle from both ends would otherwise wait for each other's lock.
    fn ensure_acyclic(&self, entry: &Entry) -> Result<(), ResolveErrorKind> {
        let mut path = ResolutionPath::default();
        let mut visited = HashSet::new();
        self.visit_entry(entry, &mut path, &mut visited)
    }

    fn visit_entry(&self, entry: &Entry, path: &mut ResolutionPath, visited: &mut HashSet<*const Entry>) -> Result<(), ResolveErrorKind> {
        let Some(plan) = entry.plan() else {
            return Ok(());
        };
        if entry.concrete_instance().is_some() || visited.contains(&(entry as *const Entry)) {
            return Ok(());
        }

        path.enter(entry)?;
        for dependency in plan.dependencies() {
            self.visit_service(dependency, path, visited)?;
        }
        path.leave();

        visited.insert(entry as *const Entry);
        Ok(())
    }

    /// Missing services are skipped here, resolution reports them with the dependent type
    fn visit_service(&self, service: ServiceId, path: &mut ResolutionPath, visited: &mut HashSet<*const Entry>) -> Result<(), ResolveErrorKind> {
        let entry = self.registry.read().get(&service);
        match (entry, self.parent()) {
            (Some(entry), _) => self.visit_entry(&entry, path, visited),
            (None, Some(parent)) => parent.visit_service(service, path, visited),
            (None, None) => Ok(()),
        }
    }

    /// Looks up a local entry, holding the reader lock only for the lookup
    pub(crate) fn lookup(&self, service: &ServiceId) -> Result<Option<Arc<Entry>>, ResolveErrorKind> {
        let registry = self.registry.read();
        if self.is_disposed() {
            return Err(ResolveErrorKind::AlreadyDisposed);
        }
        Ok(registry.get(service))
    }
}

#[cfg(test)]
mod tests {
    use super::{InProgress, ResolutionPath};
    use crate::{errors::ResolveErrorKind, registration::Registration, registry::Entry, ServiceId};

    use std::sync::Arc;

    struct A;
    struct B;
    struct C;

    fn entry<T: Send + Sync + 'static>(value: T) -> Entry {
        Entry::new(Registration::instance(Arc::new(value)))
    }

    #[test]
    fn test_resolution_path_cycle() {
        let (a, b, c) = (entry(A), entry(B), entry(C));
        let mut path = ResolutionPath::default();
        path.enter(&a).unwrap();
        path.enter(&b).unwrap();
        path.enter(&c).unwrap();

        let Err(ResolveErrorKind::CircularDependency { path: cycle }) = path.enter(&b) else {
            panic!("cycle not detected");
        };
        assert_eq!(
            cycle.services(),
            [ServiceId::of::<B>(), ServiceId::of::<C>(), ServiceId::of::<B>()]
        );
        assert_eq!(cycle.to_string(), "B -> C -> B");
    }

    #[test]
    fn test_resolution_path_leave() {
        let (a, b) = (entry(A), entry(B));
        let mut path = ResolutionPath::default();
        path.enter(&a).unwrap();
        path.enter(&b).unwrap();
        path.leave();

        path.enter(&b).unwrap();
    }

    #[test]
    fn test_resolution_path_compares_entries() {
        let (parent, child) = (entry(A), entry(A));
        let mut path = ResolutionPath::default();
        path.enter(&child).unwrap();

        path.enter(&parent).unwrap();
    }

    #[test]
    fn test_in_progress_released_on_drop() {
        let a = entry(A);
        {
            let _in_progress = InProgress::enter(&a).unwrap();
            assert!(matches!(
                InProgress::enter(&a),
                Err(ResolveErrorKind::CircularDependency { .. })
            ));
        }

        assert!(InProgress::enter(&a).is_ok());
    }
}
