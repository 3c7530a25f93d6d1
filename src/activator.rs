use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};
use tracing::debug;

use crate::{
    any::ServiceId,
    container::ContainerInner,
    errors::ResolveErrorKind,
    registration::{Lifecycle, Plan, Source},
    registry::Entry,
    resolver::{attribute_missing, InProgress, ResolutionPath},
    Instance,
};

/// Zero-argument procedure producing an instance, with dependency procedures already wired in
pub(crate) type Activator = Arc<dyn Fn() -> Result<Instance, ResolveErrorKind> + Send + Sync>;

#[inline]
fn constant(instance: Instance) -> Activator {
    Arc::new(move || Ok(instance.clone()))
}

/// Memoized activators of one container.
///
/// Every registry write invalidates the cache. An activator compiled against an older
/// generation is returned to its caller but never cached.
#[derive(Default)]
pub(crate) struct ActivationCache {
    generation: AtomicU64,
    activators: RwLock<BTreeMap<ServiceId, Activator>>,
}

impl ActivationCache {
    #[inline]
    #[must_use]
    pub(crate) fn get(&self, service: &ServiceId) -> Option<Activator> {
        self.activators.read().get(service).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn invalidate(&self) {
        let mut activators = self.activators.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        activators.clear();
        debug!("Activation cache invalidated");
    }

    /// Caches the activator unless one was cached concurrently, returns the cached one
    fn insert_if_current(&self, generation: u64, service: ServiceId, activator: Activator) -> Activator {
        let mut activators = self.activators.write();
        if self.generation.load(Ordering::Acquire) != generation {
            return activator;
        }
        activators.entry(service).or_insert(activator).clone()
    }

    fn replace_if_current(&self, generation: u64, service: ServiceId, activator: Activator) {
        let mut activators = self.activators.write();
        if self.generation.load(Ordering::Acquire) == generation {
            activators.insert(service, activator);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.activators.read().len()
    }
}

impl ContainerInner {
    /// Resolves through memoized activators
    pub(crate) fn resolve_compiled(self: &Arc<Self>, service: ServiceId) -> Result<Instance, ResolveErrorKind> {
        let activator = self.get_or_compile(service)?;
        activator()
    }

    /// Returns the cached activator of the service or compiles it.
    ///
    /// Services registered only in a parent container get the parent's activator, which is not cached here.
    pub(crate) fn get_or_compile(self: &Arc<Self>, service: ServiceId) -> Result<Activator, ResolveErrorKind> {
        let generation = self.activators.generation();
        let Some(entry) = self.lookup(&service)? else {
            return match self.parent() {
                Some(parent) => {
                    debug!(service = service.name, "Not registered locally, delegating to parent");
                    parent.get_or_compile(service)
                }
                None => Err(ResolveErrorKind::UnregisteredType(service)),
            };
        };

        if let Some(activator) = self.activators.get(&service) {
            debug!(service = service.name, "Activator found in cache");
            return Ok(activator);
        }
        debug!(service = service.name, "Activator not found in cache");

        self.compile_entry(&entry, generation, &mut ResolutionPath::default())
    }

    fn compile_entry(self: &Arc<Self>, entry: &Arc<Entry>, generation: u64, path: &mut ResolutionPath) -> Result<Activator, ResolveErrorKind> {
        if let Some(activator) = self.activators.get(&entry.service) {
            return Ok(activator);
        }

        let activator = match (&entry.source, entry.concrete_instance()) {
            (_, Some(instance)) => constant(instance.clone()),
            (Source::Instance(instance), None) => constant(instance.clone()),
            (Source::Factory(factory), None) => {
                let factory = factory.clone();
                let entry = entry.clone();
                Arc::new(move || {
                    let _in_progress = InProgress::enter(&entry)?;
                    factory().map_err(Into::into)
                }) as Activator
            }
            (Source::Construct(plan), None) => {
                path.enter(entry)?;
                let build = self.compile_plan(plan, generation, path)?;
                path.leave();

                match entry.lifecycle {
                    Lifecycle::Transient => transient_activator(entry.clone(), build),
                    Lifecycle::Singleton => self.singleton_activator(entry.clone(), build, generation),
                }
            }
        };

        debug!(service = entry.service.name, "Activator compiled");
        Ok(self.activators.insert_if_current(generation, entry.service, activator))
    }

    fn compile_plan(self: &Arc<Self>, plan: &Plan, generation: u64, path: &mut ResolutionPath) -> Result<Activator, ResolveErrorKind> {
        let mut arguments = Vec::with_capacity(plan.constructor_dependencies.len());
        for dependency in &plan.constructor_dependencies {
            arguments.push(self.compile_dependency(plan, *dependency, generation, path)?);
        }

        let mut properties = Vec::with_capacity(plan.property_dependencies.len());
        for (slot, dependency) in &plan.property_dependencies {
            properties.push((*slot, self.compile_dependency(plan, *dependency, generation, path)?));
        }

        let build = (plan.prepare)()?;

        Ok(Arc::new(move || {
            let mut argument_values = Vec::with_capacity(arguments.len());
            for argument in &arguments {
                argument_values.push(argument()?);
            }

            let mut property_values = Vec::with_capacity(properties.len());
            for (slot, property) in &properties {
                property_values.push((*slot, property()?));
            }

            build(argument_values, property_values).map_err(Into::into)
        }))
    }

    fn compile_dependency(
        self: &Arc<Self>,
        plan: &Plan,
        dependency: ServiceId,
        generation: u64,
        path: &mut ResolutionPath,
    ) -> Result<Activator, ResolveErrorKind> {
        let entry = self.lookup(&dependency)?;
        let result = match (entry, self.parent()) {
            (Some(entry), _) => self.compile_entry(&entry, generation, path),
            (None, Some(parent)) => parent
                .get_or_compile(dependency)
                .map(|_| delegate(Arc::downgrade(&parent), plan.implementation, dependency)),
            (None, None) => Err(ResolveErrorKind::UnregisteredType(dependency)),
        };
        result.map_err(|err| attribute_missing(plan.implementation, dependency, err))
    }

    /// Activates once, then replaces itself in the cache with a constant activator
    fn singleton_activator(self: &Arc<Self>, entry: Arc<Entry>, build: Activator, generation: u64) -> Activator {
        let owner = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(instance) = entry.concrete_instance() {
                return Ok(instance.clone());
            }

            let in_progress = InProgress::enter(&entry)?;
            let instance = entry.activate(|| build())?;
            drop(in_progress);
            if let Some(owner) = owner.upgrade() {
                owner
                    .activators
                    .replace_if_current(generation, entry.service, constant(instance.clone()));
            }
            Ok(instance)
        })
    }
}

fn transient_activator(entry: Arc<Entry>, build: Activator) -> Activator {
    Arc::new(move || {
        let _in_progress = InProgress::enter(&entry)?;
        build()
    })
}

/// Activator of a service owned by a parent container.
/// The parent resolves it with its own locks and cache at invocation time.
///
/// A dropped parent is reported as a missing dependency of `required_by`.
fn delegate(parent: Weak<ContainerInner>, required_by: ServiceId, service: ServiceId) -> Activator {
    Arc::new(move || {
        let result = match parent.upgrade() {
            Some(parent) => parent.resolve(service),
            None => Err(ResolveErrorKind::UnregisteredType(service)),
        };
        result.map_err(|err| attribute_missing(required_by, service, err))
    })
}
