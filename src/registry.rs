use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
};
use tracing::debug;

use crate::{
    any::ServiceId,
    errors::RegisterErrorKind,
    finalizer::BoxedFinalizer,
    registration::{Lifecycle, OverridePolicy, Plan, Registration, Source},
    Instance,
};

static ACTIVATION_ORDER: AtomicU64 = AtomicU64::new(0);

#[inline]
fn next_activation_order() -> u64 {
    ACTIVATION_ORDER.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct Activated {
    pub(crate) instance: Instance,
    pub(crate) order: u64,
}

/// Registered recipe of one service id, owned by exactly one registry
pub(crate) struct Entry {
    pub(crate) service: ServiceId,
    pub(crate) source: Source,
    pub(crate) lifecycle: Lifecycle,
    finalizer: Option<BoxedFinalizer>,
    /// Written at most once: on creation for pre-built instances, on first activation for singletons
    activated: OnceLock<Activated>,
    activation: Mutex<()>,
}

impl Entry {
    pub(crate) fn new(registration: Registration) -> Self {
        let Registration {
            service,
            source,
            lifecycle,
            finalizer,
            ..
        } = registration;

        let activated = match &source {
            Source::Instance(instance) => OnceLock::from(Activated {
                instance: instance.clone(),
                order: next_activation_order(),
            }),
            Source::Factory(_) | Source::Construct(_) => OnceLock::new(),
        };

        Self {
            service,
            source,
            lifecycle,
            finalizer,
            activated,
            activation: Mutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn concrete_instance(&self) -> Option<&Instance> {
        self.activated.get().map(|activated| &activated.instance)
    }

    #[inline]
    #[must_use]
    pub(crate) fn plan(&self) -> Option<&Plan> {
        match &self.source {
            Source::Construct(plan) => Some(plan),
            Source::Instance(_) | Source::Factory(_) => None,
        }
    }

    /// Activates a singleton with double-checked locking.
    /// `build` is called at most once per entry, every caller gets the same instance.
    pub(crate) fn activate<E>(&self, build: impl FnOnce() -> Result<Instance, E>) -> Result<Instance, E> {
        if let Some(instance) = self.concrete_instance() {
            return Ok(instance.clone());
        }

        let _guard = self.activation.lock();
        if let Some(instance) = self.concrete_instance() {
            debug!(service = self.service.name, "Activated by another thread");
            return Ok(instance.clone());
        }

        let instance = build()?;
        let activated = self.activated.get_or_init(|| Activated {
            instance,
            order: next_activation_order(),
        });
        debug!(service = self.service.name, order = activated.order, "Singleton activated");
        Ok(activated.instance.clone())
    }

    fn finalization_order(&self) -> Option<u64> {
        match (self.lifecycle, &self.finalizer, self.activated.get()) {
            (Lifecycle::Singleton, Some(_), Some(activated)) => Some(activated.order),
            _ => None,
        }
    }
}

/// Calls finalizers of activated singletons in LIFO order of activation
pub(crate) fn finalize(entries: Vec<Arc<Entry>>) {
    let mut activated = entries
        .into_iter()
        .filter_map(|entry| entry.finalization_order().map(|order| (order, entry)))
        .collect::<Vec<_>>();
    activated.sort_unstable_by(|(left, _), (right, _)| right.cmp(left));

    for (_, entry) in activated {
        if let (Some(finalizer), Some(instance)) = (&entry.finalizer, entry.concrete_instance()) {
            finalizer(instance);
            debug!(service = entry.service.name, "Finalizer called");
        }
    }
}

pub(crate) enum Insertion {
    Inserted,
    Replaced(Arc<Entry>),
    Kept,
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<ServiceId, Arc<Entry>>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub(crate) fn get(&self, service: &ServiceId) -> Option<Arc<Entry>> {
        self.entries.get(service).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, service: &ServiceId) -> bool {
        self.entries.contains_key(service)
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// # Errors
    /// Returns [`RegisterErrorKind::DuplicateRegistration`] if the service id is taken and the policy is [`OverridePolicy::Reject`]
    pub(crate) fn insert(&mut self, registration: Registration, policy: OverridePolicy) -> Result<Insertion, RegisterErrorKind> {
        let service = registration.service;
        if !self.entries.contains_key(&service) {
            self.entries.insert(service, Arc::new(Entry::new(registration)));
            debug!(service = service.name, "Registered");
            return Ok(Insertion::Inserted);
        }

        match policy {
            OverridePolicy::Reject => Err(RegisterErrorKind::DuplicateRegistration(service)),
            OverridePolicy::KeepExisting => {
                debug!(service = service.name, "Already registered, existing registration kept");
                Ok(Insertion::Kept)
            }
            OverridePolicy::Replace => {
                let replaced = self.entries.insert(service, Arc::new(Entry::new(registration)));
                debug!(service = service.name, "Registration replaced");
                Ok(replaced.map_or(Insertion::Inserted, Insertion::Replaced))
            }
        }
    }

    /// Inserts a batch of registrations as one unit.
    /// With [`OverridePolicy::Reject`] nothing is inserted if any service id is taken.
    ///
    /// Returns the number of written entries and the replaced ones.
    pub(crate) fn merge(
        &mut self,
        registrations: BTreeMap<ServiceId, Registration>,
        policy: OverridePolicy,
    ) -> Result<(usize, Vec<Arc<Entry>>), RegisterErrorKind> {
        if policy == OverridePolicy::Reject {
            if let Some(service) = registrations.keys().find(|service| self.entries.contains_key(service)) {
                return Err(RegisterErrorKind::DuplicateRegistration(*service));
            }
        }

        let mut written = 0;
        let mut replaced = Vec::new();
        for registration in registrations.into_values() {
            match self.insert(registration, policy)? {
                Insertion::Inserted => written += 1,
                Insertion::Replaced(entry) => {
                    written += 1;
                    replaced.push(entry);
                }
                Insertion::Kept => {}
            }
        }
        Ok((written, replaced))
    }

    #[must_use]
    pub(crate) fn drain(&mut self) -> Vec<Arc<Entry>> {
        mem::take(&mut self.entries).into_values().collect()
    }
}
