//! Write-once service registry.

use std::collections::HashMap;

use colloquy_core::{RegistryError, Service, ServiceDescriptor, ServiceId};

struct Entry {
    descriptor: ServiceDescriptor,
    service: Box<dyn Service>,
}

/// Registered services in registration order.
///
/// There is no removal: the set is fixed once the session starts.
/// Registration order is the tie-break for scheduling and the reverse of
/// shutdown order.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: Vec<Entry>,
    index: HashMap<ServiceId, usize>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service.
    ///
    /// The descriptor is taken from [`Service::describe`] once and kept for
    /// the lifetime of the session. On error the registry is unchanged.
    pub fn register(&mut self, service: Box<dyn Service>) -> Result<ServiceId, RegistryError> {
        let descriptor = service.describe();
        if self.index.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateService(descriptor.id));
        }
        descriptor.validate()?;

        let id = descriptor.id.clone();
        tracing::debug!(
            service = %id,
            publishes = ?descriptor.publishes,
            subscribes = ?descriptor.subscribes,
            domain = ?descriptor.domain,
            "colloquy.registry.register"
        );
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(Entry {
            descriptor,
            service,
        });
        Ok(id)
    }

    /// Every descriptor, in registration order.
    pub fn all_services(&self) -> impl ExactSizeIterator<Item = &ServiceDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Owned copies of every descriptor, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.all_services().cloned().collect()
    }

    /// Descriptor at a registration index.
    pub fn descriptor(&self, index: usize) -> Option<&ServiceDescriptor> {
        self.entries.get(index).map(|e| &e.descriptor)
    }

    /// Registration index of a service.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Whether the service is registered and domain-agnostic.
    pub fn is_shared(&self, id: &str) -> bool {
        self.position(id)
            .and_then(|idx| self.descriptor(idx))
            .is_some_and(ServiceDescriptor::is_shared)
    }

    pub(crate) fn service_mut(&mut self, index: usize) -> Option<&mut Box<dyn Service>> {
        self.entries.get_mut(index).map(|e| &mut e.service)
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.descriptor.id.as_str()))
            .finish()
    }
}
