//! Keyed freelist of recyclable presentation handles.
//!
//! The renderer acquires a handle per entity from the template the entity
//! is drawn with and releases it once any exit presentation is over.
//! Released handles are detached and kept for the next acquire of the same
//! template. Free lists are unbounded and never evicted; [`ResourcePool::clear`]
//! on session teardown is the only thing that empties them.

use std::collections::HashMap;

use tracing::trace;

/// A handle the pool can recycle.
pub trait Pooled {
    /// Disconnect the handle from any live presentation context (parent,
    /// listeners) before it is parked. The default does nothing.
    fn detach(&mut self) {}
}

/// Pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Handles built by a factory.
    pub created: u64,
    /// Acquires served from a free list.
    pub reused: u64,
    /// Handles returned to the pool.
    pub released: u64,
    /// Handles currently parked across all templates.
    pub idle: usize,
}

/// Free lists keyed by template id.
#[derive(Debug)]
pub struct ResourcePool<H> {
    free: HashMap<String, Vec<H>>,
    created: u64,
    reused: u64,
    released: u64,
}

impl<H> Default for ResourcePool<H> {
    fn default() -> Self {
        Self {
            free: HashMap::new(),
            created: 0,
            reused: 0,
            released: 0,
        }
    }
}

impl<H: Pooled> ResourcePool<H> {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a parked handle for `template`, or build one with `factory`.
    ///
    /// A reused handle keeps whatever per-use state it had; resetting it is
    /// the caller's job.
    pub fn acquire<F>(&mut self, template: &str, factory: F) -> H
    where
        F: FnOnce() -> H,
    {
        if let Some(handle) = self.free.get_mut(template).and_then(Vec::pop) {
            self.reused = self.reused.saturating_add(1);
            trace!(template, "reusing pooled handle");
            return handle;
        }
        self.created = self.created.saturating_add(1);
        trace!(template, "building new handle");
        factory()
    }

    /// Detach `handle` and park it under `template`.
    pub fn release(&mut self, template: &str, mut handle: H) {
        handle.detach();
        self.released = self.released.saturating_add(1);
        self.free.entry(template.to_owned()).or_default().push(handle);
    }

    /// Handles parked under `template`.
    pub fn idle(&self, template: &str) -> usize {
        self.free.get(template).map_or(0, Vec::len)
    }

    /// Handles parked across all templates.
    pub fn total_idle(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created,
            reused: self.reused,
            released: self.released,
            idle: self.total_idle(),
        }
    }

    /// Drop every parked handle and reset the counters.
    pub fn clear(&mut self) {
        self.free.clear();
        self.created = 0;
        self.reused = 0;
        self.released = 0;
    }
}
