//! Registry of objects holding lazily loaded pixels.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::navigation::PageGraph;

/// Something whose pixel buffers can be dropped and transparently reloaded.
pub trait Resource: Send + Sync {
    fn resource_key(&self) -> &str;
    /// Drop cached pixels. Idempotent; the definition is untouched.
    fn release(&self);
    fn is_loaded(&self) -> bool;
}

/// Tracks every registered resource and releases the ones not preserved.
///
/// Page check elements are typically preserved so that switching tasks does
/// not reload the images used on every navigation.
#[derive(Default)]
pub struct ResourceCache {
    instances: BTreeMap<String, Arc<dyn Resource>>,
    preserved: BTreeSet<String>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, owner: Arc<dyn Resource>) {
        let key = owner.resource_key().to_string();
        if self.instances.insert(key.clone(), owner).is_some() {
            log::debug!("Resource {} registered again, replacing", key);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Resource>> {
        self.instances.get(key)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn preserve<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserved.extend(keys.into_iter().map(Into::into));
    }

    /// Preserve the check element and every link button of each page.
    pub fn preserve_pages(&mut self, graph: &PageGraph) {
        let before = self.preserved.len();
        for (_, page) in graph.iter() {
            let elements = page.check().into_iter().chain(page.links().values());
            self.preserved.extend(elements.map(|e| e.resource_key().to_string()));
        }
        log::debug!(
            "Preserving {} page resources ({} new)",
            self.preserved.len(),
            self.preserved.len() - before
        );
    }

    pub fn is_preserved(&self, key: &str) -> bool {
        self.preserved.contains(key)
    }

    /// Release one resource. Unknown keys are ignored.
    pub fn release(&self, key: &str) {
        if let Some(owner) = self.instances.get(key) {
            owner.release();
        }
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.instances.get(key).is_some_and(|owner| owner.is_loaded())
    }

    /// Keys of resources currently holding pixels.
    pub fn loaded(&self) -> Vec<&str> {
        self.instances
            .iter()
            .filter(|(_, owner)| owner.is_loaded())
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Release every loaded resource outside the preserved set.
    /// Returns how many were released.
    pub fn release_all(&self) -> usize {
        let mut released = 0;
        for (key, owner) in &self.instances {
            if self.preserved.contains(key) || !owner.is_loaded() {
                continue;
            }
            owner.release();
            released += 1;
        }
        if released > 0 {
            log::info!("🧹 Released {} cached resources", released);
        }
        released
    }
}
