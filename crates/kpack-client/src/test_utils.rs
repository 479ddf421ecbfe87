use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use kube::{Resource, ResourceExt};

use crate::{
    client::{Error, ResourceClient, Scoped},
    patch::{Operation, Patch},
};

/// An in-memory stand-in for the API server, holding resources of a single kind.
///
/// Like the API server it bumps the resource version on every write, evaluates `test`
/// operations and refuses to create a resource twice.
pub struct FakeClient<K> {
    state: Mutex<State<K>>,
}

struct State<K> {
    resources: BTreeMap<(String, String), K>,
    patches: Vec<Patch>,
    next_version: u64,
}

impl<K> Default for FakeClient<K> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                resources: BTreeMap::new(),
                patches: Vec::new(),
                next_version: 1,
            }),
        }
    }
}

fn key<K: Scoped>(name: &str, namespace: &str) -> (String, String) {
    // Cluster-scoped resources are stored without namespace.
    let namespace = if K::NAMESPACED { namespace } else { "" };
    (namespace.to_owned(), name.to_owned())
}

impl<K: Scoped> FakeClient<K> {
    /// Stores `resource` as if it had been created, returning it with its resource version.
    pub fn insert(&self, mut resource: K) -> K {
        let mut state = self.state.lock().expect("lock is not poisoned");
        state.stamp(&mut resource);
        let key = key::<K>(&resource.name_any(), &resource.namespace().unwrap_or_default());
        state.resources.insert(key, resource.clone());
        resource
    }

    pub fn stored(&self, name: &str, namespace: &str) -> Option<K> {
        let state = self.state.lock().expect("lock is not poisoned");
        state.resources.get(&key::<K>(name, namespace)).cloned()
    }

    /// Every patch received so far, including rejected ones.
    pub fn patches(&self) -> Vec<Patch> {
        let state = self.state.lock().expect("lock is not poisoned");
        state.patches.clone()
    }
}

impl<K: Resource> State<K> {
    fn stamp(&mut self, resource: &mut K) {
        let meta = resource.meta_mut();
        meta.resource_version = Some(self.next_version.to_string());
        meta.generation = Some(meta.generation.unwrap_or_default() + 1);
        self.next_version += 1;
    }
}

#[async_trait]
impl<K: Scoped> ResourceClient<K> for FakeClient<K> {
    async fn get_opt(&self, name: &str, namespace: &str) -> Result<Option<K>, Error> {
        Ok(self.stored(name, namespace))
    }

    async fn list(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<K>, Error> {
        let state = self.state.lock().expect("lock is not poisoned");
        let matches_selector = |resource: &K| match label_selector.and_then(|s| s.split_once('=')) {
            Some((label, value)) => resource.labels().get(label).is_some_and(|v| v == value),
            None => true,
        };

        Ok(state
            .resources
            .iter()
            .filter(|((stored_namespace, _), _)| {
                !K::NAMESPACED || stored_namespace == namespace
            })
            .map(|(_, resource)| resource)
            .filter(|resource| matches_selector(resource))
            .cloned()
            .collect())
    }

    async fn create(&self, resource: &K) -> Result<K, Error> {
        let key = key::<K>(&resource.name_any(), &resource.namespace().unwrap_or_default());
        let mut state = self.state.lock().expect("lock is not poisoned");

        if state.resources.contains_key(&key) {
            return Err(Error::AlreadyExists {
                kind: K::kind_name(),
                name: resource.name_any(),
            });
        }

        let mut created = resource.clone();
        state.stamp(&mut created);
        state.resources.insert(key, created.clone());
        Ok(created)
    }

    async fn patch(&self, resource: &K, patch: &Patch) -> Result<K, Error> {
        let name = resource.name_any();
        let key = key::<K>(&name, &resource.namespace().unwrap_or_default());
        let mut state = self.state.lock().expect("lock is not poisoned");
        state.patches.push(patch.clone());

        let stored = state.resources.get(&key).cloned().ok_or_else(|| Error::NotFound {
            kind: K::kind_name(),
            name: name.clone(),
        })?;
        let mut document = serde_json::to_value(&stored).expect("resource serializes");

        for operation in patch.operations() {
            if let Operation::Test { path, value } = operation
                && document.pointer(path) != Some(value)
            {
                return Err(Error::Conflict {
                    kind: K::kind_name(),
                    name,
                });
            }
        }

        let json_patch = patch.to_json_patch().expect("patch converts");
        json_patch::patch(&mut document, &json_patch.0).expect("patch applies");

        let mut patched: K = serde_json::from_value(document).expect("patched resource deserializes");
        state.stamp(&mut patched);
        state.resources.insert(key, patched.clone());
        Ok(patched)
    }

    async fn delete(&self, name: &str, namespace: &str) -> Result<(), Error> {
        let mut state = self.state.lock().expect("lock is not poisoned");

        match state.resources.remove(&key::<K>(name, namespace)) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                kind: K::kind_name(),
                name: name.to_owned(),
            }),
        }
    }
}
