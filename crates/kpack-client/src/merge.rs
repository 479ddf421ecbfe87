//! Keyed operations on lists that Kubernetes treats as maps, such as env vars or secret
//! references.
//!
//! All operations keep the relative order of untouched entries, so that the patch computed
//! afterwards only mentions the entries that actually changed.

use k8s_openapi::api::core::v1::{EnvVar, LocalObjectReference, ObjectReference};

/// An entry of a list whose entries are unique by some key.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for String {
    fn key(&self) -> &str {
        self
    }
}

impl Keyed for EnvVar {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for LocalObjectReference {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for ObjectReference {
    fn key(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

pub fn position<T: Keyed>(list: &[T], key: &str) -> Option<usize> {
    list.iter().position(|entry| entry.key() == key)
}

pub fn contains_key<T: Keyed>(list: &[T], key: &str) -> bool {
    position(list, key).is_some()
}

/// Replaces the entry with the same key as `item` in place, or appends `item`.
///
/// Returns `true` if an existing entry was replaced.
pub fn upsert<T: Keyed>(list: &mut Vec<T>, item: T) -> bool {
    match position(list, item.key()) {
        Some(index) => {
            list[index] = item;
            true
        }
        None => {
            list.push(item);
            false
        }
    }
}

/// Removes the first entry with `key`, returning it.
pub fn remove<T: Keyed>(list: &mut Vec<T>, key: &str) -> Option<T> {
    position(list, key).map(|index| list.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.to_owned(),
            value: Some(value.to_owned()),
            ..EnvVar::default()
        }
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut list = vec![env("a", "1"), env("b", "2"), env("c", "3")];

        assert!(upsert(&mut list, env("b", "20")));

        assert_eq!(list, [env("a", "1"), env("b", "20"), env("c", "3")]);
    }

    #[test]
    fn upsert_appends_new_keys() {
        let mut list = vec![env("foo", "")];

        assert!(!upsert(&mut list, env("bar", "baz")));

        assert_eq!(list, [env("foo", ""), env("bar", "baz")]);
    }

    #[test]
    fn remove_keeps_order() {
        let mut tags = vec!["t1".to_owned(), "t2".to_owned(), "t3".to_owned()];

        assert_eq!(remove(&mut tags, "t2").as_deref(), Some("t2"));
        assert_eq!(remove(&mut tags, "t9"), None);

        assert_eq!(tags, ["t1", "t3"]);
    }

    #[test]
    fn object_reference_without_name_has_empty_key() {
        let list = vec![ObjectReference::default()];

        assert!(contains_key(&list, ""));
        assert!(!contains_key(&list, "registry-credentials"));
    }
}
