use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;

use super::BuildError;

/// A stored value together with the name of its concrete type.
struct Artifact {
    value: Box<dyn Any>,
    type_name: &'static str,
}

/// Pipeline-scoped map from string keys to type-erased values.
///
/// Every retrieval checks the stored type at runtime; a value is never handed
/// out as anything other than the type it was pushed as.
#[derive(Default)]
pub struct ArtifactStore {
    artifacts: HashMap<String, Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the artifact under `key`.
    ///
    /// Returns `true` when an earlier value was replaced (last write wins).
    pub fn push<T: Any>(&mut self, key: impl Into<String>, value: T) -> bool {
        let key = key.into();
        let artifact = Artifact {
            value: Box::new(value),
            type_name: type_name::<T>(),
        };

        let replaced = self.artifacts.insert(key.clone(), artifact).is_some();
        if replaced {
            log::debug!("artifact `{key}` replaced with `{}`", type_name::<T>());
        } else {
            log::debug!("artifact `{key}` published as `{}`", type_name::<T>());
        }
        replaced
    }

    /// Returns the untyped payload stored under `key`.
    pub fn fetch_any(&self, key: &str) -> Result<&dyn Any, BuildError> {
        self.artifact(key).map(|a| &*a.value)
    }

    /// Returns the artifact under `key` as a `T`.
    pub fn fetch<T: Any>(&self, key: &str) -> Result<&T, BuildError> {
        let artifact = self.artifact(key)?;
        artifact
            .value
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(key, artifact.type_name))
    }

    /// Returns the artifact under `key` as a mutable `T`.
    pub fn fetch_mut<T: Any>(&mut self, key: &str) -> Result<&mut T, BuildError> {
        let artifact = self
            .artifacts
            .get_mut(key)
            .ok_or_else(|| BuildError::missing_key(key))?;

        let found = artifact.type_name;
        artifact
            .value
            .downcast_mut::<T>()
            .ok_or_else(|| mismatch::<T>(key, found))
    }

    /// Removes the artifact under `key` and hands ownership to the caller.
    ///
    /// On a type mismatch the artifact stays in the store.
    pub fn take<T: Any>(&mut self, key: &str) -> Result<T, BuildError> {
        let artifact = self
            .artifacts
            .remove(key)
            .ok_or_else(|| BuildError::missing_key(key))?;

        let found = artifact.type_name;
        match artifact.value.downcast::<T>() {
            Ok(value) => {
                log::debug!("artifact `{key}` taken");
                Ok(*value)
            }
            Err(value) => {
                self.artifacts.insert(
                    key.to_owned(),
                    Artifact {
                        value,
                        type_name: found,
                    },
                );
                Err(mismatch::<T>(key, found))
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.artifacts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Keys currently present, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    fn artifact(&self, key: &str) -> Result<&Artifact, BuildError> {
        self.artifacts
            .get(key)
            .ok_or_else(|| BuildError::missing_key(key))
    }
}

fn mismatch<T: Any>(key: &str, found: &'static str) -> BuildError {
    BuildError::TypeMismatch {
        key: key.to_owned(),
        expected: type_name::<T>(),
        found,
    }
}

impl fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self
            .artifacts
            .iter()
            .map(|(k, a)| (k.as_str(), a.type_name))
            .collect();
        entries.sort_unstable();
        f.debug_map().entries(entries).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ErrorKind;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    struct QueuePair(u32, u32);

    #[test]
    fn fetch_returns_pushed_value() {
        let mut store = ArtifactStore::new();
        store.push("select.queue_index", QueuePair(0, 1));
        store.push("name", String::from("gpu0"));

        assert_eq!(store.fetch::<QueuePair>("select.queue_index").unwrap(), &QueuePair(0, 1));
        assert_eq!(store.fetch::<String>("name").unwrap(), "gpu0");
    }

    #[test]
    fn fetch_with_wrong_type_is_a_mismatch() {
        let mut store = ArtifactStore::new();
        store.push("count", 3u32);

        let err = store.fetch::<u64>("count").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        match err {
            BuildError::TypeMismatch { key, expected, found } => {
                assert_eq!(key, "count");
                assert_eq!(expected, "u64");
                assert_eq!(found, "u32");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(
            store.fetch_mut::<i32>("count").unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn fetch_of_unpushed_key_is_missing() {
        let store = ArtifactStore::new();
        assert_eq!(store.fetch::<u32>("nope").unwrap_err().kind(), ErrorKind::MissingKey);
        assert_eq!(store.fetch_any("nope").unwrap_err().kind(), ErrorKind::MissingKey);
    }

    #[test]
    fn second_push_overwrites_first() {
        let mut store = ArtifactStore::new();
        assert!(!store.push("k", 1u32));
        assert!(store.push("k", 2u32));

        assert_eq!(store.len(), 1);
        assert_eq!(*store.fetch::<u32>("k").unwrap(), 2);
    }

    #[test]
    fn overwrite_may_change_the_type() {
        let mut store = ArtifactStore::new();
        store.push("k", 1u32);
        store.push("k", "text");

        assert_eq!(store.fetch::<u32>("k").unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(*store.fetch::<&str>("k").unwrap(), "text");
    }

    #[test]
    fn fetch_any_allows_manual_downcast() {
        let mut store = ArtifactStore::new();
        store.push("k", 7u8);

        let any = store.fetch_any("k").unwrap();
        assert_eq!(any.downcast_ref::<u8>(), Some(&7));
        assert!(any.downcast_ref::<u16>().is_none());
    }

    #[test]
    fn fetch_mut_updates_in_place() {
        let mut store = ArtifactStore::new();
        store.push("log", Vec::<&str>::new());

        store.fetch_mut::<Vec<&str>>("log").unwrap().push("a");
        store.fetch_mut::<Vec<&str>>("log").unwrap().push("b");

        assert_eq!(store.fetch::<Vec<&str>>("log").unwrap(), &["a", "b"]);
    }

    #[test]
    fn take_transfers_ownership() {
        let mut store = ArtifactStore::new();
        store.push("bundle", String::from("device"));

        let taken: String = store.take("bundle").unwrap();
        assert_eq!(taken, "device");
        assert!(!store.contains("bundle"));
        assert_eq!(store.take::<String>("bundle").unwrap_err().kind(), ErrorKind::MissingKey);
    }

    #[test]
    fn take_with_wrong_type_leaves_artifact_in_place() {
        let mut store = ArtifactStore::new();
        store.push("bundle", 5i64);

        assert_eq!(store.take::<i32>("bundle").unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(*store.fetch::<i64>("bundle").unwrap(), 5);
    }

    #[test]
    fn dropping_the_store_releases_artifacts() {
        struct Tracked(Rc<Cell<usize>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let released = Rc::new(Cell::new(0));
        {
            let mut store = ArtifactStore::new();
            store.push("a", Tracked(released.clone()));
            store.push("b", Tracked(released.clone()));
            // Overwriting releases the old value right away.
            store.push("a", Tracked(released.clone()));
            assert_eq!(released.get(), 1);
        }
        assert_eq!(released.get(), 3);
    }

    #[test]
    fn debug_lists_keys_and_types() {
        let mut store = ArtifactStore::new();
        store.push("b", 1u32);
        store.push("a", true);

        assert_eq!(format!("{store:?}"), r#"{"a": "bool", "b": "u32"}"#);
        let mut keys: Vec<_> = store.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, ["a", "b"]);
    }
}
