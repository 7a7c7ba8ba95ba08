//! # Object Metadata
//!
//! The slice of store metadata the reconciler reads and writes: identity,
//! labels, annotations, the deletion marker, finalizer tokens and the
//! optimistic-concurrency resource version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespaced identity of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    pub creation_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// Bumped by the store on every spec change
    #[serde(default)]
    pub generation: i64,
    /// Bumped by the store on every write; used for conflict detection
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            finalizers: Vec::new(),
            creation_timestamp: Utc::now(),
            deletion_timestamp: None,
            generation: 1,
            resource_version: 0,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Whether the store has marked the object for deletion
    pub fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, token: &str) -> bool {
        self.finalizers.iter().any(|f| f == token)
    }

    /// Add a finalizer token if absent. Returns true when the list changed.
    pub fn add_finalizer(&mut self, token: &str) -> bool {
        if self.has_finalizer(token) {
            return false;
        }
        self.finalizers.push(token.to_string());
        true
    }

    /// Remove every occurrence of a finalizer token. Returns true when the list changed.
    pub fn remove_finalizer(&mut self, token: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != token);
        before != self.finalizers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalizer_add_is_idempotent() {
        let mut meta = ObjectMeta::new("kafka", "op");
        assert!(meta.add_finalizer("guard"));
        assert!(!meta.add_finalizer("guard"));
        assert_eq!(meta.finalizers, vec!["guard".to_string()]);
    }

    #[test]
    fn test_finalizer_remove_when_absent_is_noop() {
        let mut meta = ObjectMeta::new("kafka", "op");
        meta.finalizers.push("other".to_string());
        assert!(!meta.remove_finalizer("guard"));
        assert_eq!(meta.finalizers, vec!["other".to_string()]);

        meta.add_finalizer("guard");
        assert!(meta.remove_finalizer("guard"));
        assert!(!meta.has_finalizer("guard"));
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("kafka", "op-1").to_string(), "kafka/op-1");
    }
}
