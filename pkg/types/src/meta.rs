use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Reference from an owned object back to the controller that manages it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
    pub uid: String,
    /// True when the owner is the managing controller, not just a parent.
    #[serde(default)]
    pub controller: bool,
}

/// Metadata shared by every stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    /// Monotonically increasing version assigned by the state store.
    /// Conditional writes compare against it; a stale version loses.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    /// Set once deletion has been requested. The object lingers until its
    /// finalizers are cleared and its dependents are observed gone.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ObjectMeta {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: Uuid::new_v4().to_string(),
            resource_version: 0,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            owner: None,
            finalizers: Vec::new(),
            deletion_timestamp: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, name: &str) -> bool {
        self.finalizers.iter().any(|f| f == name)
    }
}

/// Accessors every stored object provides to the state store.
pub trait Object {
    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;
}

/// Objects carrying a controller-owned status subresource. The status
/// update path persists only the status, never spec or metadata.
pub trait StatusObject: Object {
    /// Overwrite the status of `self` with the status of `src`, leaving
    /// everything else untouched.
    fn copy_status_from(&mut self, src: &Self);
}
