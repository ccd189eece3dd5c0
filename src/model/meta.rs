use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Object metadata carried by the workflow resource.
///
/// `resource_version` is the optimistic-concurrency token: the store rejects
/// an update whose version does not match the stored one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub resource_version: u64,
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub finalizers: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// True once the user has requested deletion; the object stays visible
    /// until every finalizer has been removed.
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, name: &str) -> bool {
        self.finalizers.iter().any(|f| f == name)
    }

    pub fn add_finalizer(&mut self, name: &str) {
        if !self.has_finalizer(name) {
            self.finalizers.push(name.to_string());
        }
    }

    pub fn remove_finalizer(&mut self, name: &str) {
        self.finalizers.retain(|f| f != name);
    }
}

/// Reference naming the workflow as the controller of a child execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    pub controller: bool,
}
