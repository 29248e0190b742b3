//! Record metadata shared by every stored kind.
//!
//! Mirrors the declarative-store conventions the engine relies on: a stable
//! identity (namespace + name), a store-assigned uid and resource version,
//! labels, and owner references.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used when none is given
pub const DEFAULT_NAMESPACE: &str = "default";

/// Kinds of records the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    /// Parent record enumerating planets
    Galaxy,

    /// Child record generated from one galaxy item
    Planet,
}

impl Kind {
    /// All known kinds, in dependency order (owners first)
    pub const ALL: [Kind; 2] = [Kind::Galaxy, Kind::Planet];

    /// Kind name as written in records
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Galaxy => "Galaxy",
            Kind::Planet => "Planet",
        }
    }

    /// Plural lowercase name (used for store paths and the CLI)
    pub fn plural(&self) -> &'static str {
        match self {
            Kind::Galaxy => "galaxies",
            Kind::Planet => "planets",
        }
    }

    /// Parse a plural name back into a kind
    pub fn from_plural(plural: &str) -> Option<Self> {
        Kind::ALL.into_iter().find(|k| k.plural() == plural)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a record within a kind
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

/// API version and kind carried by every serialized record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMeta {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,
}

/// Back-pointer from a dependent record to its owner.
///
/// At most one reference on a record may have `controller` set; that owner is
/// the one whose deletion cascades to the dependent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: Uuid,

    #[serde(default)]
    pub controller: bool,

    #[serde(default)]
    pub block_owner_deletion: bool,
}

impl OwnerReference {
    /// Whether this reference names the same owner (kind, name and uid)
    pub fn same_owner(&self, other: &OwnerReference) -> bool {
        self.kind == other.kind && self.name == other.name && self.uid == other.uid
    }
}

/// Standard metadata of a stored record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    /// Assigned by the store on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    /// Optimistic concurrency token, bumped by the store on every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<u64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Metadata for a record that has not been stored yet
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_plural_roundtrip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_plural(kind.plural()), Some(kind));
        }
        assert_eq!(Kind::from_plural("stars"), None);
    }

    #[test]
    fn test_object_key_display() {
        let key = ObjectKey::new("default", "sol");
        assert_eq!(key.to_string(), "default/sol");
    }

    #[test]
    fn test_meta_serializes_camel_case_and_omits_empty() {
        let meta =
            ObjectMeta::new("default", "sol-earth").with_label("kubesphere.io/galaxy", "sol");
        let json = serde_json::to_value(&meta).unwrap();

        assert_eq!(json["name"], "sol-earth");
        assert_eq!(json["labels"]["kubesphere.io/galaxy"], "sol");
        assert!(json.get("ownerReferences").is_none());
        assert!(json.get("resourceVersion").is_none());
    }

    #[test]
    fn test_same_owner_ignores_controller_flag() {
        let uid = Uuid::new_v4();
        let a = OwnerReference {
            api_version: "galaxy.kubesphere.io/v1".to_string(),
            kind: "Galaxy".to_string(),
            name: "sol".to_string(),
            uid,
            controller: true,
            block_owner_deletion: true,
        };
        let b = OwnerReference {
            controller: false,
            ..a.clone()
        };
        let c = OwnerReference {
            uid: Uuid::new_v4(),
            ..a.clone()
        };

        assert!(a.same_owner(&b));
        assert!(!a.same_owner(&c));
    }
}
