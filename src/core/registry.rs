//! Kind registry.
//!
//! Built once at startup and shared read-only (`Arc<Registry>`) by the store
//! client and both reconcilers. It answers two questions: which API version a
//! kind is served under, and what owner reference points at a given record.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::{Kind, OwnerReference, Resource, TypeMeta};

/// API group/version every built-in kind is registered under
pub const API_VERSION: &str = "galaxy.kubesphere.io/v1";

/// Registry lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Kind {0} is not registered")]
    UnknownKind(Kind),

    #[error("{kind} {name} has no uid; only stored records can own others")]
    MissingUid { kind: Kind, name: String },
}

/// Immutable kind → API version table
#[derive(Debug, Clone)]
pub struct Registry {
    kinds: BTreeMap<Kind, String>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with every built-in kind
    pub fn standard() -> Self {
        Self::builder()
            .register(Kind::Galaxy, API_VERSION)
            .register(Kind::Planet, API_VERSION)
            .build()
    }

    pub fn is_registered(&self, kind: Kind) -> bool {
        self.kinds.contains_key(&kind)
    }

    pub fn api_version(&self, kind: Kind) -> Result<&str, RegistryError> {
        self.kinds
            .get(&kind)
            .map(String::as_str)
            .ok_or(RegistryError::UnknownKind(kind))
    }

    /// Type metadata to stamp on a record of the given kind
    pub fn type_meta(&self, kind: Kind) -> Result<TypeMeta, RegistryError> {
        Ok(TypeMeta {
            api_version: self.api_version(kind)?.to_string(),
            kind: kind.as_str().to_string(),
        })
    }

    /// Controller owner reference pointing at `owner`
    pub fn controller_reference<R: Resource>(
        &self,
        owner: &R,
    ) -> Result<OwnerReference, RegistryError> {
        let api_version = self.api_version(R::KIND)?;
        let meta = owner.metadata();
        let uid = meta.uid.ok_or_else(|| RegistryError::MissingUid {
            kind: R::KIND,
            name: meta.name.clone(),
        })?;

        Ok(OwnerReference {
            api_version: api_version.to_string(),
            kind: R::KIND.as_str().to_string(),
            name: meta.name.clone(),
            uid,
            controller: true,
            block_owner_deletion: true,
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Collects registrations before freezing them into a `Registry`
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    kinds: BTreeMap<Kind, String>,
}

impl RegistryBuilder {
    pub fn register(mut self, kind: Kind, api_version: impl Into<String>) -> Self {
        self.kinds.insert(kind, api_version.into());
        self
    }

    pub fn build(self) -> Registry {
        Registry { kinds: self.kinds }
    }
}
