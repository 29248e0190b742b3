//! Domain types for the galaxy engine.
//!
//! This module contains the record shapes:
//! - Meta: identity, labels, owner references
//! - Galaxy: the parent record enumerating planets
//! - Planet: the child record generated per galaxy item

pub mod galaxy;
pub mod meta;
pub mod planet;

use serde::de::DeserializeOwned;
use serde::Serialize;

// Re-export commonly used types
pub use galaxy::{Galaxy, GalaxyPlanetSpec, GalaxySpec};
pub use meta::{Kind, ObjectKey, ObjectMeta, OwnerReference, TypeMeta, DEFAULT_NAMESPACE};
pub use planet::{Planet, PlanetSpec, GALAXY_LABEL};

/// A typed record that can be stored.
///
/// Every kind is split into the same three parts on its way to the store:
/// type metadata, object metadata and a kind-specific spec.
pub trait Resource: Clone + Send + Sync + 'static {
    /// Kind-specific desired state
    type Spec: Serialize + DeserializeOwned + Clone + Send + Sync;

    const KIND: Kind;

    /// Reassemble a record from its stored parts
    fn from_parts(type_meta: TypeMeta, metadata: ObjectMeta, spec: Self::Spec) -> Self;

    fn type_meta(&self) -> &TypeMeta;
    fn type_meta_mut(&mut self) -> &mut TypeMeta;
    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;
    fn spec(&self) -> &Self::Spec;

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }
}
