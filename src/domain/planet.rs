//! Planet: the child record generated from one galaxy item.

use serde::{Deserialize, Deserializer, Serialize};

use super::meta::{Kind, ObjectMeta, TypeMeta};
use super::Resource;

/// Label naming the galaxy that owns a planet (back-reference for reverse lookup)
pub const GALAXY_LABEL: &str = "kubesphere.io/galaxy";

/// Desired state of a planet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, deserialize_with = "nullable_diameter")]
    pub diameter_km: f64,

    #[serde(default)]
    pub has_life: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moons: Vec<String>,
}

impl PlanetSpec {
    /// Structural equality over every named field.
    ///
    /// Diameters compare by bit pattern so a spec always matches itself,
    /// including NaN.
    pub fn matches(&self, other: &PlanetSpec) -> bool {
        self.name == other.name
            && self.diameter_km.to_bits() == other.diameter_km.to_bits()
            && self.has_life == other.has_life
            && self.moons == other.moons
    }
}

/// JSON has no NaN and writes it as `null`; read `null` back as NaN
pub(crate) fn nullable_diameter<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl PartialEq for PlanetSpec {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

/// Planet record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PlanetSpec,
}

impl Planet {
    pub fn new(metadata: ObjectMeta, spec: PlanetSpec) -> Self {
        Self {
            type_meta: TypeMeta::default(),
            metadata,
            spec,
        }
    }

    /// Name of the owning galaxy, read from the back-reference label
    pub fn galaxy(&self) -> Option<&str> {
        self.metadata
            .label(GALAXY_LABEL)
            .filter(|name| !name.is_empty())
    }
}

impl Resource for Planet {
    type Spec = PlanetSpec;

    const KIND: Kind = Kind::Planet;

    fn from_parts(type_meta: TypeMeta, metadata: ObjectMeta, spec: PlanetSpec) -> Self {
        Self {
            type_meta,
            metadata,
            spec,
        }
    }

    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn type_meta_mut(&mut self) -> &mut TypeMeta {
        &mut self.type_meta
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn spec(&self) -> &PlanetSpec {
        &self.spec
    }
}
