//! Galaxy: the parent record.
//!
//! A galaxy is written by users; the engine only reads it and keeps one
//! planet record per entry in `spec.planets`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::meta::{Kind, ObjectMeta, TypeMeta};
use super::planet::nullable_diameter;
use super::Resource;

/// One desired planet, embedded in a galaxy spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalaxyPlanetSpec {
    /// Item name (unique within the galaxy)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(
        default,
        skip_serializing_if = "is_zero",
        deserialize_with = "nullable_diameter"
    )]
    pub diameter_km: f64,

    #[serde(default, skip_serializing_if = "is_false")]
    pub has_life: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moons: Vec<String>,
}

/// Desired state of a galaxy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GalaxySpec {
    /// Display name (informational only)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Planets to keep in sync, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planets: Vec<GalaxyPlanetSpec>,
}

/// Galaxy record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Galaxy {
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: GalaxySpec,
}

impl Galaxy {
    pub fn new(metadata: ObjectMeta, spec: GalaxySpec) -> Self {
        Self {
            type_meta: TypeMeta::default(),
            metadata,
            spec,
        }
    }

    /// Load a galaxy manifest from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read galaxy manifest: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a galaxy manifest from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse galaxy YAML")
    }

    /// Find a planet item by name
    pub fn planet(&self, name: &str) -> Option<&GalaxyPlanetSpec> {
        self.spec.planets.iter().find(|p| p.name == name)
    }
}

impl Resource for Galaxy {
    type Spec = GalaxySpec;

    const KIND: Kind = Kind::Galaxy;

    fn from_parts(type_meta: TypeMeta, metadata: ObjectMeta, spec: GalaxySpec) -> Self {
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

    fn spec(&self) -> &GalaxySpec {
        &self.spec
    }
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

fn is_false(value: &bool) -> bool {
    !*value
}
