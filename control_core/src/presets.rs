//! Named self-governance presets and the stage that expands them onto bodies.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::components::{SelfGovernance, SelfGovernancePreset};

pub const BUILTIN_SELF_GOVERNANCE_PRESETS: &str = include_str!("data/self_governance_presets.json");

#[derive(Debug, Error)]
pub enum PresetCatalogError {
    #[error("failed to parse self-governance presets: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate self-governance preset id '{0}'")]
    DuplicatePreset(String),
    #[error("preset '{id}' has out-of-range {field}: {value}")]
    OutOfRange {
        id: String,
        field: &'static str,
        value: f32,
    },
}

#[derive(Debug, Deserialize)]
struct PresetCatalogFile {
    presets: Vec<PresetEntry>,
}

#[derive(Debug, Deserialize)]
struct PresetEntry {
    id: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(flatten)]
    governance: SelfGovernance,
}

/// Lookup table from preset name to resolved self-governance parameters.
#[derive(Resource, Debug, Clone, Default)]
pub struct SelfGovernancePresetCatalog {
    presets: HashMap<String, SelfGovernance>,
    notes: HashMap<String, String>,
    order: Vec<String>,
}

impl SelfGovernancePresetCatalog {
    pub fn load_builtin() -> Result<Self, PresetCatalogError> {
        Self::load_from_str(BUILTIN_SELF_GOVERNANCE_PRESETS)
    }

    pub fn load_from_str(json: &str) -> Result<Self, PresetCatalogError> {
        let file: PresetCatalogFile = serde_json::from_str(json)?;
        let mut catalog = Self::default();
        for entry in file.presets {
            validate_entry(&entry)?;
            if catalog.presets.contains_key(&entry.id) {
                return Err(PresetCatalogError::DuplicatePreset(entry.id));
            }
            if let Some(note) = entry.note {
                catalog.notes.insert(entry.id.clone(), note);
            }
            catalog.order.push(entry.id.clone());
            catalog.presets.insert(entry.id, entry.governance);
        }
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&SelfGovernance> {
        self.presets.get(id)
    }

    pub fn note(&self, id: &str) -> Option<&str> {
        self.notes.get(id).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn insert(&mut self, id: impl Into<String>, governance: SelfGovernance) {
        let id = id.into();
        if self.presets.insert(id.clone(), governance).is_none() {
            self.order.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

fn validate_entry(entry: &PresetEntry) -> Result<(), PresetCatalogError> {
    let governance = &entry.governance;
    let checks = [
        ("base_resistance", governance.base_resistance, governance.base_resistance >= 0.0),
        ("self_need_urgency", governance.self_need_urgency, governance.self_need_urgency >= 0.0),
        (
            "domination_affinity",
            governance.domination_affinity,
            (0.0..=1.0).contains(&governance.domination_affinity),
        ),
    ];
    for (field, value, ok) in checks {
        if !ok {
            return Err(PresetCatalogError::OutOfRange {
                id: entry.id.clone(),
                field,
                value,
            });
        }
    }
    Ok(())
}

/// Parameters for a body: its preset when the catalog knows it, otherwise defaults.
pub fn expand_preset(
    catalog: Option<&SelfGovernancePresetCatalog>,
    preset: Option<&SelfGovernancePreset>,
) -> SelfGovernance {
    let Some(preset) = preset else {
        return SelfGovernance::default();
    };
    match catalog.and_then(|catalog| catalog.get(&preset.0)) {
        Some(governance) => *governance,
        None => {
            tracing::warn!(
                target: "control::presets",
                preset = %preset.0,
                "self_governance.preset_unknown fallback=default"
            );
            SelfGovernance::default()
        }
    }
}

/// Stage 1: give every body that names a preset its resolved parameters.
pub fn resolve_self_governance_presets(
    mut commands: Commands,
    catalog: Option<Res<SelfGovernancePresetCatalog>>,
    bodies: Query<(Entity, &SelfGovernancePreset), Without<SelfGovernance>>,
) {
    for (entity, preset) in bodies.iter() {
        let governance = expand_preset(catalog.as_deref(), Some(preset));
        tracing::debug!(
            target: "control::presets",
            entity = ?entity,
            preset = %preset.0,
            "self_governance.resolved"
        );
        commands.entity(entity).insert(governance);
    }
}
