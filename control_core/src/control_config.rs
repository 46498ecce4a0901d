use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_CONTROL_CONFIG: &str = include_str!("data/control_config.json");

/// Tunables for the arbitration kernel.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControlKernelConfig {
    authority_claims: AuthorityControlClaimConfig,
    link_health: ControlLinkHealthConfig,
}

impl ControlKernelConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_CONTROL_CONFIG)
                .expect("builtin control config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ControlConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| ControlConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let config = ControlKernelConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn authority_claims(&self) -> &AuthorityControlClaimConfig {
        &self.authority_claims
    }

    pub fn link_health(&self) -> &ControlLinkHealthConfig {
        &self.link_health
    }

    pub fn with_authority_claims(mut self, authority_claims: AuthorityControlClaimConfig) -> Self {
        self.authority_claims = authority_claims;
        self
    }

    pub fn with_link_health(mut self, link_health: ControlLinkHealthConfig) -> Self {
        self.link_health = link_health;
        self
    }
}

#[derive(Debug, Error)]
pub enum ControlConfigError {
    #[error("failed to parse control config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read control config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Legitimacy and pressure granted to claims derived from authority seats.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthorityControlClaimConfig {
    pub base_legitimacy: f32,
    pub executive_legitimacy_bonus: f32,
    pub acting_legitimacy_multiplier: f32,
    pub base_pressure: f32,
    pub execute_pressure_bonus: f32,
    pub override_pressure_bonus: f32,
}

impl Default for AuthorityControlClaimConfig {
    fn default() -> Self {
        Self {
            base_legitimacy: 0.5,
            executive_legitimacy_bonus: 0.25,
            acting_legitimacy_multiplier: 0.6,
            base_pressure: 4.0,
            execute_pressure_bonus: 2.0,
            override_pressure_bonus: 3.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlLinkHealthConfig {
    pub heartbeat_timeout_ticks: u64,
    pub min_comms_quality: f32,
}

impl Default for ControlLinkHealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ticks: 120,
            min_comms_quality: 0.2,
        }
    }
}

#[derive(Resource, Debug, Clone)]
pub struct ControlConfigHandle(pub Arc<ControlKernelConfig>);

impl ControlConfigHandle {
    pub fn new(config: Arc<ControlKernelConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<ControlKernelConfig> {
        Arc::clone(&self.0)
    }

    pub fn config(&self) -> &ControlKernelConfig {
        &self.0
    }

    pub fn replace(&mut self, config: Arc<ControlKernelConfig>) {
        self.0 = config;
    }
}

/// Config for a system that may run without the handle installed.
pub(crate) fn config_or_default(handle: Option<&ControlConfigHandle>) -> Arc<ControlKernelConfig> {
    handle
        .map(ControlConfigHandle::get)
        .unwrap_or_else(|| Arc::new(ControlKernelConfig::default()))
}

pub fn load_control_config_from_env() -> Arc<ControlKernelConfig> {
    if let Some(path) = env::var("CONTROL_CONFIG_PATH").ok().map(PathBuf::from) {
        match ControlKernelConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "control::config",
                    path = %path.display(),
                    "control_config.loaded=file"
                );
                return Arc::new(config);
            }
            Err(err) => {
                tracing::warn!(
                    target: "control::config",
                    path = %path.display(),
                    error = %err,
                    "control_config.load_failed"
                );
            }
        }
    }

    tracing::info!(target: "control::config", "control_config.loaded=builtin");
    ControlKernelConfig::builtin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_documented_defaults() {
        let config = ControlKernelConfig::builtin();
        assert_eq!(config.link_health().heartbeat_timeout_ticks, 120);
        assert!((config.link_health().min_comms_quality - 0.2).abs() < f32::EPSILON);
        assert!((config.authority_claims().base_pressure - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config =
            ControlKernelConfig::from_json_str(r#"{ "link_health": { "heartbeat_timeout_ticks": 30 } }"#)
                .expect("partial config parses");
        assert_eq!(config.link_health().heartbeat_timeout_ticks, 30);
        assert!((config.link_health().min_comms_quality - 0.2).abs() < f32::EPSILON);
        assert!((config.authority_claims().override_pressure_bonus - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ControlKernelConfig::from_file(Path::new("/nonexistent/control.json"))
            .expect_err("missing file should fail");
        assert!(matches!(err, ControlConfigError::ReadFailed { .. }));
    }

    #[test]
    fn handle_replace_swaps_in_tuned_config() {
        let mut handle = ControlConfigHandle::new(ControlKernelConfig::builtin());
        let tuned = ControlKernelConfig::default()
            .with_authority_claims(AuthorityControlClaimConfig {
                base_pressure: 7.5,
                ..AuthorityControlClaimConfig::default()
            })
            .with_link_health(ControlLinkHealthConfig {
                heartbeat_timeout_ticks: 15,
                min_comms_quality: 0.5,
            });

        handle.replace(Arc::new(tuned));

        assert_eq!(handle.config().link_health().heartbeat_timeout_ticks, 15);
        assert!((handle.config().authority_claims().base_pressure - 7.5).abs() < f32::EPSILON);
        assert!(
            (handle.get().authority_claims().execute_pressure_bonus - 2.0).abs() < f32::EPSILON
        );
    }

    #[test]
    fn absent_handle_falls_back_to_defaults() {
        let config = config_or_default(None);
        assert_eq!(config.link_health().heartbeat_timeout_ticks, 120);
    }
}
