//! Control-arbitration kernel for the real-time simulation.
//!
//! Decides, tick by tick, which controller governs each domain of every body,
//! tracks the health of those control links, and degrades orders and trust
//! when control becomes unreliable. Every stage is a Bevy system; the stages
//! run as a chain on the [`Update`] schedule when [`run_tick`] is invoked.

pub mod checkpoint;
pub mod claim_bridge;
pub mod claims;
pub mod components;
pub mod compromise;
pub mod control_config;
pub mod domains;
pub mod link_health;
pub mod metrics;
pub mod presets;
pub mod resolver;
pub mod resources;
pub mod retention;

use bevy::prelude::*;

pub use checkpoint::{
    capture_control_checkpoint, decode_checkpoint, encode_checkpoint, restore_control_checkpoint,
    BodyCheckpoint, CheckpointError, ControlCheckpoint, ControlCheckpointHistory,
};
pub use claims::{AuthoritySeat, AuthoritySeatRefs, HostileOverride, SeatOccupant, SeatRights};
pub use components::{
    ArbitrationEnabled, ClaimSourceKind, ControlClaim, ControlClaims, ControlLink,
    ControlLinkState, ControlLinks, ControlOrderState, LinkSource, OrderKind, ResolvedControl,
    ResolvedControlEntry, RogueTool, RogueToolReason, SelfGovernance, SelfGovernancePreset,
};
pub use compromise::{
    CompromiseDoctrine, CompromiseResponse, CompromiseState, ControllerIntegrity,
};
pub use control_config::{
    load_control_config_from_env, AuthorityControlClaimConfig, ControlConfigError,
    ControlConfigHandle, ControlKernelConfig, ControlLinkHealthConfig,
};
pub use domains::ControlDomains;
pub use metrics::ArbitrationMetrics;
pub use presets::{PresetCatalogError, SelfGovernancePresetCatalog};
pub use resources::{arbitration_active, ReplayMode, SimulationClock, SimulationTick};

/// Pipeline stages in execution order. Each stage finishes, and its deferred
/// commands are applied, before the next one starts.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlStage {
    Presets,
    Claims,
    Bridge,
    Resolve,
    Heartbeat,
    Health,
    Compromise,
    Retention,
    Telemetry,
    Record,
}

/// Installs the arbitration pipeline and any resources the host has not
/// provided yet.
#[derive(Default)]
pub struct ControlArbitrationPlugin;

impl Plugin for ControlArbitrationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationTick>()
            .init_resource::<SimulationClock>()
            .init_resource::<ArbitrationMetrics>();

        if !app.world.contains_resource::<ControlConfigHandle>() {
            app.insert_resource(ControlConfigHandle::new(ControlKernelConfig::builtin()));
        }
        if !app.world.contains_resource::<SelfGovernancePresetCatalog>() {
            let catalog = SelfGovernancePresetCatalog::load_builtin().unwrap_or_else(|err| {
                tracing::warn!(
                    target: "control::presets",
                    error = %err,
                    "presets.builtin_load_failed"
                );
                SelfGovernancePresetCatalog::default()
            });
            app.insert_resource(catalog);
        }

        app.configure_sets(
            Update,
            (
                ControlStage::Presets,
                ControlStage::Claims,
                ControlStage::Bridge,
                ControlStage::Resolve,
                ControlStage::Heartbeat,
                ControlStage::Health,
                ControlStage::Compromise,
                ControlStage::Retention,
                ControlStage::Telemetry,
                ControlStage::Record,
            )
                .chain()
                .run_if(arbitration_active),
        )
        .add_systems(
            Update,
            (
                presets::resolve_self_governance_presets.in_set(ControlStage::Presets),
                (
                    claims::derive_authority_claims,
                    claims::derive_hostile_override_claims,
                )
                    .chain()
                    .in_set(ControlStage::Claims),
                claim_bridge::bridge_claims_to_links.in_set(ControlStage::Bridge),
                resolver::resolve_control.in_set(ControlStage::Resolve),
                link_health::propagate_heartbeats.in_set(ControlStage::Heartbeat),
                link_health::monitor_link_health.in_set(ControlStage::Health),
                compromise::respond_to_compromise.in_set(ControlStage::Compromise),
                retention::retain_orders.in_set(ControlStage::Retention),
                metrics::collect_arbitration_metrics.in_set(ControlStage::Telemetry),
                checkpoint::record_checkpoint.in_set(ControlStage::Record),
            ),
        );
    }
}

/// Construct a Bevy [`App`] configured with the arbitration pipeline.
pub fn build_headless_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(ControlArbitrationPlugin);
    app
}

/// Execute a single arbitration pass at the current [`SimulationTick`].
///
/// The host owns the clock; see [`run_tick_at`] to set the tick first.
pub fn run_tick(app: &mut App) {
    app.update();
}

/// Set the [`SimulationTick`] and execute a single arbitration pass.
pub fn run_tick_at(app: &mut App, tick: u64) {
    app.world.insert_resource(SimulationTick(tick));
    app.update();
}
