use bevy::prelude::*;

use crate::{
    components::{ControlLinkState, ControlOrderState, RogueTool, RogueToolReason},
    control_config::{config_or_default, ControlConfigHandle},
    metrics::ArbitrationMetrics,
    resources::SimulationTick,
};

/// True when the order needs a heartbeat and none has arrived within
/// `timeout` ticks. Before the first heartbeat the issue tick is the reference.
pub fn heartbeat_missing(
    order: &ControlOrderState,
    link: &ControlLinkState,
    tick: u64,
    timeout: u64,
) -> bool {
    if !order.requires_heartbeat {
        return false;
    }
    let reference = if link.last_heartbeat_tick != 0 {
        link.last_heartbeat_tick
    } else {
        order.issued_tick
    };
    tick.saturating_sub(reference) > timeout
}

/// Stage 8: fall back to the safe directive once an unreliable order lapses,
/// and flag uncontrolled or compromised bodies as rogue tools.
pub fn retain_orders(
    mut commands: Commands,
    tick: Res<SimulationTick>,
    config: Option<Res<ControlConfigHandle>>,
    mut metrics: Option<ResMut<ArbitrationMetrics>>,
    mut bodies: Query<(Entity, &mut ControlOrderState, &ControlLinkState, Has<RogueTool>)>,
) {
    let now = tick.0;
    let config = config_or_default(config.as_deref());
    let timeout = config.link_health().heartbeat_timeout_ticks;

    for (body, mut order, link, already_rogue) in bodies.iter_mut() {
        let heartbeat_lost = heartbeat_missing(&order, link, now, timeout);
        let expired = order.is_expired(now);

        if (link.is_lost || heartbeat_lost) && expired && order.kind != order.fallback_kind {
            let abandoned = order.kind;
            order.revert_to_fallback(now);
            tracing::debug!(
                target: "control::retention",
                entity = ?body,
                from = ?abandoned,
                to = ?order.kind,
                sequence = order.sequence,
                "retention.order_reverted"
            );
            if let Some(metrics) = metrics.as_deref_mut() {
                metrics.orders_reverted_total += 1;
            }
        }

        if !already_rogue && ((link.is_lost && expired) || link.is_compromised) {
            let reason = if link.is_compromised {
                RogueToolReason::HostileOverride
            } else {
                RogueToolReason::LostControl
            };
            tracing::info!(
                target: "control::retention",
                entity = ?body,
                reason = ?reason,
                tick = now,
                "retention.rogue_tool_raised"
            );
            commands.entity(body).insert(RogueTool {
                reason,
                since_tick: now,
                allow_friendly_destruction_no_penalty: true,
                hackable: true,
            });
        }
    }
}
