//! Heartbeat inference and link liveness.

use bevy::{ecs::entity::Entities, prelude::*};

use crate::{
    components::{ControlLinkState, ControlOrderState},
    compromise::{CompromiseState, ControllerIntegrity},
    control_config::{config_or_default, ControlConfigHandle, ControlLinkHealthConfig},
    resources::SimulationTick,
};

/// Stage 5: an order update counts as a heartbeat from the controller.
pub fn propagate_heartbeats(mut bodies: Query<(&ControlOrderState, &mut ControlLinkState)>) {
    for (order, mut link) in bodies.iter_mut() {
        if order.last_updated_tick > link.last_heartbeat_tick {
            link.last_heartbeat_tick = order.last_updated_tick;
        }
    }
}

/// Health computed for one link this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHealth {
    pub is_lost: bool,
    pub is_compromised: bool,
    pub compromise_source: Option<Entity>,
}

/// Why a link counts as lost, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossCause {
    ControllerGone,
    CommsDegraded,
    HeartbeatTimeout,
}

pub fn loss_cause(
    link: &ControlLinkState,
    controller_alive: bool,
    tick: u64,
    config: &ControlLinkHealthConfig,
) -> Option<LossCause> {
    if link.controller.is_none() || !controller_alive {
        Some(LossCause::ControllerGone)
    } else if link.comms_quality < config.min_comms_quality {
        Some(LossCause::CommsDegraded)
    } else if link.heartbeat_stale(tick, config.heartbeat_timeout_ticks) {
        Some(LossCause::HeartbeatTimeout)
    } else {
        None
    }
}

/// Compromise as reported by the controller. A reporting [`CompromiseState`]
/// takes precedence over [`ControllerIntegrity`].
pub fn controller_compromise(
    state: Option<&CompromiseState>,
    integrity: Option<&ControllerIntegrity>,
) -> (bool, Option<Entity>) {
    if let Some(state) = state.filter(|state| state.is_compromised) {
        return (true, state.source);
    }
    if let Some(integrity) = integrity.filter(|integrity| integrity.is_compromised) {
        return (true, integrity.compromised_by);
    }
    (false, None)
}

/// Stage 6: recompute lost/compromised flags for every link.
pub fn monitor_link_health(
    tick: Res<SimulationTick>,
    config: Option<Res<ControlConfigHandle>>,
    entities: &Entities,
    compromise: Query<&CompromiseState>,
    integrity: Query<&ControllerIntegrity>,
    mut links: Query<(Entity, &mut ControlLinkState)>,
) {
    let config = config_or_default(config.as_deref());
    let health = config.link_health();

    for (body, mut link) in links.iter_mut() {
        let controller = link.controller.filter(|controller| entities.contains(*controller));
        let cause = loss_cause(&link, controller.is_some(), tick.0, health);
        let (is_compromised, compromise_source) = match controller {
            Some(controller) => controller_compromise(
                compromise.get(controller).ok(),
                integrity.get(controller).ok(),
            ),
            None => (false, None),
        };

        let verdict = LinkHealth {
            is_lost: cause.is_some(),
            is_compromised,
            compromise_source,
        };

        if verdict.is_lost != link.is_lost {
            tracing::debug!(
                target: "control::health",
                entity = ?body,
                lost = verdict.is_lost,
                cause = ?cause,
                tick = tick.0,
                "health.link_lost_changed"
            );
            link.is_lost = verdict.is_lost;
        }
        if verdict.is_compromised != link.is_compromised
            || verdict.compromise_source != link.compromise_source
        {
            tracing::debug!(
                target: "control::health",
                entity = ?body,
                compromised = verdict.is_compromised,
                source = ?verdict.compromise_source,
                "health.link_compromise_changed"
            );
            link.is_compromised = verdict.is_compromised;
            link.compromise_source = verdict.compromise_source;
        }
    }
}
