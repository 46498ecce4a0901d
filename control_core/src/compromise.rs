use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    components::{ControlLinkState, RogueTool, RogueToolReason},
    resources::SimulationTick,
};

/// Compromise assessment published on a controller entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct CompromiseState {
    pub is_compromised: bool,
    pub suspicion: f32,
    pub severity: f32,
    pub source: Option<Entity>,
}

/// Coarser integrity flag some controllers publish instead of (or alongside)
/// a full [`CompromiseState`].
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerIntegrity {
    pub is_compromised: bool,
    pub compromised_by: Option<Entity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompromiseResponse {
    ImmediatePurge,
    #[default]
    Graded,
}

/// Per-link policy for reacting to a compromised controller.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct CompromiseDoctrine {
    pub quarantine_threshold: f32,
    pub purge_threshold: f32,
    pub preferred_response: CompromiseResponse,
}

impl Default for CompromiseDoctrine {
    fn default() -> Self {
        Self {
            quarantine_threshold: 0.5,
            purge_threshold: 0.8,
            preferred_response: CompromiseResponse::Graded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompromiseVerdict {
    /// Trust in the link is withdrawn.
    pub sever: bool,
    /// The body should be marked as a rogue tool.
    pub purge: bool,
}

pub fn assess_compromise(state: &CompromiseState, doctrine: &CompromiseDoctrine) -> CompromiseVerdict {
    let sever = state.is_compromised || state.suspicion >= doctrine.quarantine_threshold;
    let purge = state.is_compromised
        && (doctrine.preferred_response == CompromiseResponse::ImmediatePurge
            || state.severity >= doctrine.purge_threshold);
    CompromiseVerdict { sever, purge }
}

/// Stage 7: sever links to compromised or suspect controllers and purge past
/// the doctrine's threshold.
pub fn respond_to_compromise(
    mut commands: Commands,
    tick: Res<SimulationTick>,
    compromise: Query<&CompromiseState>,
    mut links: Query<(Entity, &mut ControlLinkState, &CompromiseDoctrine, Has<RogueTool>)>,
) {
    for (body, mut link, doctrine, already_rogue) in links.iter_mut() {
        let Some(state) = link
            .controller
            .and_then(|controller| compromise.get(controller).ok())
        else {
            continue;
        };

        let verdict = assess_compromise(state, doctrine);
        if verdict.sever && !link.is_lost {
            tracing::debug!(
                target: "control::compromise",
                entity = ?body,
                suspicion = state.suspicion,
                confirmed = state.is_compromised,
                "compromise.link_severed"
            );
            link.is_lost = true;
        }

        if verdict.purge && !already_rogue {
            tracing::info!(
                target: "control::compromise",
                entity = ?body,
                severity = state.severity,
                response = ?doctrine.preferred_response,
                tick = tick.0,
                "compromise.rogue_tool_raised"
            );
            commands.entity(body).insert(RogueTool {
                reason: RogueToolReason::HostileOverride,
                since_tick: tick.0,
                allow_friendly_destruction_no_penalty: true,
                hackable: false,
            });
        }
    }
}
