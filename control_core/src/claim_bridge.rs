use bevy::{ecs::entity::Entities, prelude::*};

use crate::{
    components::{
        ArbitrationEnabled, ControlClaims, ControlLink, ControlLinks, LinkSource, ResolvedControl,
        SelfGovernance, SelfGovernancePreset,
    },
    presets::{expand_preset, SelfGovernancePresetCatalog},
    resources::SimulationTick,
};

/// Stage 3: prune claims, scaffold newly-claimed bodies, and rebuild the
/// claim-sourced portion of each body's link list.
///
/// Links tagged [`LinkSource::External`] are left exactly where they are; the
/// fresh claim links are appended after them in claim order.
pub fn bridge_claims_to_links(
    mut commands: Commands,
    tick: Res<SimulationTick>,
    entities: &Entities,
    catalog: Option<Res<SelfGovernancePresetCatalog>>,
    mut bodies: Query<(
        Entity,
        &mut ControlClaims,
        Option<&mut ControlLinks>,
        Option<&SelfGovernancePreset>,
        Has<ArbitrationEnabled>,
        Has<SelfGovernance>,
        Has<ResolvedControl>,
    )>,
) {
    let now = tick.0;
    // 0 is reserved for "unset".
    let stamp = now.max(1);

    for (body, mut claims, links, preset, enabled, has_governance, has_resolved) in
        bodies.iter_mut()
    {
        let before = claims.len();
        claims.0.retain(|claim| {
            claim
                .controller
                .is_some_and(|controller| entities.contains(controller))
                && !claim.is_expired(now)
        });
        let pruned = before - claims.len();
        if pruned > 0 {
            tracing::trace!(
                target: "control::bridge",
                entity = ?body,
                pruned,
                "bridge.claims_pruned"
            );
        }

        for claim in claims.0.iter_mut() {
            if claim.established_tick == 0 {
                claim.established_tick = stamp;
            }
        }

        let fresh: Vec<ControlLink> = claims
            .iter()
            .filter(|claim| !claim.is_inert())
            .map(ControlLink::from_claim)
            .collect();

        if !fresh.is_empty() {
            let mut scaffold = commands.entity(body);
            if !enabled {
                scaffold.insert(ArbitrationEnabled);
                tracing::debug!(
                    target: "control::bridge",
                    entity = ?body,
                    "bridge.arbitration_enabled"
                );
            }
            if !has_governance {
                scaffold.insert(expand_preset(catalog.as_deref(), preset));
            }
            if !has_resolved {
                scaffold.insert(ResolvedControl::default());
            }
        }

        match links {
            Some(mut links) => {
                links.0.retain(|link| link.source != LinkSource::Claim);
                links.0.extend(fresh);
            }
            None if !fresh.is_empty() => {
                commands.entity(body).insert(ControlLinks(fresh));
            }
            None => {}
        }
    }
}
