use bevy::prelude::*;

use crate::components::{ArbitrationEnabled, ControlLinkState, ControlLinks, ResolvedControl, RogueTool};

#[derive(Resource, Default, Debug, Clone, PartialEq)]
pub struct ArbitrationMetrics {
    pub passes: u64,
    pub bodies_arbitrated: usize,
    pub links_total: usize,
    pub domains_contested: usize,
    pub domains_resolved: usize,
    pub domains_ungoverned: usize,
    pub links_lost: usize,
    pub links_compromised: usize,
    pub rogue_tools: usize,
    /// Incremented by order retention; never reset.
    pub orders_reverted_total: u64,
}

pub fn collect_arbitration_metrics(
    mut metrics: ResMut<ArbitrationMetrics>,
    bodies: Query<(&ControlLinks, &ResolvedControl), With<ArbitrationEnabled>>,
    link_states: Query<&ControlLinkState>,
    rogue_tools: Query<(), With<RogueTool>>,
) {
    metrics.passes += 1;

    let mut bodies_arbitrated = 0usize;
    let mut links_total = 0usize;
    let mut domains_contested = 0usize;
    let mut domains_resolved = 0usize;
    let mut domains_ungoverned = 0usize;

    for (links, resolved) in bodies.iter() {
        bodies_arbitrated += 1;
        links_total += links.0.len();
        domains_contested += links.domain_union().single_bits().len();
        for entry in resolved.entries() {
            if entry.controller.is_some() {
                domains_resolved += 1;
            } else {
                domains_ungoverned += 1;
            }
        }
    }

    let (mut links_lost, mut links_compromised) = (0usize, 0usize);
    for state in link_states.iter() {
        if state.is_lost {
            links_lost += 1;
        }
        if state.is_compromised {
            links_compromised += 1;
        }
    }

    metrics.bodies_arbitrated = bodies_arbitrated;
    metrics.links_total = links_total;
    metrics.domains_contested = domains_contested;
    metrics.domains_resolved = domains_resolved;
    metrics.domains_ungoverned = domains_ungoverned;
    metrics.links_lost = links_lost;
    metrics.links_compromised = links_compromised;
    metrics.rogue_tools = rogue_tools.iter().count();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{ControlClaim, ControlLink, ResolvedControlEntry, RogueToolReason},
        domains::ControlDomains,
    };
    use bevy::app::App;
    use bevy_ecs::system::RunSystemOnce;

    #[test]
    fn counts_reflect_current_world_and_keep_reversion_total() {
        let mut app = App::new();
        app.insert_resource(ArbitrationMetrics {
            orders_reverted_total: 4,
            links_lost: 99,
            ..ArbitrationMetrics::default()
        });
        let controller = app.world.spawn_empty().id();
        let link = ControlLink::from_claim(&ControlClaim::new(
            controller,
            ControlDomains::MOVEMENT | ControlDomains::WEAPONS,
        ));
        app.world.spawn((
            ArbitrationEnabled,
            ControlLinks(vec![link.clone(), link]),
            ResolvedControl(vec![
                ResolvedControlEntry {
                    domain: ControlDomains::MOVEMENT,
                    controller: Some(controller),
                    score: 2.0,
                },
                ResolvedControlEntry {
                    domain: ControlDomains::WEAPONS,
                    controller: None,
                    score: -1.0,
                },
            ]),
        ));
        let mut lost = ControlLinkState::new(controller);
        lost.is_lost = true;
        app.world.spawn((
            lost,
            RogueTool {
                reason: RogueToolReason::LostControl,
                since_tick: 3,
                allow_friendly_destruction_no_penalty: true,
                hackable: true,
            },
        ));

        app.world.run_system_once(collect_arbitration_metrics);

        let metrics = app.world.resource::<ArbitrationMetrics>();
        assert_eq!(metrics.passes, 1);
        assert_eq!(metrics.bodies_arbitrated, 1);
        assert_eq!(metrics.links_total, 2);
        assert_eq!(metrics.domains_contested, 2);
        assert_eq!(metrics.domains_resolved, 1);
        assert_eq!(metrics.domains_ungoverned, 1);
        assert_eq!(metrics.links_lost, 1);
        assert_eq!(metrics.links_compromised, 0);
        assert_eq!(metrics.rogue_tools, 1);
        assert_eq!(metrics.orders_reverted_total, 4);
    }
}
