use bevy::prelude::*;
use control_core::{
    build_headless_app, run_tick_at, AuthoritySeat, AuthoritySeatRefs, CompromiseDoctrine,
    CompromiseState, ControlCheckpointHistory, ControlClaim, ControlClaims, ControlDomains,
    ControlLinkState, ControlOrderState, HostileOverride, OrderKind, SeatOccupant, SeatRights,
    SelfGovernancePreset,
};

/// Ticks after which the commander stops updating orders.
pub const COMMANDER_SILENT_AFTER: u64 = 100;
/// Tick at which the rival's infiltration of the commander is confirmed.
pub const COMPROMISE_CONFIRMED_AT: u64 = 140;

pub struct Scenario {
    pub app: App,
    pub commander: Entity,
    pub rival: Entity,
    pub bodies: Vec<Entity>,
}

/// Commander-held seat over three bodies, a timed hostile override from the
/// rival, a generic rival claim, and a later compromise of the commander.
pub fn scenario() -> Scenario {
    let mut app = build_headless_app();
    app.insert_resource(ControlCheckpointHistory::with_capacity(512));

    let world = &mut app.world;
    let commander = world.spawn(CompromiseState::default()).id();
    let rival = world.spawn_empty().id();
    let seat = world
        .spawn((
            AuthoritySeat {
                domains: ControlDomains::MOVEMENT | ControlDomains::WEAPONS,
                rights: SeatRights::ISSUE | SeatRights::EXECUTE,
                is_executive: true,
            },
            SeatOccupant {
                occupant: Some(commander),
                is_acting: false,
            },
        ))
        .id();

    let bodies = ["compliant", "disciplined", "independent"]
        .into_iter()
        .enumerate()
        .map(|(index, preset)| {
            let mut order = ControlOrderState::new(OrderKind::Hold, OrderKind::ReturnToBase)
                .requiring_heartbeat();
            order.issue(OrderKind::Patrol, 1, 80 + index as u64 * 20);
            world
                .spawn((
                    AuthoritySeatRefs(vec![seat]),
                    SelfGovernancePreset::new(preset),
                    order,
                    ControlLinkState::new(commander),
                    CompromiseDoctrine::default(),
                ))
                .id()
        })
        .collect::<Vec<_>>();

    world
        .entity_mut(bodies[1])
        .insert(HostileOverride::new(rival, ControlDomains::WEAPONS, 14.0).with_duration(70));
    world.entity_mut(bodies[2]).insert(ControlClaims(vec![ControlClaim::new(
        rival,
        ControlDomains::SENSORS | ControlDomains::WEAPONS,
    )
    .with_pressure(6.0)
    .with_consent(0.5)
    .with_expiry(200)]));

    Scenario {
        app,
        commander,
        rival,
        bodies,
    }
}

/// Apply the scripted host inputs for `tick`, then run one arbitration pass.
/// Inputs depend only on `tick`, so a rewound run replays them identically.
pub fn step(scenario: &mut Scenario, tick: u64) {
    if tick <= COMMANDER_SILENT_AFTER {
        for &body in &scenario.bodies {
            if let Some(mut order) = scenario.app.world.get_mut::<ControlOrderState>(body) {
                order.touch(tick);
            }
        }
    }
    if let Some(mut state) = scenario.app.world.get_mut::<CompromiseState>(scenario.commander) {
        *state = if tick >= COMPROMISE_CONFIRMED_AT {
            CompromiseState {
                is_compromised: true,
                suspicion: 1.0,
                severity: 0.9,
                source: Some(scenario.rival),
            }
        } else {
            CompromiseState::default()
        };
    }
    run_tick_at(&mut scenario.app, tick);
}

pub fn run_until(scenario: &mut Scenario, from: u64, to: u64) {
    for tick in from..=to {
        step(scenario, tick);
    }
}
