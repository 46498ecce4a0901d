use std::env;

use bevy::prelude::*;
use control_core::{
    build_headless_app, load_control_config_from_env, run_tick_at, ArbitrationMetrics,
    AuthoritySeat, AuthoritySeatRefs, CompromiseDoctrine, ControlConfigHandle, ControlDomains,
    ControlLinkState, ControlOrderState, HostileOverride, OrderKind, ResolvedControl, RogueTool,
    SeatOccupant, SeatRights, SelfGovernancePreset,
};

const DEFAULT_TICKS: u64 = 240;
/// The commander stops issuing order updates after this tick.
const COMMANDER_SILENT_AFTER: u64 = 100;

struct Roster {
    commander: Entity,
    drones: Vec<Entity>,
}

fn spawn_roster(world: &mut World) -> Roster {
    let commander = world.spawn_empty().id();
    let hacker = world.spawn_empty().id();
    let seat = world
        .spawn((
            AuthoritySeat {
                domains: ControlDomains::MOVEMENT | ControlDomains::WEAPONS | ControlDomains::SENSORS,
                rights: SeatRights::ISSUE | SeatRights::EXECUTE,
                is_executive: true,
            },
            SeatOccupant {
                occupant: Some(commander),
                is_acting: false,
            },
        ))
        .id();

    let presets = ["compliant", "disciplined", "independent"];
    let drones = presets
        .iter()
        .map(|preset| {
            let mut order = ControlOrderState::new(OrderKind::Hold, OrderKind::ReturnToBase)
                .requiring_heartbeat();
            order.issue(OrderKind::Patrol, 1, 90);
            world
                .spawn((
                    AuthoritySeatRefs(vec![seat]),
                    SelfGovernancePreset::new(*preset),
                    order,
                    ControlLinkState::new(commander),
                    CompromiseDoctrine::default(),
                ))
                .id()
        })
        .collect::<Vec<_>>();

    if let Some(&target) = drones.last() {
        world
            .entity_mut(target)
            .insert(HostileOverride::new(hacker, ControlDomains::WEAPONS, 12.0).with_duration(60));
    }

    Roster { commander, drones }
}

fn touch_orders(world: &mut World, roster: &Roster, tick: u64) {
    for &drone in &roster.drones {
        if let Some(mut order) = world.get_mut::<ControlOrderState>(drone) {
            order.touch(tick);
        }
    }
}

fn log_resolved_table(world: &World, roster: &Roster, tick: u64) {
    for &drone in &roster.drones {
        let Some(resolved) = world.get::<ResolvedControl>(drone) else {
            continue;
        };
        for entry in resolved.entries() {
            tracing::info!(
                target: "control::harness",
                tick,
                body = ?drone,
                domain = entry.domain.bits(),
                controller = ?entry.controller,
                commander = entry.controller == Some(roster.commander),
                score = entry.score,
                "harness.resolved"
            );
        }
        let order = world.get::<ControlOrderState>(drone).map(|order| order.kind);
        let rogue = world.get::<RogueTool>(drone).map(|rogue| rogue.reason);
        tracing::info!(
            target: "control::harness",
            tick,
            body = ?drone,
            order = ?order,
            rogue = ?rogue,
            "harness.body_state"
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let ticks = env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TICKS);

    let mut app = build_headless_app();
    app.insert_resource(ControlConfigHandle::new(load_control_config_from_env()));
    let roster = spawn_roster(&mut app.world);

    tracing::info!(
        target: "control::harness",
        ticks,
        bodies = roster.drones.len(),
        "harness.started"
    );

    for tick in 1..=ticks {
        if tick <= COMMANDER_SILENT_AFTER {
            touch_orders(&mut app.world, &roster, tick);
        }
        run_tick_at(&mut app, tick);

        if tick % 60 == 0 || tick == ticks {
            let metrics = app.world.resource::<ArbitrationMetrics>();
            tracing::info!(
                target: "control::harness",
                tick,
                bodies = metrics.bodies_arbitrated,
                resolved = metrics.domains_resolved,
                ungoverned = metrics.domains_ungoverned,
                lost = metrics.links_lost,
                compromised = metrics.links_compromised,
                rogue = metrics.rogue_tools,
                reverted = metrics.orders_reverted_total,
                "harness.metrics"
            );
            log_resolved_table(&app.world, &roster, tick);
        }
    }
}
