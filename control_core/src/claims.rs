//! Claim producers: authority seats and hostile override directives.
//!
//! Both stages write into the body's shared [`ControlClaims`] list and only
//! ever replace entries carrying their own [`ClaimSourceKind`], so generic
//! claims placed by host systems survive untouched.

use std::collections::HashMap;

use bevy::{ecs::entity::Entities, prelude::*};
use bitflags::bitflags;

use crate::{
    components::{ClaimSourceKind, ControlClaim, ControlClaims},
    control_config::{config_or_default, AuthorityControlClaimConfig, ControlConfigHandle},
    domains::ControlDomains,
    resources::SimulationTick,
};

bitflags! {
    /// Rights a seat grants its occupant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SeatRights: u8 {
        const ISSUE = 1 << 0;
        const EXECUTE = 1 << 1;
        const OVERRIDE = 1 << 2;
    }
}

impl SeatRights {
    pub fn grants_control(self) -> bool {
        self.intersects(SeatRights::ISSUE | SeatRights::EXECUTE | SeatRights::OVERRIDE)
    }
}

/// A named role on a host entity granting domain control to whoever holds it.
#[derive(Component, Debug, Clone)]
pub struct AuthoritySeat {
    pub domains: ControlDomains,
    pub rights: SeatRights,
    pub is_executive: bool,
}

/// Current holder of an [`AuthoritySeat`], stored on the seat entity.
#[derive(Component, Debug, Clone, Default)]
pub struct SeatOccupant {
    pub occupant: Option<Entity>,
    /// Stand-ins carry reduced legitimacy.
    pub is_acting: bool,
}

/// Seats whose occupants claim control over this body.
#[derive(Component, Debug, Clone, Default)]
pub struct AuthoritySeatRefs(pub Vec<Entity>);

/// A single hostile takeover attempt against a body.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct HostileOverride {
    pub controller: Option<Entity>,
    pub domains: ControlDomains,
    pub pressure: f32,
    pub legitimacy: f32,
    pub hostility: f32,
    pub consent: f32,
    pub is_active: bool,
    pub established_tick: u64,
    /// Used to derive `expire_tick` when no explicit expiry was given. `0` means open-ended.
    pub duration_ticks: u64,
    pub expire_tick: u64,
}

impl HostileOverride {
    pub fn new(controller: Entity, domains: ControlDomains, pressure: f32) -> Self {
        Self {
            controller: Some(controller),
            domains,
            pressure,
            legitimacy: 0.0,
            hostility: 1.0,
            consent: 0.0,
            is_active: true,
            established_tick: 0,
            duration_ticks: 0,
            expire_tick: 0,
        }
    }

    pub fn with_duration(mut self, duration_ticks: u64) -> Self {
        self.duration_ticks = duration_ticks;
        self
    }

    /// Re-arm a finished directive so the next pass stamps fresh ticks.
    pub fn rearm(&mut self) {
        self.is_active = true;
        self.established_tick = 0;
        self.expire_tick = 0;
    }

    fn to_claim(&self, controller: Entity) -> ControlClaim {
        let mut claim = ControlClaim::new(controller, self.domains)
            .with_pressure(self.pressure)
            .with_legitimacy(self.legitimacy)
            .with_hostility(self.hostility)
            .with_consent(self.consent)
            .with_expiry(self.expire_tick)
            .with_source_kind(ClaimSourceKind::HostileOverride);
        claim.established_tick = self.established_tick;
        claim
    }
}

/// Claim for one seat, or `None` when the seat has no live occupant or grants nothing.
pub fn authority_claim(
    seat_entity: Entity,
    seat: &AuthoritySeat,
    occupant: &SeatOccupant,
    config: &AuthorityControlClaimConfig,
    is_alive: impl Fn(Entity) -> bool,
) -> Option<ControlClaim> {
    let holder = occupant.occupant.filter(|entity| is_alive(*entity))?;
    if seat.domains.is_empty() || !seat.rights.grants_control() {
        return None;
    }

    let mut legitimacy = config.base_legitimacy;
    if seat.is_executive {
        legitimacy += config.executive_legitimacy_bonus;
    }
    if occupant.is_acting {
        legitimacy *= config.acting_legitimacy_multiplier;
    }

    let mut pressure = config.base_pressure;
    if seat.rights.contains(SeatRights::EXECUTE) {
        pressure += config.execute_pressure_bonus;
    }
    if seat.rights.contains(SeatRights::OVERRIDE) {
        pressure += config.override_pressure_bonus;
    }

    Some(
        ControlClaim::new(holder, seat.domains)
            .with_pressure(pressure)
            .with_legitimacy(legitimacy)
            .with_source_seat(seat_entity)
            .with_source_kind(ClaimSourceKind::Authority),
    )
}

/// Stage 2a: rebuild every body's authority claims from its referenced seats.
pub fn derive_authority_claims(
    mut commands: Commands,
    config: Option<Res<ControlConfigHandle>>,
    entities: &Entities,
    seats: Query<(&AuthoritySeat, &SeatOccupant)>,
    mut bodies: Query<(Entity, &AuthoritySeatRefs, Option<&mut ControlClaims>)>,
) {
    let config = config_or_default(config.as_deref());
    let tuning = config.authority_claims();

    for (body, seat_refs, claims) in bodies.iter_mut() {
        let mut derived: Vec<ControlClaim> = Vec::with_capacity(seat_refs.0.len());
        for &seat_entity in &seat_refs.0 {
            if derived
                .iter()
                .any(|claim| claim.source_seat == Some(seat_entity))
            {
                continue;
            }
            let Ok((seat, occupant)) = seats.get(seat_entity) else {
                continue;
            };
            if let Some(claim) =
                authority_claim(seat_entity, seat, occupant, tuning, |e| entities.contains(e))
            {
                derived.push(claim);
            }
        }

        match claims {
            Some(mut claims) => replace_authority_claims(&mut claims.0, derived),
            None if !derived.is_empty() => {
                commands.entity(body).insert(ControlClaims(derived));
            }
            None => {}
        }
    }
}

/// Drop the previous authority claims and append `derived`, carrying each
/// seat/controller pair's first-seen tick forward.
fn replace_authority_claims(claims: &mut Vec<ControlClaim>, mut derived: Vec<ControlClaim>) {
    let previous: HashMap<(Option<Entity>, Option<Entity>), u64> = claims
        .iter()
        .filter(|claim| claim.source_kind == ClaimSourceKind::Authority)
        .map(|claim| ((claim.source_seat, claim.controller), claim.established_tick))
        .collect();

    for claim in &mut derived {
        if let Some(&established) = previous.get(&(claim.source_seat, claim.controller)) {
            claim.established_tick = established;
        }
    }

    claims.retain(|claim| claim.source_kind != ClaimSourceKind::Authority);
    claims.extend(derived);
}

/// Stage 2b: turn each body's hostile override directive into at most one claim.
pub fn derive_hostile_override_claims(
    mut commands: Commands,
    tick: Res<SimulationTick>,
    entities: &Entities,
    mut bodies: Query<(Entity, &mut HostileOverride, Option<&mut ControlClaims>)>,
) {
    let now = tick.0;

    for (body, mut directive, mut claims) in bodies.iter_mut() {
        let controller = directive
            .controller
            .filter(|controller| entities.contains(*controller));

        let Some(controller) = controller.filter(|_| directive.is_active && !directive.domains.is_empty())
        else {
            if directive.is_active {
                tracing::debug!(
                    target: "control::claims",
                    entity = ?body,
                    "claims.hostile_override.deactivated"
                );
                directive.is_active = false;
            }
            if let Some(claims) = claims.as_deref_mut() {
                clear_hostile_claims(&mut claims.0);
            }
            continue;
        };

        if directive.established_tick == 0 {
            directive.established_tick = now.max(1);
            if directive.expire_tick == 0 && directive.duration_ticks > 0 {
                directive.expire_tick =
                    directive.established_tick.saturating_add(directive.duration_ticks);
            }
            tracing::debug!(
                target: "control::claims",
                entity = ?body,
                controller = ?controller,
                established = directive.established_tick,
                expire = directive.expire_tick,
                "claims.hostile_override.activated"
            );
        }

        if directive.expire_tick != 0 && now >= directive.expire_tick {
            directive.is_active = false;
            if let Some(claims) = claims.as_deref_mut() {
                clear_hostile_claims(&mut claims.0);
            }
            tracing::debug!(
                target: "control::claims",
                entity = ?body,
                tick = now,
                "claims.hostile_override.expired"
            );
            continue;
        }

        let claim = directive.to_claim(controller);
        match claims {
            Some(mut claims) => upsert_hostile_claim(&mut claims.0, claim),
            None => {
                commands.entity(body).insert(ControlClaims(vec![claim]));
            }
        }
    }
}

fn clear_hostile_claims(claims: &mut Vec<ControlClaim>) {
    claims.retain(|claim| claim.source_kind != ClaimSourceKind::HostileOverride);
}

/// Replace the body's hostile claim in place, or append one if none exists.
fn upsert_hostile_claim(claims: &mut Vec<ControlClaim>, mut claim: ControlClaim) {
    let mut seen = false;
    claims.retain(|existing| {
        if existing.source_kind != ClaimSourceKind::HostileOverride {
            return true;
        }
        let keep = !seen;
        seen = true;
        keep
    });

    match claims
        .iter_mut()
        .find(|existing| existing.source_kind == ClaimSourceKind::HostileOverride)
    {
        Some(existing) => {
            if existing.established_tick != 0 {
                claim.established_tick = existing.established_tick;
            }
            *existing = claim;
        }
        None => claims.push(claim),
    }
}
