//! Plain-record checkpoints of arbitration state for record/rewind hosts.

use std::collections::VecDeque;

use bevy::{
    ecs::query::QueryData,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    claims::{AuthoritySeat, AuthoritySeatRefs, HostileOverride, SeatOccupant, SeatRights},
    components::{
        ArbitrationEnabled, ClaimSourceKind, ControlClaim, ControlClaims, ControlLink,
        ControlLinkState, ControlLinks, ControlOrderState, LinkSource, OrderKind, ResolvedControl,
        ResolvedControlEntry, RogueTool, RogueToolReason, SelfGovernance, SelfGovernancePreset,
    },
    compromise::{CompromiseDoctrine, CompromiseResponse, CompromiseState, ControllerIntegrity},
    domains::ControlDomains,
    resources::SimulationTick,
};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to encode control checkpoint: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode control checkpoint: {0}")]
    Decode(#[source] bincode::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub controller: Option<u64>,
    pub source_seat: Option<u64>,
    pub domains: u32,
    pub pressure: f32,
    pub legitimacy: f32,
    pub hostility: f32,
    pub consent: f32,
    pub established_tick: u64,
    pub expire_tick: u64,
    pub source_kind: ClaimSourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub controller: Option<u64>,
    pub domains: u32,
    pub pressure: f32,
    pub legitimacy: f32,
    pub hostility: f32,
    pub consent: f32,
    pub established_tick: u64,
    pub source: LinkSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub domain: u32,
    pub controller: Option<u64>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStateRecord {
    pub controller: Option<u64>,
    pub comms_quality: f32,
    pub last_heartbeat_tick: u64,
    pub is_lost: bool,
    pub is_compromised: bool,
    pub compromise_source: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub kind: OrderKind,
    pub fallback_kind: OrderKind,
    pub issued_tick: u64,
    pub last_updated_tick: u64,
    pub sequence: u32,
    pub requires_heartbeat: bool,
    pub expiry_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RogueToolRecord {
    pub reason: RogueToolReason,
    pub since_tick: u64,
    pub allow_friendly_destruction_no_penalty: bool,
    pub hackable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostileOverrideRecord {
    pub controller: Option<u64>,
    pub domains: u32,
    pub pressure: f32,
    pub legitimacy: f32,
    pub hostility: f32,
    pub consent: f32,
    pub is_active: bool,
    pub established_tick: u64,
    pub duration_ticks: u64,
    pub expire_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctrineRecord {
    pub quarantine_threshold: f32,
    pub purge_threshold: f32,
    pub preferred_response: CompromiseResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompromiseRecord {
    pub is_compromised: bool,
    pub suspicion: f32,
    pub severity: f32,
    pub source: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub is_compromised: bool,
    pub compromised_by: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatRecord {
    pub domains: u32,
    pub rights: u8,
    pub is_executive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupantRecord {
    pub occupant: Option<u64>,
    pub is_acting: bool,
}

/// Every arbitration component on one entity: bodies, controllers and seats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyCheckpoint {
    pub entity: u64,
    pub arbitration_enabled: bool,
    pub governance: Option<SelfGovernance>,
    pub claims: Option<Vec<ClaimRecord>>,
    pub links: Option<Vec<LinkRecord>>,
    pub resolved: Option<Vec<ResolvedRecord>>,
    pub link_state: Option<LinkStateRecord>,
    pub order: Option<OrderRecord>,
    pub rogue_tool: Option<RogueToolRecord>,
    pub hostile_override: Option<HostileOverrideRecord>,
    pub preset: Option<String>,
    pub seat_refs: Option<Vec<u64>>,
    pub doctrine: Option<DoctrineRecord>,
    pub compromise: Option<CompromiseRecord>,
    pub integrity: Option<IntegrityRecord>,
    pub seat: Option<SeatRecord>,
    pub occupant: Option<OccupantRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCheckpoint {
    pub tick: u64,
    pub bodies: Vec<BodyCheckpoint>,
}

#[derive(QueryData)]
pub struct BodyRecordQuery {
    entity: Entity,
    arbitration_enabled: Has<ArbitrationEnabled>,
    governance: Option<&'static SelfGovernance>,
    claims: Option<&'static ControlClaims>,
    links: Option<&'static ControlLinks>,
    resolved: Option<&'static ResolvedControl>,
    link_state: Option<&'static ControlLinkState>,
    order: Option<&'static ControlOrderState>,
    rogue_tool: Option<&'static RogueTool>,
    hostile_override: Option<&'static HostileOverride>,
    preset: Option<&'static SelfGovernancePreset>,
    seat_refs: Option<&'static AuthoritySeatRefs>,
    doctrine: Option<&'static CompromiseDoctrine>,
    compromise: Option<&'static CompromiseState>,
    integrity: Option<&'static ControllerIntegrity>,
    seat: Option<&'static AuthoritySeat>,
    occupant: Option<&'static SeatOccupant>,
}

pub type BodyRecordFilter = Or<(
    With<ControlClaims>,
    With<ControlLinks>,
    With<ControlLinkState>,
    With<ControlOrderState>,
    With<HostileOverride>,
    With<SelfGovernancePreset>,
    With<AuthoritySeatRefs>,
    With<CompromiseDoctrine>,
    With<CompromiseState>,
    With<ControllerIntegrity>,
    With<AuthoritySeat>,
    With<SeatOccupant>,
)>;

fn bits(entity: Option<Entity>) -> Option<u64> {
    entity.map(Entity::to_bits)
}

fn entity(bits: Option<u64>) -> Option<Entity> {
    bits.map(Entity::from_bits)
}

fn body_checkpoint(item: BodyRecordQueryItem<'_>) -> BodyCheckpoint {
    BodyCheckpoint {
        entity: item.entity.to_bits(),
        arbitration_enabled: item.arbitration_enabled,
        governance: item.governance.copied(),
        claims: item.claims.map(|claims| claims.iter().map(claim_record).collect()),
        links: item.links.map(|links| links.iter().map(link_record).collect()),
        resolved: item.resolved.map(|resolved| {
            resolved
                .entries()
                .iter()
                .map(|entry| ResolvedRecord {
                    domain: entry.domain.bits(),
                    controller: bits(entry.controller),
                    score: entry.score,
                })
                .collect()
        }),
        link_state: item.link_state.map(|state| LinkStateRecord {
            controller: bits(state.controller),
            comms_quality: state.comms_quality,
            last_heartbeat_tick: state.last_heartbeat_tick,
            is_lost: state.is_lost,
            is_compromised: state.is_compromised,
            compromise_source: bits(state.compromise_source),
        }),
        order: item.order.map(|order| OrderRecord {
            kind: order.kind,
            fallback_kind: order.fallback_kind,
            issued_tick: order.issued_tick,
            last_updated_tick: order.last_updated_tick,
            sequence: order.sequence,
            requires_heartbeat: order.requires_heartbeat,
            expiry_tick: order.expiry_tick,
        }),
        rogue_tool: item.rogue_tool.map(|rogue| RogueToolRecord {
            reason: rogue.reason,
            since_tick: rogue.since_tick,
            allow_friendly_destruction_no_penalty: rogue.allow_friendly_destruction_no_penalty,
            hackable: rogue.hackable,
        }),
        hostile_override: item.hostile_override.map(|directive| HostileOverrideRecord {
            controller: bits(directive.controller),
            domains: directive.domains.bits(),
            pressure: directive.pressure,
            legitimacy: directive.legitimacy,
            hostility: directive.hostility,
            consent: directive.consent,
            is_active: directive.is_active,
            established_tick: directive.established_tick,
            duration_ticks: directive.duration_ticks,
            expire_tick: directive.expire_tick,
        }),
        preset: item.preset.map(|preset| preset.0.clone()),
        seat_refs: item
            .seat_refs
            .map(|refs| refs.0.iter().map(|seat| seat.to_bits()).collect()),
        doctrine: item.doctrine.map(|doctrine| DoctrineRecord {
            quarantine_threshold: doctrine.quarantine_threshold,
            purge_threshold: doctrine.purge_threshold,
            preferred_response: doctrine.preferred_response,
        }),
        compromise: item.compromise.map(|state| CompromiseRecord {
            is_compromised: state.is_compromised,
            suspicion: state.suspicion,
            severity: state.severity,
            source: bits(state.source),
        }),
        integrity: item.integrity.map(|integrity| IntegrityRecord {
            is_compromised: integrity.is_compromised,
            compromised_by: bits(integrity.compromised_by),
        }),
        seat: item.seat.map(|seat| SeatRecord {
            domains: seat.domains.bits(),
            rights: seat.rights.bits(),
            is_executive: seat.is_executive,
        }),
        occupant: item.occupant.map(|occupant| OccupantRecord {
            occupant: bits(occupant.occupant),
            is_acting: occupant.is_acting,
        }),
    }
}

fn claim_record(claim: &ControlClaim) -> ClaimRecord {
    ClaimRecord {
        controller: bits(claim.controller),
        source_seat: bits(claim.source_seat),
        domains: claim.domains.bits(),
        pressure: claim.pressure,
        legitimacy: claim.legitimacy,
        hostility: claim.hostility,
        consent: claim.consent,
        established_tick: claim.established_tick,
        expire_tick: claim.expire_tick,
        source_kind: claim.source_kind,
    }
}

fn link_record(link: &ControlLink) -> LinkRecord {
    LinkRecord {
        controller: bits(link.controller),
        domains: link.domains.bits(),
        pressure: link.pressure,
        legitimacy: link.legitimacy,
        hostility: link.hostility,
        consent: link.consent,
        established_tick: link.established_tick,
        source: link.source,
    }
}

fn build_checkpoint<'w>(
    tick: u64,
    items: impl Iterator<Item = BodyRecordQueryItem<'w>>,
) -> ControlCheckpoint {
    let mut bodies: Vec<BodyCheckpoint> = items.map(body_checkpoint).collect();
    bodies.sort_unstable_by_key(|body| body.entity);
    ControlCheckpoint { tick, bodies }
}

/// Capture every arbitration component in `world`, sorted by entity.
pub fn capture_control_checkpoint(world: &mut World) -> ControlCheckpoint {
    let tick = world
        .get_resource::<SimulationTick>()
        .copied()
        .unwrap_or_default()
        .0;
    let mut query = world.query_filtered::<BodyRecordQuery, BodyRecordFilter>();
    build_checkpoint(tick, query.iter(world))
}

pub fn encode_checkpoint(checkpoint: &ControlCheckpoint) -> Result<Vec<u8>, CheckpointError> {
    bincode::serialize(checkpoint).map_err(CheckpointError::Encode)
}

pub fn decode_checkpoint(bytes: &[u8]) -> Result<ControlCheckpoint, CheckpointError> {
    bincode::deserialize(bytes).map_err(CheckpointError::Decode)
}

fn set_or_remove<T: Component>(entity: &mut EntityWorldMut<'_>, value: Option<T>) {
    match value {
        Some(value) => {
            entity.insert(value);
        }
        None => {
            entity.remove::<T>();
        }
    }
}

/// Write recorded state back onto live entities. Entities that no longer
/// exist are skipped; returns how many bodies were restored.
pub fn restore_control_checkpoint(world: &mut World, checkpoint: &ControlCheckpoint) -> usize {
    let mut restored = 0;
    for body in &checkpoint.bodies {
        let Some(mut target) = world.get_entity_mut(Entity::from_bits(body.entity)) else {
            tracing::warn!(
                target: "control::checkpoint",
                entity = body.entity,
                "checkpoint.restore_skipped entity_missing"
            );
            continue;
        };

        if body.arbitration_enabled {
            target.insert(ArbitrationEnabled);
        } else {
            target.remove::<ArbitrationEnabled>();
        }
        set_or_remove(&mut target, body.governance);
        set_or_remove(
            &mut target,
            body.claims.as_ref().map(|records| {
                ControlClaims(records.iter().map(claim_from_record).collect())
            }),
        );
        set_or_remove(
            &mut target,
            body.links.as_ref().map(|records| {
                ControlLinks(records.iter().map(link_from_record).collect())
            }),
        );
        set_or_remove(
            &mut target,
            body.resolved.as_ref().map(|records| {
                ResolvedControl(
                    records
                        .iter()
                        .map(|record| ResolvedControlEntry {
                            domain: ControlDomains::from_raw(record.domain),
                            controller: entity(record.controller),
                            score: record.score,
                        })
                        .collect(),
                )
            }),
        );
        set_or_remove(
            &mut target,
            body.link_state.as_ref().map(|record| ControlLinkState {
                controller: entity(record.controller),
                comms_quality: record.comms_quality,
                last_heartbeat_tick: record.last_heartbeat_tick,
                is_lost: record.is_lost,
                is_compromised: record.is_compromised,
                compromise_source: entity(record.compromise_source),
            }),
        );
        set_or_remove(
            &mut target,
            body.order.as_ref().map(|record| ControlOrderState {
                kind: record.kind,
                fallback_kind: record.fallback_kind,
                issued_tick: record.issued_tick,
                last_updated_tick: record.last_updated_tick,
                sequence: record.sequence,
                requires_heartbeat: record.requires_heartbeat,
                expiry_tick: record.expiry_tick,
            }),
        );
        set_or_remove(
            &mut target,
            body.rogue_tool.as_ref().map(|record| RogueTool {
                reason: record.reason,
                since_tick: record.since_tick,
                allow_friendly_destruction_no_penalty: record.allow_friendly_destruction_no_penalty,
                hackable: record.hackable,
            }),
        );
        set_or_remove(
            &mut target,
            body.hostile_override.as_ref().map(|record| HostileOverride {
                controller: entity(record.controller),
                domains: ControlDomains::from_raw(record.domains),
                pressure: record.pressure,
                legitimacy: record.legitimacy,
                hostility: record.hostility,
                consent: record.consent,
                is_active: record.is_active,
                established_tick: record.established_tick,
                duration_ticks: record.duration_ticks,
                expire_tick: record.expire_tick,
            }),
        );
        set_or_remove(&mut target, body.preset.clone().map(SelfGovernancePreset));
        set_or_remove(
            &mut target,
            body.seat_refs.as_ref().map(|refs| {
                AuthoritySeatRefs(refs.iter().map(|&seat| Entity::from_bits(seat)).collect())
            }),
        );
        set_or_remove(
            &mut target,
            body.doctrine.as_ref().map(|record| CompromiseDoctrine {
                quarantine_threshold: record.quarantine_threshold,
                purge_threshold: record.purge_threshold,
                preferred_response: record.preferred_response,
            }),
        );
        set_or_remove(
            &mut target,
            body.compromise.as_ref().map(|record| CompromiseState {
                is_compromised: record.is_compromised,
                suspicion: record.suspicion,
                severity: record.severity,
                source: entity(record.source),
            }),
        );
        set_or_remove(
            &mut target,
            body.integrity.as_ref().map(|record| ControllerIntegrity {
                is_compromised: record.is_compromised,
                compromised_by: entity(record.compromised_by),
            }),
        );
        set_or_remove(
            &mut target,
            body.seat.as_ref().map(|record| AuthoritySeat {
                domains: ControlDomains::from_raw(record.domains),
                rights: SeatRights::from_bits_retain(record.rights),
                is_executive: record.is_executive,
            }),
        );
        set_or_remove(
            &mut target,
            body.occupant.as_ref().map(|record| SeatOccupant {
                occupant: entity(record.occupant),
                is_acting: record.is_acting,
            }),
        );
        restored += 1;
    }
    restored
}

fn claim_from_record(record: &ClaimRecord) -> ControlClaim {
    ControlClaim {
        controller: entity(record.controller),
        source_seat: entity(record.source_seat),
        domains: ControlDomains::from_raw(record.domains),
        pressure: record.pressure,
        legitimacy: record.legitimacy,
        hostility: record.hostility,
        consent: record.consent,
        established_tick: record.established_tick,
        expire_tick: record.expire_tick,
        source_kind: record.source_kind,
    }
}

fn link_from_record(record: &LinkRecord) -> ControlLink {
    ControlLink {
        controller: entity(record.controller),
        domains: ControlDomains::from_raw(record.domains),
        pressure: record.pressure,
        legitimacy: record.legitimacy,
        hostility: record.hostility,
        consent: record.consent,
        established_tick: record.established_tick,
        source: record.source,
    }
}

/// Bounded ring of encoded checkpoints, newest last.
#[derive(Resource, Debug, Clone)]
pub struct ControlCheckpointHistory {
    capacity: usize,
    entries: VecDeque<(u64, Vec<u8>)>,
}

impl Default for ControlCheckpointHistory {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl ControlCheckpointHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, tick: u64, encoded: Vec<u8>) {
        if let Some(pos) = self.entries.iter().position(|(recorded, _)| *recorded >= tick) {
            // Re-recording after a rewind discards the abandoned future.
            self.entries.truncate(pos);
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((tick, encoded));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest_encoded(&self) -> Option<&[u8]> {
        self.entries.back().map(|(_, bytes)| bytes.as_slice())
    }

    pub fn encoded_at(&self, tick: u64) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(recorded, _)| *recorded == tick)
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn checkpoint_at(&self, tick: u64) -> Option<Result<ControlCheckpoint, CheckpointError>> {
        self.encoded_at(tick).map(decode_checkpoint)
    }
}

/// Final stage: append this tick's checkpoint when a history is installed.
pub fn record_checkpoint(
    tick: Res<SimulationTick>,
    history: Option<ResMut<ControlCheckpointHistory>>,
    bodies: Query<BodyRecordQuery, BodyRecordFilter>,
) {
    let Some(mut history) = history else {
        return;
    };
    let checkpoint = build_checkpoint(tick.0, bodies.iter());
    match encode_checkpoint(&checkpoint) {
        Ok(encoded) => history.push(tick.0, encoded),
        Err(err) => {
            tracing::warn!(
                target: "control::checkpoint",
                tick = tick.0,
                error = %err,
                "checkpoint.encode_failed"
            );
        }
    }
}
