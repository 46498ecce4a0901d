use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domains::ControlDomains;

/// Which producer wrote a claim. Each producer only ever replaces entries
/// carrying its own tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClaimSourceKind {
    #[default]
    Generic,
    Authority,
    HostileOverride,
}

/// One assertion that `controller` wants authority over `domains` on a body.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlClaim {
    pub controller: Option<Entity>,
    pub source_seat: Option<Entity>,
    pub domains: ControlDomains,
    pub pressure: f32,
    pub legitimacy: f32,
    pub hostility: f32,
    pub consent: f32,
    /// First tick the claim was seen. `0` means unset.
    pub established_tick: u64,
    /// `0` never expires.
    pub expire_tick: u64,
    pub source_kind: ClaimSourceKind,
}

impl ControlClaim {
    pub fn new(controller: Entity, domains: ControlDomains) -> Self {
        Self {
            controller: Some(controller),
            source_seat: None,
            domains,
            pressure: 0.0,
            legitimacy: 0.0,
            hostility: 0.0,
            consent: 0.0,
            established_tick: 0,
            expire_tick: 0,
            source_kind: ClaimSourceKind::Generic,
        }
    }

    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = pressure.max(0.0);
        self
    }

    pub fn with_legitimacy(mut self, legitimacy: f32) -> Self {
        self.legitimacy = legitimacy.clamp(0.0, 1.0);
        self
    }

    pub fn with_hostility(mut self, hostility: f32) -> Self {
        self.hostility = hostility.clamp(0.0, 1.0);
        self
    }

    pub fn with_consent(mut self, consent: f32) -> Self {
        self.consent = consent.clamp(0.0, 1.0);
        self
    }

    pub fn with_expiry(mut self, expire_tick: u64) -> Self {
        self.expire_tick = expire_tick;
        self
    }

    pub fn with_source_seat(mut self, seat: Entity) -> Self {
        self.source_seat = Some(seat);
        self
    }

    pub fn with_source_kind(mut self, kind: ClaimSourceKind) -> Self {
        self.source_kind = kind;
        self
    }

    /// Claims with no domains never become links.
    pub fn is_inert(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn is_expired(&self, tick: u64) -> bool {
        self.expire_tick != 0 && tick >= self.expire_tick
    }
}

/// Per-body claim list shared by every claim producer.
#[derive(Component, Debug, Clone, Default)]
pub struct ControlClaims(pub Vec<ControlClaim>);

impl ControlClaims {
    pub fn push(&mut self, claim: ControlClaim) {
        self.0.push(claim);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControlClaim> {
        self.0.iter()
    }

    pub fn of_kind(&self, kind: ClaimSourceKind) -> impl Iterator<Item = &ControlClaim> {
        self.0.iter().filter(move |claim| claim.source_kind == kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How a link entered a body's link list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkSource {
    /// Rebuilt from a surviving claim every tick by the claim bridge.
    #[default]
    Claim,
    /// Placed by a host system; the claim bridge never touches these.
    External,
}

/// Materialised, still-valid form of a claim as seen by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlLink {
    pub controller: Option<Entity>,
    pub domains: ControlDomains,
    pub pressure: f32,
    pub legitimacy: f32,
    pub hostility: f32,
    pub consent: f32,
    pub established_tick: u64,
    pub source: LinkSource,
}

impl ControlLink {
    pub fn from_claim(claim: &ControlClaim) -> Self {
        Self {
            controller: claim.controller,
            domains: claim.domains,
            pressure: claim.pressure,
            legitimacy: claim.legitimacy,
            hostility: claim.hostility,
            consent: claim.consent,
            established_tick: claim.established_tick,
            source: LinkSource::Claim,
        }
    }
}

#[derive(Component, Debug, Clone, Default)]
pub struct ControlLinks(pub Vec<ControlLink>);

impl ControlLinks {
    pub fn iter(&self) -> impl Iterator<Item = &ControlLink> {
        self.0.iter()
    }

    /// Bitwise union of every link's domains.
    pub fn domain_union(&self) -> ControlDomains {
        self.0
            .iter()
            .fold(ControlDomains::empty(), |mask, link| mask | link.domains)
    }
}

/// Winner of one domain for the current tick. `controller == None` means the
/// domain is contested but ungoverned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedControlEntry {
    pub domain: ControlDomains,
    pub controller: Option<Entity>,
    pub score: f32,
}

#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ResolvedControl(pub Vec<ResolvedControlEntry>);

impl ResolvedControl {
    pub fn entry(&self, domain: ControlDomains) -> Option<&ResolvedControlEntry> {
        self.0.iter().find(|entry| entry.domain == domain)
    }

    /// Controller currently holding `domain`, if any.
    pub fn controller_for(&self, domain: ControlDomains) -> Option<Entity> {
        self.entry(domain).and_then(|entry| entry.controller)
    }

    pub fn entries(&self) -> &[ResolvedControlEntry] {
        &self.0
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// How hard a body resists being controlled.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfGovernance {
    pub base_resistance: f32,
    pub self_need_urgency: f32,
    pub domination_affinity: f32,
}

impl Default for SelfGovernance {
    fn default() -> Self {
        Self {
            base_resistance: 1.0,
            self_need_urgency: 1.0,
            domination_affinity: 0.0,
        }
    }
}

/// Named preset to expand into [`SelfGovernance`] on first sight.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct SelfGovernancePreset(pub String);

impl SelfGovernancePreset {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Present once a body has had live claims and carries arbitration scaffolding.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ArbitrationEnabled;

/// Liveness record for a body's relationship with its controller.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct ControlLinkState {
    pub controller: Option<Entity>,
    pub comms_quality: f32,
    /// `0` means no heartbeat has ever arrived.
    pub last_heartbeat_tick: u64,
    pub is_lost: bool,
    pub is_compromised: bool,
    pub compromise_source: Option<Entity>,
}

impl ControlLinkState {
    pub fn new(controller: Entity) -> Self {
        Self {
            controller: Some(controller),
            comms_quality: 1.0,
            last_heartbeat_tick: 0,
            is_lost: false,
            is_compromised: false,
            compromise_source: None,
        }
    }

    pub fn with_comms_quality(mut self, quality: f32) -> Self {
        self.comms_quality = quality.clamp(0.0, 1.0);
        self
    }

    pub fn with_heartbeat(mut self, tick: u64) -> Self {
        self.last_heartbeat_tick = tick;
        self
    }

    /// True when a heartbeat has been seen and `tick` is more than `timeout`
    /// ticks past it.
    pub fn heartbeat_stale(&self, tick: u64, timeout: u64) -> bool {
        self.last_heartbeat_tick != 0 && tick.saturating_sub(self.last_heartbeat_tick) > timeout
    }
}

/// Standing directive kinds. Hosts interpret these; the kernel only compares
/// and swaps them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderKind {
    Idle,
    #[default]
    Hold,
    Move,
    Patrol,
    Engage,
    ReturnToBase,
}

/// The directive currently given to a controlled body.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct ControlOrderState {
    pub kind: OrderKind,
    pub fallback_kind: OrderKind,
    pub issued_tick: u64,
    pub last_updated_tick: u64,
    pub sequence: u32,
    pub requires_heartbeat: bool,
    /// `0` never expires.
    pub expiry_tick: u64,
}

impl ControlOrderState {
    pub fn new(kind: OrderKind, fallback_kind: OrderKind) -> Self {
        Self {
            kind,
            fallback_kind,
            issued_tick: 0,
            last_updated_tick: 0,
            sequence: 0,
            requires_heartbeat: false,
            expiry_tick: 0,
        }
    }

    pub fn requiring_heartbeat(mut self) -> Self {
        self.requires_heartbeat = true;
        self
    }

    /// Replace the standing directive.
    pub fn issue(&mut self, kind: OrderKind, tick: u64, expiry_tick: u64) {
        self.kind = kind;
        self.sequence = self.sequence.wrapping_add(1);
        self.issued_tick = tick;
        self.last_updated_tick = tick;
        self.expiry_tick = expiry_tick;
    }

    /// Record controller activity on the current directive.
    pub fn touch(&mut self, tick: u64) {
        self.last_updated_tick = self.last_updated_tick.max(tick);
    }

    pub fn is_expired(&self, tick: u64) -> bool {
        self.expiry_tick != 0 && tick >= self.expiry_tick
    }

    pub fn revert_to_fallback(&mut self, tick: u64) {
        self.issue(self.fallback_kind, tick, 0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RogueToolReason {
    LostControl,
    HostileOverride,
}

/// Terminal marker: the body is no longer reliably controlled. Never removed
/// by this crate.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct RogueTool {
    pub reason: RogueToolReason,
    pub since_tick: u64,
    pub allow_friendly_destruction_no_penalty: bool,
    pub hackable: bool,
}
