//! Per-domain pressure-versus-resistance contest.
//!
//! For every domain bit touched by a body's links the resolver scores each
//! candidate link:
//!
//! ```text
//! pressure   = max(0, P) * (1 + sat(legitimacy))
//! resistance = (max(0, base) + max(0, urgency) * sat(hostility))
//!              * (1 - sat(consent)) * (1 - sat(affinity))
//! score      = pressure - resistance
//! ```
//!
//! The first link with the strictly highest score wins the domain; it only
//! takes control when that score is positive.

use bevy::prelude::*;

use crate::{
    components::{
        ArbitrationEnabled, ControlLink, ControlLinks, ResolvedControl, ResolvedControlEntry,
        SelfGovernance,
    },
    domains::ControlDomains,
};

#[inline]
fn saturate(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

pub fn control_pressure(link: &ControlLink) -> f32 {
    link.pressure.max(0.0) * (1.0 + saturate(link.legitimacy))
}

pub fn control_resistance(governance: &SelfGovernance, link: &ControlLink) -> f32 {
    (governance.base_resistance.max(0.0)
        + governance.self_need_urgency.max(0.0) * saturate(link.hostility))
        * (1.0 - saturate(link.consent))
        * (1.0 - saturate(governance.domination_affinity))
}

pub fn control_score(governance: &SelfGovernance, link: &ControlLink) -> f32 {
    control_pressure(link) - control_resistance(governance, link)
}

/// Write one entry per domain bit present in `links` into `out`, lowest bit first.
pub fn resolve_domains(
    governance: &SelfGovernance,
    links: &[ControlLink],
    out: &mut Vec<ResolvedControlEntry>,
) {
    out.clear();
    let union = links
        .iter()
        .fold(ControlDomains::empty(), |mask, link| mask | link.domains);

    for domain in union.single_bits() {
        let mut best: Option<(f32, Option<Entity>)> = None;
        for link in links.iter().filter(|link| link.domains.contains(domain)) {
            let score = control_score(governance, link);
            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, link.controller)),
            }
        }

        if let Some((score, controller)) = best {
            out.push(ResolvedControlEntry {
                domain,
                controller: if score > 0.0 { controller } else { None },
                score,
            });
        }
    }
}

/// Stage 4: resolve the controller of every contested domain on every
/// scaffolded body.
pub fn resolve_control(
    mut bodies: Query<
        (Entity, &SelfGovernance, &ControlLinks, &mut ResolvedControl),
        With<ArbitrationEnabled>,
    >,
) {
    for (entity, governance, links, mut resolved) in bodies.iter_mut() {
        let previous = std::mem::take(&mut resolved.0);
        let mut entries = Vec::with_capacity(previous.len());
        resolve_domains(governance, &links.0, &mut entries);

        for entry in &entries {
            let before = previous
                .iter()
                .find(|old| old.domain == entry.domain)
                .and_then(|old| old.controller);
            if before != entry.controller {
                tracing::debug!(
                    target: "control::resolver",
                    entity = ?entity,
                    domain = entry.domain.bits(),
                    from = ?before,
                    to = ?entry.controller,
                    score = entry.score,
                    "resolver.controller_changed"
                );
            }
        }

        resolved.0 = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ControlClaim, LinkSource};

    fn link(controller: u32, domains: ControlDomains, pressure: f32) -> ControlLink {
        ControlLink::from_claim(
            &ControlClaim::new(Entity::from_raw(controller), domains).with_pressure(pressure),
        )
    }

    #[test]
    fn scenario_a_scores() {
        let governance = SelfGovernance {
            base_resistance: 2.0,
            self_need_urgency: 5.0,
            domination_affinity: 0.0,
        };
        let x = ControlLink {
            legitimacy: 0.5,
            consent: 0.8,
            ..link(1, ControlDomains::MOVEMENT, 10.0)
        };
        let y = ControlLink {
            legitimacy: 1.0,
            hostility: 0.9,
            ..link(2, ControlDomains::MOVEMENT, 6.0)
        };

        assert!((control_score(&governance, &x) - 14.6).abs() < 1e-4);
        assert!((control_score(&governance, &y) - 5.5).abs() < 1e-4);

        let mut out = Vec::new();
        resolve_domains(&governance, &[x, y], &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].controller, Some(Entity::from_raw(1)));
    }

    #[test]
    fn one_entry_per_touched_domain() {
        let governance = SelfGovernance::default();
        let links = vec![
            link(1, ControlDomains::MOVEMENT | ControlDomains::WEAPONS, 5.0),
            link(2, ControlDomains::WEAPONS, 9.0),
            link(3, ControlDomains::from_raw(1 << 12), 4.0),
        ];
        let mut out = Vec::new();
        resolve_domains(&governance, &links, &mut out);

        let domains: Vec<u32> = out.iter().map(|entry| entry.domain.bits()).collect();
        assert_eq!(domains, vec![1, 2, 1 << 12]);
        assert_eq!(out[0].controller, Some(Entity::from_raw(1)));
        assert_eq!(out[1].controller, Some(Entity::from_raw(2)));
    }

    #[test]
    fn ties_keep_the_earlier_link() {
        let governance = SelfGovernance::default();
        let links = vec![
            link(7, ControlDomains::SENSORS, 4.0),
            link(8, ControlDomains::SENSORS, 4.0),
        ];
        let mut out = Vec::new();
        resolve_domains(&governance, &links, &mut out);
        assert_eq!(out[0].controller, Some(Entity::from_raw(7)));
    }

    #[test]
    fn non_positive_best_leaves_domain_ungoverned() {
        let governance = SelfGovernance {
            base_resistance: 10.0,
            ..SelfGovernance::default()
        };
        let links = vec![link(1, ControlDomains::MOVEMENT, 2.0)];
        let mut out = Vec::new();
        resolve_domains(&governance, &links, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].controller, None);
        assert!(out[0].score < 0.0);

        let exact = SelfGovernance {
            base_resistance: 2.0,
            self_need_urgency: 0.0,
            domination_affinity: 0.0,
        };
        resolve_domains(&exact, &[link(1, ControlDomains::MOVEMENT, 2.0)], &mut out);
        assert_eq!(out[0].score, 0.0);
        assert_eq!(out[0].controller, None, "zero score does not govern");
    }

    #[test]
    fn full_affinity_removes_resistance() {
        let governance = SelfGovernance {
            base_resistance: 50.0,
            self_need_urgency: 50.0,
            domination_affinity: 1.0,
        };
        let hostile = ControlLink {
            hostility: 1.0,
            source: LinkSource::External,
            ..link(4, ControlDomains::BEHAVIOR, 0.5)
        };
        assert!((control_score(&governance, &hostile) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_inputs_are_saturated() {
        let governance = SelfGovernance {
            base_resistance: -3.0,
            self_need_urgency: -1.0,
            domination_affinity: -2.0,
        };
        let wild = ControlLink {
            pressure: -5.0,
            legitimacy: 4.0,
            consent: -1.0,
            ..link(1, ControlDomains::MOVEMENT, 0.0)
        };
        assert_eq!(control_pressure(&wild), 0.0);
        assert_eq!(control_resistance(&governance, &wild), 0.0);
    }
}
