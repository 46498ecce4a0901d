use bevy::prelude::*;
use control_core::{
    resolver::{control_score, resolve_domains},
    ControlClaim, ControlDomains, ControlLink, SelfGovernance,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};

const CASES: usize = 512;

fn random_governance(rng: &mut SmallRng) -> SelfGovernance {
    SelfGovernance {
        base_resistance: rng.gen_range(0.0..6.0),
        self_need_urgency: rng.gen_range(0.0..10.0),
        domination_affinity: rng.gen_range(0.0..1.0),
    }
}

fn random_link(rng: &mut SmallRng, controller: u32) -> ControlLink {
    let claim = ControlClaim::new(
        Entity::from_raw(controller),
        ControlDomains::from_raw(rng.gen_range(1..=0xFF)),
    )
    .with_pressure(rng.gen_range(0.0..20.0))
    .with_legitimacy(rng.gen_range(0.0..1.0))
    .with_hostility(rng.gen_range(0.0..1.0))
    .with_consent(rng.gen_range(0.0..1.0));
    ControlLink::from_claim(&claim)
}

#[test]
fn score_rises_with_pressure_and_never_falls_with_legitimacy_or_consent() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_0001);
    for _ in 0..CASES {
        let governance = random_governance(&mut rng);
        let link = random_link(&mut rng, 1);
        let base = control_score(&governance, &link);

        let mut pushed = link.clone();
        pushed.pressure += rng.gen_range(0.01..5.0);
        assert!(control_score(&governance, &pushed) > base);

        let mut legitimate = link.clone();
        legitimate.legitimacy = (legitimate.legitimacy + rng.gen_range(0.0..1.0)).min(1.0);
        assert!(control_score(&governance, &legitimate) >= base);

        let mut consenting = link.clone();
        consenting.consent = (consenting.consent + rng.gen_range(0.0..1.0)).min(1.0);
        assert!(control_score(&governance, &consenting) >= base - 1e-5);
    }
}

#[test]
fn score_never_increases_with_hostility_or_resistance() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_0002);
    for _ in 0..CASES {
        let governance = random_governance(&mut rng);
        let link = random_link(&mut rng, 1);
        let base = control_score(&governance, &link);

        let mut hostile = link.clone();
        hostile.hostility = (hostile.hostility + rng.gen_range(0.0..1.0)).min(1.0);
        assert!(control_score(&governance, &hostile) <= base + 1e-5);

        let stubborn = SelfGovernance {
            base_resistance: governance.base_resistance + rng.gen_range(0.0..3.0),
            ..governance
        };
        assert!(control_score(&stubborn, &link) <= base + 1e-5);
    }
}

#[test]
fn strengthening_the_winner_keeps_it_winning() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_0003);
    let mut entries = Vec::new();
    for _ in 0..CASES {
        let governance = random_governance(&mut rng);
        let count = rng.gen_range(1..6);
        let mut links: Vec<ControlLink> =
            (0..count).map(|index| random_link(&mut rng, index + 1)).collect();

        resolve_domains(&governance, &links, &mut entries);
        let Some(winner) = entries.iter().find(|entry| entry.controller.is_some()).copied() else {
            continue;
        };

        for link in links
            .iter_mut()
            .filter(|link| link.controller == winner.controller && link.domains.contains(winner.domain))
        {
            link.pressure += rng.gen_range(0.0..5.0);
        }
        resolve_domains(&governance, &links, &mut entries);

        let after = entries
            .iter()
            .find(|entry| entry.domain == winner.domain)
            .expect("domain still contested");
        assert_eq!(after.controller, winner.controller);
        assert!(after.score >= winner.score);
    }
}

#[test]
fn identical_inputs_resolve_identically_and_ties_keep_first() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_0004);
    let (mut first, mut second) = (Vec::new(), Vec::new());
    for _ in 0..CASES {
        let governance = random_governance(&mut rng);
        let count = rng.gen_range(1..8);
        let links: Vec<ControlLink> =
            (0..count).map(|index| random_link(&mut rng, index + 1)).collect();

        resolve_domains(&governance, &links, &mut first);
        resolve_domains(&governance, &links, &mut second);
        assert_eq!(first, second);

        let mut twin = links[0].clone();
        twin.controller = Some(Entity::from_raw(999));
        let mut tied = links.clone();
        tied.push(twin);
        resolve_domains(&governance, &tied, &mut second);
        for entry in second.iter().filter(|entry| entry.controller.is_some()) {
            assert_ne!(entry.controller, Some(Entity::from_raw(999)));
        }
    }
}

#[test]
fn entries_cover_exactly_the_union_of_link_domains() {
    let mut rng = SmallRng::seed_from_u64(0x5eed_0005);
    let mut entries = Vec::new();
    for _ in 0..CASES {
        let governance = random_governance(&mut rng);
        let count = rng.gen_range(0..6);
        let links: Vec<ControlLink> =
            (0..count).map(|index| random_link(&mut rng, index + 1)).collect();
        let union = links
            .iter()
            .fold(ControlDomains::empty(), |mask, link| mask | link.domains);

        resolve_domains(&governance, &links, &mut entries);

        assert_eq!(entries.len(), union.bits().count_ones() as usize);
        let covered = entries
            .iter()
            .fold(ControlDomains::empty(), |mask, entry| mask | entry.domain);
        assert_eq!(covered, union);
        assert!(entries.iter().all(|entry| entry.domain.is_single_bit()));
    }
}
