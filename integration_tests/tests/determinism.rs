mod common;

use anyhow::{ensure, Context, Result};
use control_core::{ArbitrationMetrics, ControlCheckpointHistory};

fn recorded_run(ticks: u64) -> Result<(Vec<Vec<u8>>, ArbitrationMetrics)> {
    let mut scenario = common::scenario();
    common::run_until(&mut scenario, 1, ticks);

    let history = scenario.app.world.resource::<ControlCheckpointHistory>();
    let encoded = (1..=ticks)
        .map(|tick| {
            history
                .encoded_at(tick)
                .map(<[u8]>::to_vec)
                .with_context(|| format!("no checkpoint recorded for tick {tick}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let metrics = scenario.app.world.resource::<ArbitrationMetrics>().clone();
    Ok((encoded, metrics))
}

#[test]
fn two_runs_record_byte_identical_checkpoints() -> Result<()> {
    let (run_a, metrics_a) = recorded_run(240)?;
    let (run_b, metrics_b) = recorded_run(240)?;

    for (index, (a, b)) in run_a.iter().zip(&run_b).enumerate() {
        ensure!(a == b, "checkpoints diverged at tick {}", index + 1);
    }
    assert_eq!(metrics_a, metrics_b);
    assert_eq!(metrics_a.passes, 240);
    Ok(())
}

#[test]
fn scripted_run_reaches_expected_terminal_state() -> Result<()> {
    let mut scenario = common::scenario();
    common::run_until(&mut scenario, 1, 240);

    let metrics = scenario.app.world.resource::<ArbitrationMetrics>();
    ensure!(metrics.bodies_arbitrated == 3, "all bodies scaffolded");
    ensure!(metrics.links_lost == 3, "silent, compromised commander loses every link");
    ensure!(metrics.links_compromised == 3, "compromise mirrored onto every link");
    ensure!(metrics.rogue_tools == 3, "every body ends as a rogue tool");
    ensure!(metrics.orders_reverted_total >= 3, "expired patrols fall back");
    Ok(())
}
