use bevy::prelude::*;

/// Tick supplied by the host clock. The kernel reads it but never advances it.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationTick(pub u64);

/// Record/replay mode reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplayMode {
    #[default]
    Record,
    Rewind,
    Playback,
}

/// Pause and replay state of the host simulation.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationClock {
    pub paused: bool,
    pub mode: ReplayMode,
}

impl SimulationClock {
    pub fn is_recording(&self) -> bool {
        !self.paused && self.mode == ReplayMode::Record
    }
}

/// Run condition shared by every arbitration stage. A missing clock counts as
/// running forward.
pub fn arbitration_active(clock: Option<Res<SimulationClock>>) -> bool {
    clock.map_or(true, |clock| clock.is_recording())
}
