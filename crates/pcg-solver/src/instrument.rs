//! Injectable timing and metrics collaborator.
//!
//! The engine reports phase boundaries and [`SolverEvent`]s to an
//! [`Instrument`]. Calls happen only around operator applications, reductions
//! and vector-update kernels, never inside them, so the numerical loop stays
//! identical whether it is timed or not.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::events::SolverEvent;

const PHASE_COUNT: usize = 7;

/// The engine phases an instrument can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The whole solve after input validation, up to the final report.
    Solve,
    /// Forming `r = b - A x` (includes one system-operator call).
    InitialResidual,
    /// `q = A p`.
    SystemOperator,
    /// `z = M^{-1} r`.
    Preconditioner,
    /// Dot products.
    Reduction,
    /// `p = z + beta p`.
    DirectionUpdate,
    /// `x += alpha p; r -= alpha q`.
    SolutionUpdate,
}

impl Phase {
    /// Every phase, in reporting order.
    pub const ALL: [Phase; PHASE_COUNT] = [
        Phase::Solve,
        Phase::InitialResidual,
        Phase::SystemOperator,
        Phase::Preconditioner,
        Phase::Reduction,
        Phase::DirectionUpdate,
        Phase::SolutionUpdate,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Observer of a solve. Every method defaults to a no-op.
pub trait Instrument: Send {
    /// A phase is about to begin.
    fn start(&mut self, _phase: Phase) {}

    /// The most recently started instance of `phase` ended.
    fn stop(&mut self, _phase: Phase) {}

    /// A structured event was emitted.
    fn record(&mut self, _event: &SolverEvent) {}
}

/// Instrument that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstrument;

impl Instrument for NoopInstrument {}

// ---------------------------------------------------------------------------
// PhaseTimer
// ---------------------------------------------------------------------------

/// Accumulated time and call count of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseStat {
    /// Total time spent in the phase.
    pub total: Duration,
    /// Number of completed start/stop pairs.
    pub calls: u64,
}

/// Per-phase totals reported by [`PhaseTimer`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// `(phase, stat)` for every phase, in [`Phase::ALL`] order.
    pub phases: Vec<(Phase, PhaseStat)>,
}

impl PhaseTimings {
    /// Stat for one phase.
    pub fn get(&self, phase: Phase) -> PhaseStat {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }
}

/// Instrument that accumulates wall-clock time per [`Phase`].
#[derive(Debug, Clone, Default)]
pub struct PhaseTimer {
    started: [Option<Instant>; PHASE_COUNT],
    stats: [PhaseStat; PHASE_COUNT],
}

impl PhaseTimer {
    /// A timer with all totals at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the accumulated totals.
    pub fn timings(&self) -> PhaseTimings {
        PhaseTimings {
            phases: Phase::ALL
                .iter()
                .map(|&phase| (phase, self.stats[phase.index()]))
                .collect(),
        }
    }
}

impl Instrument for PhaseTimer {
    fn start(&mut self, phase: Phase) {
        self.started[phase.index()] = Some(Instant::now());
    }

    fn stop(&mut self, phase: Phase) {
        if let Some(t0) = self.started[phase.index()].take() {
            let stat = &mut self.stats[phase.index()];
            stat.total += t0.elapsed();
            stat.calls += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Instrument that keeps every event it receives.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SolverEvent>,
}

impl EventLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events in emission order.
    pub fn events(&self) -> &[SolverEvent] {
        &self.events
    }

    /// Consume the log.
    pub fn into_events(self) -> Vec<SolverEvent> {
        self.events
    }
}

impl Instrument for EventLog {
    fn record(&mut self, event: &SolverEvent) {
        self.events.push(event.clone());
    }
}

/// Forward to two instruments, e.g. a [`PhaseTimer`] and an [`EventLog`].
impl<A: Instrument, B: Instrument> Instrument for (A, B) {
    fn start(&mut self, phase: Phase) {
        self.0.start(phase);
        self.1.start(phase);
    }

    fn stop(&mut self, phase: Phase) {
        self.0.stop(phase);
        self.1.stop(phase);
    }

    fn record(&mut self, event: &SolverEvent) {
        self.0.record(event);
        self.1.record(event);
    }
}
