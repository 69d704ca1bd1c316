//! The replay driver — steps through a run one snapshot at a time.
//!
//! RULES:
//!   - Every transition (advance, retreat, seek) renders exactly once.
//!   - Rendering is synchronous; the next transition cannot start until
//!     the sink has returned.
//!   - The driver never writes to the store.

use crate::{
    clock::ReplayClock,
    error::TraceResult,
    query::TemporalQuery,
    snapshot::Snapshot,
    types::BundleId,
};

/// The rendering collaborator. Receives one frame per transition.
pub trait FrameSink {
    fn render(&mut self, frame: &Snapshot) -> TraceResult<()>;
}

/// Sinks that only need the frame can be closures.
impl<F> FrameSink for F
where
    F: FnMut(&Snapshot) -> TraceResult<()>,
{
    fn render(&mut self, frame: &Snapshot) -> TraceResult<()> {
        self(frame)
    }
}

pub struct ReplayDriver<'s, S: FrameSink> {
    query:  TemporalQuery<'s>,
    clock:  ReplayClock,
    bundle: BundleId,
    sink:   S,
}

impl<'s, S: FrameSink> ReplayDriver<'s, S> {
    /// A driver at time 0, tracking possession of `bundle`.
    /// The clock range is the run's simulated duration in seconds.
    pub fn new(query: TemporalQuery<'s>, bundle: BundleId, sink: S) -> Self {
        let clock = ReplayClock::new(query.run().simulation_time_seconds());
        Self { query, clock, bundle, sink }
    }

    pub fn clock(&self) -> &ReplayClock {
        &self.clock
    }

    pub fn query(&self) -> &TemporalQuery<'s> {
        &self.query
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Render the current time without moving the clock.
    pub fn render_current(&mut self) -> TraceResult<Snapshot> {
        let us = self.clock.current_us();
        let frame = self.query.snapshot_at(us, self.bundle)?;
        self.sink.render(&frame)?;
        Ok(frame)
    }

    pub fn advance(&mut self) -> TraceResult<Snapshot> {
        let t = self.clock.advance();
        log::debug!("Replay advanced to {t}s");
        self.render_current()
    }

    pub fn retreat(&mut self) -> TraceResult<Snapshot> {
        let t = self.clock.retreat();
        log::debug!("Replay retreated to {t}s");
        self.render_current()
    }

    pub fn seek(&mut self, t: f64) -> TraceResult<Snapshot> {
        let t = self.clock.seek(t);
        log::debug!("Replay seeked to {t}s");
        self.render_current()
    }
}
