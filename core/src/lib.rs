//! `dtn-trace-core` — trace store and point-in-time replay for DTN
//! simulation runs.
//!
//! The simulator writes one run's history into a [`TraceStore`]. Analysis
//! code then asks a [`TemporalQuery`] what the network looked like at an
//! instant, or drives a [`ReplayDriver`] that steps through the run and hands
//! each [`Snapshot`] to a [`FrameSink`].

pub mod bundle;
pub mod clock;
pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod event;
pub mod query;
pub mod replay;
pub mod run;
pub mod snapshot;
pub mod store;
pub mod types;

pub use bundle::{Bundle, BundleTransmission, NewBundle, NewStoredBundle, PossessionPolicy, StoredBundleCopy};
pub use clock::ReplayClock;
pub use config::{EnvConfig, RunConfiguration};
pub use connection::{ChannelRole, ConnectionInterval, EndpointTimeline};
pub use device::{Device, NewDevice, Position};
pub use error::{TraceError, TraceResult};
pub use event::{NewEvent, TraceEvent};
pub use query::{QueryOptions, TemporalQuery};
pub use replay::{FrameSink, ReplayDriver};
pub use run::{NewRun, Run, RunStatus};
pub use snapshot::Snapshot;
pub use store::TraceStore;
