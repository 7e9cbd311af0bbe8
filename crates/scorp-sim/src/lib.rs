//! Deterministic step-driven host environment for the scorp policy core.
//!
//! Provides what the policy treats as external collaborators: per-node
//! routers with their connection lifecycle state machines, the contact and
//! message-creation event schedule, a naive one-transfer-per-node scheduler,
//! scenario files, and summary reports. The policy crate stays pure; this
//! crate owns all the moving parts around it.

pub mod buffer;
pub mod connection;
pub mod error;
pub mod event;
pub mod report;
pub mod router;
pub mod scenario;
pub mod world;

pub use buffer::MessageBuffer;
pub use connection::{Connection, ConnectionId, Transfer};
pub use error::{Result, SimError};
pub use event::{Event, ScheduledEvent};
pub use report::{CensusEntry, InterestCensus, SimMetrics, interest_census};
pub use router::{ReceiveOutcome, ReceiveVerdict, Router, RouterConfig};
pub use scenario::{ClockConfig, ContactDecl, MessageDecl, NodeDecl, Scenario, SimConfig};
pub use world::World;
