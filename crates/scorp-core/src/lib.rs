//! Social-weight forwarding policy for opportunistic (DTN) networks.
//!
//! Mobile nodes exchange messages only during pairwise contact windows, with
//! no end-to-end path guaranteed. The policy decides, per node and per
//! contact, whether to forward, retain, or discard a message based on a
//! recency-weighted measure of how much time the node historically spends in
//! contact with peers interested in the message's topic.
//!
//! Zero I/O: pure state machines with no opinions about transport or
//! scheduling. The host environment drives clock ticks and connection
//! lifecycle events and owns the shared weight registry.

pub mod clock;
pub mod constants;
pub mod contact;
pub mod message;
pub mod node;
pub mod policy;
pub mod topic;
pub mod weights;

pub use clock::{ScheduleError, SlotClock, SlotCrossing};
pub use constants::{SECONDS_PER_DAY, TTL_CHECK_INTERVAL};
pub use contact::ContactTracker;
pub use message::{Message, MessageId};
pub use node::NodeId;
pub use policy::{DecisionEngine, NodeView, Scorp};
pub use topic::{InterestSet, Topic};
pub use weights::{WeightAggregator, WeightRegistry, WeightVector};
