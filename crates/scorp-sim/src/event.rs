use std::cmp::Ordering;

use scorp_core::{Message, NodeId};

/// A scheduled input to the world: the mobility layer's contact windows and
/// the workload's message creations.
#[derive(Clone, Debug)]
pub enum Event {
    ContactUp { a: NodeId, b: NodeId },
    ContactDown { a: NodeId, b: NodeId },
    CreateMessage { node: NodeId, message: Message },
}

/// An event with its fire time and a monotone sequence number, so that
/// same-time events pop in the order they were scheduled.
#[derive(Clone, Debug)]
pub struct ScheduledEvent {
    pub time: f64,
    pub seq: u64,
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(time: f64, seq: u64, event: Event) -> Self {
        Self { time, seq, event }
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time.to_bits() == other.time.to_bits() && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

// Reversed ordering: BinaryHeap is a max-heap, we pop earliest first.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
