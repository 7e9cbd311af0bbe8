use std::collections::BTreeMap;

use crate::node::NodeId;
use crate::topic::{InterestSet, Topic};

/// Times contact with the topics of currently-connected peers and
/// accumulates finished contact durations for the current day.
///
/// One tracker per node. The per-peer start stamps are re-armed on every
/// slot-boundary sample so that duration is never double-counted across a
/// sample point.
#[derive(Clone, Debug, Default)]
pub struct ContactTracker {
    /// Peer -> topic -> sim time contact with that topic began.
    encounter_start: BTreeMap<NodeId, BTreeMap<Topic, f64>>,
    /// Topic -> cumulative seconds of contact during the current day.
    todays_duration: BTreeMap<Topic, f64>,
}

impl ContactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing contact with `peer`'s topics. Topics already being
    /// timed for this peer keep their original start stamp.
    pub fn connection_up(&mut self, peer: NodeId, interests: &InterestSet, now: f64) {
        let record = self.encounter_start.entry(peer).or_default();
        for topic in interests {
            record.entry(topic.clone()).or_insert(now);
        }
    }

    /// Commit the elapsed contact time with `peer` into today's totals and
    /// forget the encounter entirely.
    pub fn connection_down(&mut self, peer: NodeId, now: f64) {
        if let Some(record) = self.encounter_start.remove(&peer) {
            for (topic, started) in record {
                *self.todays_duration.entry(topic).or_insert(0.0) += now - started;
            }
        }
    }

    /// Slot-boundary sample: commit elapsed time for every still-connected
    /// peer and re-arm the timers at `now`.
    ///
    /// A node with no active connections leaves today's totals untouched;
    /// durations already committed by earlier disconnects persist until the
    /// fold consumes them.
    pub fn sample(&mut self, now: f64) {
        for record in self.encounter_start.values_mut() {
            for (topic, started) in record.iter_mut() {
                *self.todays_duration.entry(topic.clone()).or_insert(0.0) += now - *started;
                *started = now;
            }
        }
    }

    /// Take today's accumulated per-topic contact time, leaving the
    /// accumulator empty for the next slot.
    pub fn take_todays(&mut self) -> BTreeMap<Topic, f64> {
        std::mem::take(&mut self.todays_duration)
    }

    /// Today's accumulated per-topic contact time so far.
    pub fn todays(&self) -> &BTreeMap<Topic, f64> {
        &self.todays_duration
    }

    /// Whether contact with `peer` is currently being timed.
    pub fn is_tracking(&self, peer: NodeId) -> bool {
        self.encounter_start.contains_key(&peer)
    }
}
