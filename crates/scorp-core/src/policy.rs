use crate::clock::SlotCrossing;
use crate::contact::ContactTracker;
use crate::message::Message;
use crate::node::NodeId;
use crate::topic::InterestSet;
use crate::weights::{WeightAggregator, WeightRegistry};

/// One endpoint of a contact as seen by a forwarding decision: its identity
/// and its declared interests.
#[derive(Clone, Copy, Debug)]
pub struct NodeView<'a> {
    pub id: NodeId,
    pub interests: &'a InterestSet,
}

/// The decision surface a router consults at every lifecycle point.
///
/// Implementations own their per-node accumulators; only the published
/// weight registry is shared between nodes, and the environment passes it
/// in by reference; a decision engine never reaches into a peer's
/// concrete state.
pub trait DecisionEngine {
    /// Whether a locally created message should enter the buffer and be
    /// routed at all.
    fn accept_new_message(&mut self, msg: &Message) -> bool;

    /// Whether `node` is a final destination for `msg`.
    fn is_final_destination(&self, msg: &Message, node: NodeView<'_>) -> bool;

    /// Whether a received message should be stored for further forwarding.
    fn should_store_received(
        &self,
        msg: &Message,
        node: NodeView<'_>,
        weights: &WeightRegistry,
    ) -> bool;

    /// Whether to queue a forward attempt for `msg` from `this_node` to
    /// `other`. `peer_holds` reports whether the peer already buffers a
    /// message with the same id.
    fn should_forward(
        &self,
        msg: &Message,
        this_node: NodeView<'_>,
        other: NodeView<'_>,
        peer_holds: bool,
        weights: &WeightRegistry,
    ) -> bool;

    /// Whether to drop the local copy once `msg` has been handed to `other`.
    fn should_delete_after_send(
        &self,
        msg: &Message,
        this_node: NodeView<'_>,
        other: NodeView<'_>,
        weights: &WeightRegistry,
    ) -> bool;

    /// Whether a peer's "already seen this" report alone justifies deleting
    /// the local copy.
    fn should_delete_on_stale_report(&self, msg: &Message, reporter: NodeId) -> bool;

    /// Contact with `peer` began.
    fn connection_up(&mut self, peer: NodeId, peer_interests: &InterestSet, now: f64);

    /// Contact with `peer` ended.
    fn connection_down(&mut self, peer: NodeId, now: f64);

    /// One-time pairwise handshake when a connection first comes up. Runs on
    /// the initiating side only; the router guarantees it is never invoked
    /// twice for the same connection.
    fn exchange_for_new_connection(&mut self, peer: NodeId, now: f64);

    /// Slot-boundary sample: commit running contact time, fold it into
    /// history, and publish a fresh weight vector for `node`.
    fn slot_sample(
        &mut self,
        node: NodeId,
        crossing: SlotCrossing,
        now: f64,
        weights: &mut WeightRegistry,
    );

    /// A fresh engine with empty history, for attaching to a new node.
    fn replicate(&self) -> Box<dyn DecisionEngine>;
}

/// Social-aware content-based forwarding.
///
/// A message flows toward the endpoint whose recency-weighted history of
/// contact with the message's topic is stronger, and is handed directly to
/// any peer that declares the topic as an interest. Storage and retention
/// follow the same weights: a node keeps what it is interested in or has
/// measurable affinity for, and shedding a copy after a send is only
/// allowed once both of those are gone.
pub struct Scorp {
    tracker: ContactTracker,
    aggregator: WeightAggregator,
}

impl Scorp {
    pub fn new(slot_count: usize) -> Self {
        Self {
            tracker: ContactTracker::new(),
            aggregator: WeightAggregator::new(slot_count),
        }
    }

    /// The tracker, for inspection in tests.
    pub fn tracker(&self) -> &ContactTracker {
        &self.tracker
    }
}

impl DecisionEngine for Scorp {
    fn accept_new_message(&mut self, _msg: &Message) -> bool {
        // locally created messages are always kept and routed
        true
    }

    fn is_final_destination(&self, msg: &Message, node: NodeView<'_>) -> bool {
        node.interests.contains(&msg.topic)
    }

    fn should_store_received(
        &self,
        msg: &Message,
        node: NodeView<'_>,
        weights: &WeightRegistry,
    ) -> bool {
        // own interest justifies storage even at zero measured weight
        weights.weight(node.id, &msg.topic) > 0.0 || node.interests.contains(&msg.topic)
    }

    fn should_forward(
        &self,
        msg: &Message,
        this_node: NodeView<'_>,
        other: NodeView<'_>,
        peer_holds: bool,
        weights: &WeightRegistry,
    ) -> bool {
        if peer_holds {
            return false;
        }
        if other.interests.contains(&msg.topic) {
            // trivial final-hop delivery
            return true;
        }
        if weights.has_vector(this_node.id) || weights.has_vector(other.id) {
            // strictly greater: a tie keeps the message where it is
            return weights.weight(other.id, &msg.topic) > weights.weight(this_node.id, &msg.topic);
        }
        false
    }

    fn should_delete_after_send(
        &self,
        msg: &Message,
        this_node: NodeView<'_>,
        _other: NodeView<'_>,
        weights: &WeightRegistry,
    ) -> bool {
        !this_node.interests.contains(&msg.topic)
            && weights.weight(this_node.id, &msg.topic) == 0.0
    }

    fn should_delete_on_stale_report(&self, _msg: &Message, _reporter: NodeId) -> bool {
        // stale-report deletion is governed entirely by the environment's
        // tombstone / delete-delivered configuration
        false
    }

    fn connection_up(&mut self, peer: NodeId, peer_interests: &InterestSet, now: f64) {
        self.tracker.connection_up(peer, peer_interests, now);
    }

    fn connection_down(&mut self, peer: NodeId, now: f64) {
        self.tracker.connection_down(peer, now);
    }

    fn exchange_for_new_connection(&mut self, _peer: NodeId, _now: f64) {
        // Scorp trades no pairwise state beyond what connection_up records;
        // the hook exists for engines that do.
    }

    fn slot_sample(
        &mut self,
        node: NodeId,
        crossing: SlotCrossing,
        now: f64,
        weights: &mut WeightRegistry,
    ) {
        self.tracker.sample(now);
        let todays = self.tracker.take_todays();
        let vector = self.aggregator.fold(crossing.day, crossing.slot, &todays);
        weights.publish(node, vector);
    }

    fn replicate(&self) -> Box<dyn DecisionEngine> {
        Box::new(Scorp::new(self.aggregator.slot_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::{Topic, interests};
    use std::collections::BTreeMap;

    const A: NodeId = NodeId(0);
    const B: NodeId = NodeId(1);

    fn msg(topic: &str) -> Message {
        Message::new("M1", topic, 0.0, 100)
    }

    fn publish(weights: &mut WeightRegistry, node: NodeId, entries: &[(&str, f64)]) {
        let mut agg = WeightAggregator::new(1);
        let todays: BTreeMap<Topic, f64> =
            entries.iter().map(|(t, w)| (Topic::from(*t), *w)).collect();
        weights.publish(node, agg.fold(1, 0, &todays));
    }

    #[test]
    fn test_new_messages_always_accepted() {
        let mut scorp = Scorp::new(3);
        assert!(scorp.accept_new_message(&msg("anything")));
    }

    #[test]
    fn test_final_destination_by_interest() {
        let scorp = Scorp::new(3);
        let set = interests(["news"]);
        let view = NodeView { id: A, interests: &set };
        assert!(scorp.is_final_destination(&msg("news"), view));
        assert!(!scorp.is_final_destination(&msg("sports"), view));
    }

    #[test]
    fn test_forward_toward_higher_weight() {
        // neither endpoint is interested; B's measured affinity wins
        let scorp = Scorp::new(1);
        let mut weights = WeightRegistry::new();
        publish(&mut weights, A, &[("sports", 5.0)]);
        publish(&mut weights, B, &[("sports", 9.0)]);

        let none = InterestSet::new();
        let a = NodeView { id: A, interests: &none };
        let b = NodeView { id: B, interests: &none };
        let m = msg("sports");

        assert!(scorp.should_forward(&m, a, b, false, &weights));
        assert!(!scorp.should_forward(&m, b, a, false, &weights));
    }

    #[test]
    fn test_equal_weights_forward_neither_way() {
        let scorp = Scorp::new(1);
        let mut weights = WeightRegistry::new();
        publish(&mut weights, A, &[("sports", 4.0)]);
        publish(&mut weights, B, &[("sports", 4.0)]);

        let none = InterestSet::new();
        let a = NodeView { id: A, interests: &none };
        let b = NodeView { id: B, interests: &none };
        let m = msg("sports");

        assert!(!scorp.should_forward(&m, a, b, false, &weights));
        assert!(!scorp.should_forward(&m, b, a, false, &weights));
    }

    #[test]
    fn test_peer_interest_short_circuits_weights() {
        let scorp = Scorp::new(1);
        let mut weights = WeightRegistry::new();
        publish(&mut weights, A, &[("news", 100.0)]);

        let none = InterestSet::new();
        let wants_news = interests(["news"]);
        let a = NodeView { id: A, interests: &none };
        let b = NodeView { id: B, interests: &wants_news };

        assert!(scorp.should_forward(&msg("news"), a, b, false, &weights));
    }

    #[test]
    fn test_dedup_blocks_forwarding() {
        let scorp = Scorp::new(1);
        let weights = WeightRegistry::new();
        let wants_news = interests(["news"]);
        let none = InterestSet::new();
        let a = NodeView { id: A, interests: &none };
        let b = NodeView { id: B, interests: &wants_news };

        assert!(!scorp.should_forward(&msg("news"), a, b, true, &weights));
    }

    #[test]
    fn test_no_published_vectors_no_forwarding() {
        let scorp = Scorp::new(1);
        let weights = WeightRegistry::new();
        let none = InterestSet::new();
        let a = NodeView { id: A, interests: &none };
        let b = NodeView { id: B, interests: &none };

        assert!(!scorp.should_forward(&msg("news"), a, b, false, &weights));
    }

    #[test]
    fn test_store_on_weight_or_interest() {
        let scorp = Scorp::new(1);
        let mut weights = WeightRegistry::new();
        publish(&mut weights, A, &[("sports", 2.0)]);

        let none = InterestSet::new();
        let wants_news = interests(["news"]);

        // positive weight, no interest
        let a = NodeView { id: A, interests: &none };
        assert!(scorp.should_store_received(&msg("sports"), a, &weights));
        // interest, zero weight
        let a = NodeView { id: A, interests: &wants_news };
        assert!(scorp.should_store_received(&msg("news"), a, &weights));
        // neither
        let a = NodeView { id: A, interests: &none };
        assert!(!scorp.should_store_received(&msg("news"), a, &weights));
    }

    #[test]
    fn test_delete_after_send_only_when_uninterested_and_weightless() {
        let scorp = Scorp::new(1);
        let mut weights = WeightRegistry::new();
        publish(&mut weights, A, &[("sports", 2.0)]);

        let none = InterestSet::new();
        let wants_news = interests(["news"]);
        let b = NodeView { id: B, interests: &none };

        let a = NodeView { id: A, interests: &none };
        assert!(scorp.should_delete_after_send(&msg("news"), a, b, &weights));
        assert!(!scorp.should_delete_after_send(&msg("sports"), a, b, &weights));

        let a = NodeView { id: A, interests: &wants_news };
        assert!(!scorp.should_delete_after_send(&msg("news"), a, b, &weights));
    }

    #[test]
    fn test_stale_report_never_deletes() {
        let scorp = Scorp::new(1);
        assert!(!scorp.should_delete_on_stale_report(&msg("news"), B));
    }

    #[test]
    fn test_replicate_has_empty_history() {
        let mut scorp = Scorp::new(2);
        let mut weights = WeightRegistry::new();
        scorp.connection_up(B, &interests(["news"]), 0.0);
        scorp.slot_sample(A, SlotCrossing { day: 1, slot: 0 }, 600.0, &mut weights);
        assert!(weights.weight(A, &Topic::from("news")) > 0.0);

        let mut copy = scorp.replicate();
        let mut fresh = WeightRegistry::new();
        copy.slot_sample(B, SlotCrossing { day: 1, slot: 0 }, 600.0, &mut fresh);
        assert!(fresh.vector(B).is_some_and(|v| v.is_empty()));
    }
}
