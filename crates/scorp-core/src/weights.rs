use std::collections::BTreeMap;

use serde::Serialize;

use crate::node::NodeId;
use crate::topic::Topic;

/// A node's published per-topic social weights. Missing topics read as
/// zero; a node may legitimately have no history for a topic yet.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<Topic, f64>);

impl WeightVector {
    pub fn weight(&self, topic: &Topic) -> f64 {
        self.0.get(topic).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Topic, f64)> {
        self.0.iter().map(|(t, w)| (t, *w))
    }
}

/// Every node's most recently published weight vector.
///
/// Owned by the environment and passed by reference into policy decisions.
/// Vectors are replaced whole at fold time, so a reader always sees the
/// peer's most recent completed fold, never a partially updated one.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct WeightRegistry {
    vectors: BTreeMap<NodeId, WeightVector>,
}

impl WeightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `node`'s published vector with the result of its latest fold.
    pub fn publish(&mut self, node: NodeId, vector: WeightVector) {
        self.vectors.insert(node, vector);
    }

    /// Whether `node` has ever published a vector.
    pub fn has_vector(&self, node: NodeId) -> bool {
        self.vectors.contains_key(&node)
    }

    pub fn vector(&self, node: NodeId) -> Option<&WeightVector> {
        self.vectors.get(&node)
    }

    /// `node`'s weight for `topic`; zero when unpublished or absent.
    pub fn weight(&self, node: NodeId, topic: &Topic) -> f64 {
        self.vectors
            .get(&node)
            .map(|v| v.weight(topic))
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &WeightVector)> {
        self.vectors.iter().map(|(n, v)| (*n, v))
    }
}

/// Folds each day's per-topic contact totals into per-slot running averages
/// and reduces them to a single recency-weighted scalar per topic.
///
/// One aggregator per node, one history map per clock slot. Bounded memory:
/// O(slots x topics) regardless of how many days the simulation runs.
#[derive(Clone, Debug)]
pub struct WeightAggregator {
    slot_averages: Vec<BTreeMap<Topic, f64>>,
}

impl WeightAggregator {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slot_averages: vec![BTreeMap::new(); slot_count],
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_averages.len()
    }

    /// The running average for one slot and topic; zero when absent.
    pub fn slot_average(&self, slot: usize, topic: &Topic) -> f64 {
        self.slot_averages[slot]
            .get(topic)
            .copied()
            .unwrap_or(0.0)
    }

    /// Commit `todays` into the running average for `slot` and recompute the
    /// published weight vector.
    ///
    /// The average is a running mean indexed by `day`: a topic with fresh
    /// contact time moves toward `(today + (day-1)*old) / day`, a topic with
    /// no evidence today decays to `old * (day-1) / day`. Non-negative
    /// inputs keep every average, and therefore every weight, non-negative.
    pub fn fold(&mut self, day: u64, slot: usize, todays: &BTreeMap<Topic, f64>) -> WeightVector {
        let d = day as f64;
        let averages = &mut self.slot_averages[slot];

        for (topic, duration) in todays {
            let old = averages.get(topic).copied().unwrap_or(0.0);
            averages.insert(topic.clone(), duration + (d - 1.0) * old);
        }
        for (topic, avg) in averages.iter_mut() {
            if todays.contains_key(topic) {
                *avg /= d;
            } else {
                *avg = (d - 1.0) * *avg / d;
            }
        }

        self.reduce(slot)
    }

    /// Recency-weighted reduction across all slots.
    ///
    /// Walks forward from the just-updated slot with wraparound; the
    /// denominator starts at the slot count and grows by one per step, so
    /// the freshest slot contributes with factor 1 and older slots with
    /// geometrically diminishing factors N/(N+1), N/(N+2), ...
    fn reduce(&self, start_slot: usize) -> WeightVector {
        let n = self.slot_averages.len();
        let mut weights: BTreeMap<Topic, f64> = BTreeMap::new();
        let mut denominator = n as f64;
        let mut index = start_slot;

        for _ in 0..n {
            for (topic, avg) in &self.slot_averages[index] {
                *weights.entry(topic.clone()).or_insert(0.0) += (n as f64 / denominator) * avg;
            }
            denominator += 1.0;
            index = (index + 1) % n;
        }

        WeightVector(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn topic(name: &str) -> Topic {
        Topic::from(name)
    }

    fn todays(entries: &[(&str, f64)]) -> BTreeMap<Topic, f64> {
        entries
            .iter()
            .map(|(name, secs)| (topic(name), *secs))
            .collect()
    }

    #[test]
    fn test_first_day_average_is_raw_duration() {
        let mut agg = WeightAggregator::new(3);
        agg.fold(1, 0, &todays(&[("news", 28_800.0)]));
        assert_relative_eq!(agg.slot_average(0, &topic("news")), 28_800.0);
    }

    #[test]
    fn test_absent_day_halves_on_day_two() {
        let mut agg = WeightAggregator::new(3);
        agg.fold(1, 0, &todays(&[("news", 28_800.0)]));
        agg.fold(2, 0, &todays(&[]));
        assert_relative_eq!(agg.slot_average(0, &topic("news")), 14_400.0);
    }

    #[test]
    fn test_running_mean_over_two_days() {
        let mut agg = WeightAggregator::new(2);
        agg.fold(1, 0, &todays(&[("news", 100.0)]));
        agg.fold(2, 0, &todays(&[("news", 400.0)]));
        // (400 + 1*100) / 2
        assert_relative_eq!(agg.slot_average(0, &topic("news")), 250.0);
    }

    #[test]
    fn test_reduce_weights_recent_slot_heaviest() {
        let mut agg = WeightAggregator::new(3);
        agg.fold(1, 1, &todays(&[("news", 90.0)]));
        let vector = agg.fold(1, 2, &todays(&[("news", 90.0)]));
        // walk starts at slot 2: factor 3/3, then slot 0 with 3/4 (empty),
        // then slot 1 with 3/5
        let expected = (3.0 / 3.0) * 90.0 + (3.0 / 5.0) * 90.0;
        assert_relative_eq!(vector.weight(&topic("news")), expected);
    }

    #[test]
    fn test_same_slot_refold_on_day_one_discards_old_average() {
        // a second fold of the same slot on day 1 multiplies the stored
        // average by (day-1) = 0: day-one history carries no weight yet
        let mut agg = WeightAggregator::new(3);
        agg.fold(1, 2, &todays(&[("news", 90.0)]));
        agg.fold(1, 2, &todays(&[]));
        assert_relative_eq!(agg.slot_average(2, &topic("news")), 0.0);
    }

    #[test]
    fn test_weights_never_negative() {
        let mut agg = WeightAggregator::new(4);
        for day in 1..20 {
            let slot = (day as usize) % 4;
            let input = if day % 3 == 0 {
                todays(&[("a", 50.0), ("b", 0.0)])
            } else {
                todays(&[])
            };
            let vector = agg.fold(day, slot, &input);
            for (_, w) in vector.iter() {
                assert!(w >= 0.0, "weight went negative: {w}");
            }
        }
    }

    #[test]
    fn test_registry_defaults_to_zero() {
        let registry = WeightRegistry::new();
        assert!(!registry.has_vector(NodeId(1)));
        assert_relative_eq!(registry.weight(NodeId(1), &topic("news")), 0.0);
    }

    #[test]
    fn test_registry_publish_replaces_whole_vector() {
        let mut registry = WeightRegistry::new();
        let mut agg = WeightAggregator::new(2);

        let v1 = agg.fold(1, 0, &todays(&[("news", 60.0), ("sports", 30.0)]));
        registry.publish(NodeId(1), v1);
        assert!(registry.weight(NodeId(1), &topic("sports")) > 0.0);

        // a later fold with no sports contact publishes a vector where the
        // sports weight has decayed, not a merged view
        let v2 = agg.fold(2, 0, &todays(&[("news", 60.0)]));
        let decayed = v2.weight(&topic("sports"));
        registry.publish(NodeId(1), v2);
        assert_relative_eq!(registry.weight(NodeId(1), &topic("sports")), decayed);
    }
}
