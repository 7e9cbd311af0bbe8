use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::Serialize;

use scorp_core::MessageId;

use crate::scenario::Scenario;

/// Counters collected over a run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SimMetrics {
    pub messages_created: u64,
    pub transfers_started: u64,
    pub transfers_completed: u64,
    /// Interested nodes seeing a message for the first time.
    pub first_deliveries: u64,
    pub denied_delivered: u64,
    pub denied_old: u64,
    pub expired_dropped: u64,
    /// Distinct message ids that reached at least one interested node.
    pub delivered_ids: BTreeSet<MessageId>,
}

impl SimMetrics {
    /// Fraction of created messages that reached at least one interested
    /// node.
    pub fn delivery_ratio(&self) -> f64 {
        if self.messages_created == 0 {
            return 0.0;
        }
        self.delivered_ids.len() as f64 / self.messages_created as f64
    }
}

/// One row of the interest census.
#[derive(Clone, Debug, Serialize)]
pub struct CensusEntry {
    pub topic: String,
    pub node_count: usize,
    pub nodes: Vec<String>,
}

/// The number of unique interests and, per interest, which nodes declare it.
#[derive(Clone, Debug, Serialize)]
pub struct InterestCensus {
    pub interest_count: usize,
    pub entries: Vec<CensusEntry>,
}

/// Build the interest census for a scenario's node population. With a
/// filter, only topics matching the expression are counted.
pub fn interest_census(scenario: &Scenario, filter: Option<&Regex>) -> InterestCensus {
    let mut by_topic: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in &scenario.nodes {
        for interest in &node.interests {
            if filter.is_some_and(|re| !re.is_match(interest)) {
                continue;
            }
            let nodes = by_topic.entry(interest.as_str()).or_default();
            if !nodes.contains(&node.name.as_str()) {
                nodes.push(node.name.as_str());
            }
        }
    }

    let entries: Vec<CensusEntry> = by_topic
        .into_iter()
        .map(|(topic, nodes)| CensusEntry {
            topic: topic.to_string(),
            node_count: nodes.len(),
            nodes: nodes.into_iter().map(str::to_string).collect(),
        })
        .collect();

    InterestCensus {
        interest_count: entries.len(),
        entries,
    }
}
