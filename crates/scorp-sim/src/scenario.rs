use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Topic pool used by the synthetic generator.
const TOPIC_POOL: [&str; 8] = [
    "news", "sports", "music", "weather", "traffic", "games", "food", "movies",
];

/// A complete declarative simulation input: slot schedule, runtime knobs,
/// node population, contact trace, and message workload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub clock: ClockConfig,
    #[serde(default)]
    pub sim: SimConfig,
    pub nodes: Vec<NodeDecl>,
    #[serde(default)]
    pub contacts: Vec<ContactDecl>,
    #[serde(default)]
    pub messages: Vec<MessageDecl>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Slot boundaries in seconds since midnight, strictly increasing.
    pub slots: Vec<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seconds of simulated time per step.
    pub tick: f64,
    /// Total simulated seconds.
    pub duration: f64,
    /// Remember delivered ids forever and refuse them on sight.
    pub tombstoning: bool,
    /// Allow dropping copies reported stale by a peer.
    pub delete_delivered: bool,
    /// TTL stamped onto created messages that declare none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<f64>,
    /// Contact bandwidth in bytes per second; drives transfer duration.
    pub data_rate: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick: 1.0,
            duration: 86_400.0,
            tombstoning: false,
            delete_delivered: false,
            default_ttl: None,
            data_rate: 250_000.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDecl {
    pub name: String,
    pub interests: Vec<String>,
}

/// One contact window between two named nodes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContactDecl {
    pub a: String,
    pub b: String,
    pub from: f64,
    pub to: f64,
}

/// A timed message creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageDecl {
    pub id: String,
    pub from: String,
    pub topic: String,
    pub size: u32,
    pub time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<f64>,
}

impl Scenario {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Deterministic synthetic scenario: `nodes` nodes with 1-3 interests
    /// each drawn from a pool of `topics`, `contacts` random contact
    /// windows, `messages` random creations. Same seed, same scenario.
    pub fn synthetic(
        seed: u64,
        nodes: usize,
        topics: usize,
        contacts: usize,
        messages: usize,
    ) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let nodes = nodes.max(2);
        let topics = topics.clamp(1, TOPIC_POOL.len());
        let duration = 86_400.0;

        let node_decls: Vec<NodeDecl> = (0..nodes)
            .map(|i| {
                let count = rng.random_range(1..=3usize.min(topics));
                let mut interests = Vec::new();
                while interests.len() < count {
                    let topic = TOPIC_POOL[rng.random_range(0..topics)].to_string();
                    if !interests.contains(&topic) {
                        interests.push(topic);
                    }
                }
                NodeDecl {
                    name: format!("n{i}"),
                    interests,
                }
            })
            .collect();

        let contact_decls: Vec<ContactDecl> = (0..contacts)
            .map(|_| {
                let a = rng.random_range(0..nodes);
                let mut b = rng.random_range(0..nodes);
                while b == a {
                    b = rng.random_range(0..nodes);
                }
                let from = rng.random_range(0.0..duration * 0.9);
                let length = rng.random_range(120.0..3_600.0);
                ContactDecl {
                    a: format!("n{a}"),
                    b: format!("n{b}"),
                    from,
                    to: (from + length).min(duration),
                }
            })
            .collect();

        let message_decls: Vec<MessageDecl> = (0..messages)
            .map(|i| {
                let from = rng.random_range(0..nodes);
                MessageDecl {
                    id: format!("M{i}"),
                    from: format!("n{from}"),
                    topic: TOPIC_POOL[rng.random_range(0..topics)].to_string(),
                    size: rng.random_range(500..50_000),
                    time: rng.random_range(0.0..duration * 0.5),
                    ttl: None,
                }
            })
            .collect();

        Scenario {
            clock: ClockConfig {
                slots: vec![21_600, 43_200, 64_800, 86_400],
            },
            sim: SimConfig::default(),
            nodes: node_decls,
            contacts: contact_decls,
            messages: message_decls,
        }
    }
}
