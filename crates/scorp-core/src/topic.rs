use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A content classification tag carried by messages and declared by nodes.
///
/// Topics are the unit of both message classification and social-weight
/// indexing: a node's weight vector maps topics to scalars.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The immutable set of topics a node cares about, assigned externally.
/// Ordered so that every interest scan is reproducible.
pub type InterestSet = BTreeSet<Topic>;

/// Build an interest set from string-like names.
pub fn interests<I, S>(names: I) -> InterestSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(|n| Topic::new(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_equality_by_content() {
        assert_eq!(Topic::from("news"), Topic::new(String::from("news")));
        assert_ne!(Topic::from("news"), Topic::from("sports"));
    }

    #[test]
    fn test_interests_dedup_and_order() {
        let set = interests(["sports", "news", "sports"]);
        let names: Vec<&str> = set.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["news", "sports"]);
    }
}
