use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle for a node in the simulated population.
///
/// Ordered so that whole-population passes (slot-boundary folds, transfer
/// scheduling) run in a stable, reproducible order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}
