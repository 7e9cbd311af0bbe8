use serde::Serialize;

use scorp_core::{MessageId, NodeId};

/// Identifier for one pairwise contact window. A fresh id is minted every
/// time two nodes come into range, so per-connection state never leaks
/// across contact windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConnectionId(pub u64);

/// An in-flight transfer occupying a connection.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub message: MessageId,
    pub sender: NodeId,
    pub completes_at: f64,
}

/// A live pairwise contact between two nodes.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub a: NodeId,
    pub b: NodeId,
    pub up: bool,
    pub transfer: Option<Transfer>,
}

impl Connection {
    pub fn new(id: ConnectionId, a: NodeId, b: NodeId) -> Self {
        Self {
            id,
            a,
            b,
            up: true,
            transfer: None,
        }
    }

    /// The endpoint that is not `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if node == self.a { self.b } else { self.a }
    }

    pub fn involves(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// Ready to carry a new transfer.
    pub fn is_ready(&self) -> bool {
        self.up && self.transfer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_endpoint() {
        let conn = Connection::new(ConnectionId(0), NodeId(3), NodeId(7));
        assert_eq!(conn.other(NodeId(3)), NodeId(7));
        assert_eq!(conn.other(NodeId(7)), NodeId(3));
    }

    #[test]
    fn test_readiness() {
        let mut conn = Connection::new(ConnectionId(0), NodeId(0), NodeId(1));
        assert!(conn.is_ready());
        conn.transfer = Some(Transfer {
            message: MessageId::from("M1"),
            sender: NodeId(0),
            completes_at: 10.0,
        });
        assert!(!conn.is_ready());
        conn.transfer = None;
        conn.up = false;
        assert!(!conn.is_ready());
    }
}
