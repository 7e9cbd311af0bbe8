use std::collections::BTreeSet;

use scorp_core::{
    DecisionEngine, InterestSet, Message, MessageId, NodeId, NodeView, SlotCrossing,
    TTL_CHECK_INTERVAL, WeightRegistry,
};

use crate::buffer::MessageBuffer;
use crate::connection::ConnectionId;
use crate::error::{Result, SimError};

/// What a node answers when a peer asks to send it a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveVerdict {
    Ok,
    /// Already delivered here, or tombstoned.
    DeniedDelivered,
    /// TTL ran out before the transfer could start.
    DeniedOld,
}

/// What happened on the receiving side when a transfer completed.
#[derive(Clone, Copy, Debug)]
pub struct ReceiveOutcome {
    /// The message entered the buffer and should be propagated further.
    pub stored: bool,
    /// This node is a final destination seeing the message for the first
    /// time.
    pub first_delivery: bool,
}

/// Router-level knobs supplied by the environment's configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct RouterConfig {
    /// Remember delivered ids forever and refuse them on sight.
    pub tombstoning: bool,
    /// Allow dropping a copy when a peer reports it stale, subject to the
    /// policy's stale-report rule.
    pub delete_delivered: bool,
    /// TTL stamped onto locally created messages that carry none.
    pub default_ttl: Option<f64>,
}

/// Per-node connection lifecycle manager.
///
/// Owns the node's buffer, the outgoing-forward queue, the per-connection
/// exchange state, and the tombstone set, and calls into the decision
/// engine at each lifecycle point. Anything that requires looking at a
/// peer (its interests, whether it already holds a message) is supplied by
/// the world; a router never touches another router.
pub struct Router {
    node: NodeId,
    interests: InterestSet,
    engine: Box<dyn DecisionEngine>,
    buffer: MessageBuffer,
    /// Forward attempts not yet completed, in enqueue order.
    outgoing: Vec<(MessageId, ConnectionId)>,
    /// Connections whose one-time information exchange already ran.
    exchanged: BTreeSet<ConnectionId>,
    /// Connections this node is currently sending on.
    sending: BTreeSet<ConnectionId>,
    /// Ids of messages first-delivered here.
    delivered: BTreeSet<MessageId>,
    tombstones: Option<BTreeSet<MessageId>>,
    delete_delivered: bool,
    default_ttl: Option<f64>,
    last_ttl_check: f64,
}

impl Router {
    pub fn new(
        node: NodeId,
        interests: InterestSet,
        engine: Box<dyn DecisionEngine>,
        config: RouterConfig,
    ) -> Self {
        Self {
            node,
            interests,
            engine,
            buffer: MessageBuffer::new(),
            outgoing: Vec::new(),
            exchanged: BTreeSet::new(),
            sending: BTreeSet::new(),
            delivered: BTreeSet::new(),
            tombstones: config.tombstoning.then(BTreeSet::new),
            delete_delivered: config.delete_delivered,
            default_ttl: config.default_ttl,
            last_ttl_check: 0.0,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn interests(&self) -> &InterestSet {
        &self.interests
    }

    pub fn view(&self) -> NodeView<'_> {
        NodeView {
            id: self.node,
            interests: &self.interests,
        }
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn outgoing(&self) -> &[(MessageId, ConnectionId)] {
        &self.outgoing
    }

    pub fn is_sending(&self) -> bool {
        !self.sending.is_empty()
    }

    pub fn has_delivered(&self, id: &MessageId) -> bool {
        self.delivered.contains(id)
    }

    pub fn is_tombstoned(&self, id: &MessageId) -> bool {
        self.tombstones.as_ref().is_some_and(|t| t.contains(id))
    }

    /// Connection-up hook: time the new contact and, when this side is the
    /// first to observe the event, run the one-time exchange. Returns true
    /// when this side initiated; the caller must then mark the peer side
    /// exchanged so the peer's own up hook does not re-trigger it.
    pub fn connection_up(&mut self, conn: ConnectionId, peer: NodeView<'_>, now: f64) -> bool {
        self.engine.connection_up(peer.id, peer.interests, now);
        if self.exchanged.contains(&conn) {
            return false;
        }
        self.exchanged.insert(conn);
        self.engine.exchange_for_new_connection(peer.id, now);
        true
    }

    /// The peer already ran the exchange for this connection.
    pub fn did_exchange(&mut self, conn: ConnectionId) {
        self.exchanged.insert(conn);
    }

    /// Connection-down hook: commit the contact's duration into today's
    /// accumulator and drop every queued attempt on the connection.
    pub fn connection_down(&mut self, conn: ConnectionId, peer: NodeId, now: f64) {
        self.engine.connection_down(peer, now);
        self.exchanged.remove(&conn);
        self.sending.remove(&conn);
        self.outgoing.retain(|(_, c)| *c != conn);
    }

    /// Whether the policy wants `msg` forwarded to `peer`.
    pub fn wants_forward(
        &self,
        msg: &Message,
        peer: NodeView<'_>,
        peer_holds: bool,
        weights: &WeightRegistry,
    ) -> bool {
        self.engine
            .should_forward(msg, self.view(), peer, peer_holds, weights)
    }

    /// Queue a forward attempt.
    pub fn enqueue_attempt(&mut self, id: MessageId, conn: ConnectionId) {
        self.outgoing.push((id, conn));
    }

    /// Locally create a message; stamps the configured default TTL onto
    /// messages that carry none. Returns whether it entered the buffer.
    pub fn create_message(&mut self, mut msg: Message) -> bool {
        if msg.ttl.is_none() {
            msg.ttl = self.default_ttl;
        }
        if !self.engine.accept_new_message(&msg) {
            return false;
        }
        self.buffer.insert(msg);
        true
    }

    /// Would this node accept `msg` right now? Asked by the sender before a
    /// transfer starts.
    pub fn receive_check(&self, msg: &Message, now: f64) -> ReceiveVerdict {
        if self.delivered.contains(&msg.id) || self.is_tombstoned(&msg.id) {
            return ReceiveVerdict::DeniedDelivered;
        }
        if msg.is_expired(now) {
            return ReceiveVerdict::DeniedOld;
        }
        ReceiveVerdict::Ok
    }

    /// Completed inbound transfer: decide storage, record first delivery.
    pub fn message_transferred(
        &mut self,
        msg: Message,
        weights: &WeightRegistry,
    ) -> ReceiveOutcome {
        let view = NodeView {
            id: self.node,
            interests: &self.interests,
        };
        let is_final = self.engine.is_final_destination(&msg, view);
        let first_delivery = is_final && !self.delivered.contains(&msg.id);
        let stored = self.engine.should_store_received(&msg, view, weights);

        if first_delivery {
            tracing::debug!(node = %self.node, msg = %msg.id, "first delivery");
            self.delivered.insert(msg.id.clone());
        }
        if stored {
            self.buffer.insert(msg);
        }
        ReceiveOutcome {
            stored,
            first_delivery,
        }
    }

    /// Sender-side handling of a refused transfer.
    pub fn handle_denied(&mut self, id: &MessageId, verdict: ReceiveVerdict, reporter: NodeId) {
        match verdict {
            ReceiveVerdict::DeniedDelivered if self.tombstones.is_some() => {
                self.delete_message(id);
                if let Some(tombstones) = self.tombstones.as_mut() {
                    tracing::debug!(node = %self.node, msg = %id, "tombstoned");
                    tombstones.insert(id.clone());
                }
            }
            ReceiveVerdict::DeniedDelivered | ReceiveVerdict::DeniedOld
                if self.delete_delivered =>
            {
                let stale = self.buffer.get(id).cloned();
                if let Some(msg) = stale
                    && self.engine.should_delete_on_stale_report(&msg, reporter)
                {
                    self.delete_message(id);
                }
            }
            _ => {}
        }
    }

    /// A transfer on `conn` started; the node is busy until it completes.
    pub fn mark_sending(&mut self, conn: ConnectionId) {
        self.sending.insert(conn);
    }

    /// Sender-side transfer completion: drop the finished attempt and ask
    /// the policy whether the local copy is still worth keeping.
    pub fn transfer_done(
        &mut self,
        conn: ConnectionId,
        msg_id: &MessageId,
        peer: NodeView<'_>,
        weights: &WeightRegistry,
    ) -> Result<()> {
        self.sending.remove(&conn);
        let Some(msg) = self.buffer.get(msg_id).cloned() else {
            return Err(SimError::MissingMessage(msg_id.clone()));
        };
        if let Some(pos) = self
            .outgoing
            .iter()
            .position(|(m, c)| m == msg_id && *c == conn)
        {
            self.outgoing.remove(pos);
        }
        let delete = self.engine.should_delete_after_send(
            &msg,
            NodeView {
                id: self.node,
                interests: &self.interests,
            },
            peer,
            weights,
        );
        if delete {
            tracing::debug!(node = %self.node, msg = %msg_id, "dropped after send");
            self.delete_message(msg_id);
        }
        Ok(())
    }

    /// Drop a message everywhere it is referenced. Absent ids are a no-op.
    pub fn delete_message(&mut self, id: &MessageId) {
        self.buffer.remove(id);
        self.outgoing.retain(|(m, _)| m != id);
    }

    /// Rate-limited TTL sweep; skipped entirely while this node is
    /// mid-transfer. Returns the dropped messages.
    pub fn ttl_sweep(&mut self, now: f64) -> Vec<Message> {
        if now - self.last_ttl_check < TTL_CHECK_INTERVAL || self.is_sending() {
            return Vec::new();
        }
        self.last_ttl_check = now;
        let expired = self.buffer.drain_expired(now);
        for msg in &expired {
            tracing::debug!(node = %self.node, msg = %msg.id, "ttl expired");
            self.outgoing.retain(|(m, _)| m != &msg.id);
        }
        expired
    }

    /// Drop queued attempts whose message is no longer buffered.
    pub fn purge_stale_attempts(&mut self) {
        let buffer = &self.buffer;
        self.outgoing.retain(|(m, _)| buffer.contains(m));
    }

    /// Slot-boundary fold: commit contact time and publish fresh weights.
    pub fn slot_sample(&mut self, crossing: SlotCrossing, now: f64, weights: &mut WeightRegistry) {
        self.engine.slot_sample(self.node, crossing, now, weights);
    }
}
