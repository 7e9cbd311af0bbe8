use std::collections::{BTreeMap, BinaryHeap};

use scorp_core::{
    DecisionEngine, Message, MessageId, NodeId, NodeView, Scorp, SlotClock, WeightRegistry,
};
use scorp_core::topic::interests;

use crate::connection::{Connection, ConnectionId, Transfer};
use crate::error::{Result, SimError};
use crate::event::{Event, ScheduledEvent};
use crate::report::SimMetrics;
use crate::router::{ReceiveVerdict, Router, RouterConfig};
use crate::scenario::{Scenario, SimConfig};

/// The host environment: node registry, contact windows, event schedule,
/// transfer scheduler, and the shared weight registry.
///
/// Single-threaded and step-driven. Every pass over the population runs in
/// ascending `NodeId` order, so a run is fully determined by its scenario.
pub struct World {
    clock: SlotClock,
    routers: BTreeMap<NodeId, Router>,
    names: BTreeMap<NodeId, String>,
    connections: BTreeMap<ConnectionId, Connection>,
    next_connection: u64,
    events: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
    weights: WeightRegistry,
    metrics: SimMetrics,
    config: SimConfig,
    time: f64,
}

impl World {
    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        let clock = SlotClock::new(scenario.clock.slots.clone())?;
        let prototype = Scorp::new(clock.slot_count());
        let router_config = RouterConfig {
            tombstoning: scenario.sim.tombstoning,
            delete_delivered: scenario.sim.delete_delivered,
            default_ttl: scenario.sim.default_ttl,
        };

        let mut routers = BTreeMap::new();
        let mut names = BTreeMap::new();
        let mut ids: BTreeMap<&str, NodeId> = BTreeMap::new();
        for (index, decl) in scenario.nodes.iter().enumerate() {
            let id = NodeId(index as u32);
            ids.insert(decl.name.as_str(), id);
            names.insert(id, decl.name.clone());
            routers.insert(
                id,
                Router::new(
                    id,
                    interests(decl.interests.iter().cloned()),
                    prototype.replicate(),
                    router_config,
                ),
            );
        }

        let mut world = Self {
            clock,
            routers,
            names,
            connections: BTreeMap::new(),
            next_connection: 0,
            events: BinaryHeap::new(),
            next_seq: 0,
            weights: WeightRegistry::new(),
            metrics: SimMetrics::default(),
            config: scenario.sim.clone(),
            time: 0.0,
        };

        let resolve = |name: &str| {
            ids.get(name)
                .copied()
                .ok_or_else(|| SimError::UnknownNode(name.to_string()))
        };
        for contact in &scenario.contacts {
            let a = resolve(&contact.a)?;
            let b = resolve(&contact.b)?;
            world.schedule(contact.from, Event::ContactUp { a, b });
            world.schedule(contact.to, Event::ContactDown { a, b });
        }
        for decl in &scenario.messages {
            let node = resolve(&decl.from)?;
            let mut message =
                Message::new(decl.id.as_str(), decl.topic.as_str(), decl.time, decl.size);
            if let Some(ttl) = decl.ttl {
                message = message.with_ttl(ttl);
            }
            world.schedule(decl.time, Event::CreateMessage { node, message });
        }
        Ok(world)
    }

    /// Run the whole scenario at the configured tick rate.
    pub fn run(&mut self) -> Result<&SimMetrics> {
        let tick = self.config.tick.max(1e-6);
        let steps = (self.config.duration / tick).ceil() as u64;
        for step in 0..=steps {
            self.tick(step as f64 * tick)?;
        }
        Ok(&self.metrics)
    }

    /// One simulation step at absolute time `now`.
    pub fn tick(&mut self, now: f64) -> Result<()> {
        self.time = now;

        // slot-boundary sample: fold every node, ascending id order
        if let Some(crossing) = self.clock.advance(now) {
            tracing::debug!(day = crossing.day, slot = crossing.slot, "slot boundary sample");
            for router in self.routers.values_mut() {
                router.slot_sample(crossing, now, &mut self.weights);
            }
        }

        while self.events.peek().is_some_and(|e| e.time <= now) {
            if let Some(scheduled) = self.events.pop() {
                self.apply_event(scheduled.event, now)?;
            }
        }

        self.complete_transfers(now)?;
        self.sweep_and_schedule(now);
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    pub fn weights(&self) -> &WeightRegistry {
        &self.weights
    }

    pub fn clock(&self) -> &SlotClock {
        &self.clock
    }

    pub fn router(&self, node: NodeId) -> Option<&Router> {
        self.routers.get(&node)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.routers.keys().copied()
    }

    fn schedule(&mut self, time: f64, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(ScheduledEvent::new(time, seq, event));
    }

    fn apply_event(&mut self, event: Event, now: f64) -> Result<()> {
        match event {
            Event::ContactUp { a, b } => self.contact_up(a, b, now),
            Event::ContactDown { a, b } => self.contact_down(a, b, now),
            Event::CreateMessage { node, message } => self.create_message(node, message),
        }
    }

    fn find_connection(&self, a: NodeId, b: NodeId) -> Option<ConnectionId> {
        self.connections
            .values()
            .find(|c| c.up && c.involves(a) && c.involves(b))
            .map(|c| c.id)
    }

    fn contact_up(&mut self, a: NodeId, b: NodeId, now: f64) -> Result<()> {
        if self.find_connection(a, b).is_some() {
            return Ok(());
        }
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(id, Connection::new(id, a, b));
        tracing::debug!(conn = id.0, %a, %b, "contact up");

        let Some(b_interests) = self.routers.get(&b).map(|r| r.interests().clone()) else {
            return Ok(());
        };
        let Some(a_interests) = self.routers.get(&a).map(|r| r.interests().clone()) else {
            return Ok(());
        };

        // whichever side observes the up event first initiates the exchange;
        // the peer is notified so its own up hook cannot re-trigger it
        let initiated = match self.routers.get_mut(&a) {
            Some(r) => r.connection_up(
                id,
                NodeView {
                    id: b,
                    interests: &b_interests,
                },
                now,
            ),
            None => false,
        };
        if initiated && let Some(r) = self.routers.get_mut(&b) {
            r.did_exchange(id);
        }
        self.scan_all_messages(a, b, id);

        if let Some(r) = self.routers.get_mut(&b) {
            r.connection_up(
                id,
                NodeView {
                    id: a,
                    interests: &a_interests,
                },
                now,
            );
        }
        self.scan_all_messages(b, a, id);
        Ok(())
    }

    fn contact_down(&mut self, a: NodeId, b: NodeId, now: f64) -> Result<()> {
        let Some(conn_id) = self.find_connection(a, b) else {
            return Ok(());
        };
        // an in-flight transfer dies with the contact window
        if let Some(conn) = self.connections.remove(&conn_id) {
            tracing::debug!(conn = conn.id.0, %a, %b, "contact down");
            if let Some(r) = self.routers.get_mut(&a) {
                r.connection_down(conn.id, b, now);
            }
            if let Some(r) = self.routers.get_mut(&b) {
                r.connection_down(conn.id, a, now);
            }
        }
        Ok(())
    }

    fn create_message(&mut self, node: NodeId, message: Message) -> Result<()> {
        let id = message.id.clone();
        let accepted = match self.routers.get_mut(&node) {
            Some(r) => r.create_message(message),
            None => false,
        };
        if accepted {
            self.metrics.messages_created += 1;
            tracing::debug!(%node, msg = %id, "message created");
            self.scan_message_on_connections(node, &id, None);
        }
        Ok(())
    }

    /// Queue attempts to `peer` for every message `sender` holds that the
    /// policy wants on this connection.
    fn scan_all_messages(&mut self, sender: NodeId, peer: NodeId, conn: ConnectionId) {
        let picks: Vec<MessageId> = {
            let (Some(s), Some(p)) = (self.routers.get(&sender), self.routers.get(&peer)) else {
                return;
            };
            s.buffer()
                .iter()
                .filter(|m| s.wants_forward(m, p.view(), p.buffer().contains(&m.id), &self.weights))
                .map(|m| m.id.clone())
                .collect()
        };
        if let Some(s) = self.routers.get_mut(&sender) {
            for id in picks {
                s.enqueue_attempt(id, conn);
            }
        }
    }

    /// Queue attempts for one newly stored message on every open connection
    /// except the one it arrived on.
    fn scan_message_on_connections(
        &mut self,
        node: NodeId,
        msg: &MessageId,
        exclude: Option<ConnectionId>,
    ) {
        let candidates: Vec<(ConnectionId, NodeId)> = self
            .connections
            .values()
            .filter(|c| c.up && c.involves(node) && exclude != Some(c.id))
            .map(|c| (c.id, c.other(node)))
            .collect();

        for (conn, peer) in candidates {
            let wants = {
                let (Some(s), Some(p)) = (self.routers.get(&node), self.routers.get(&peer)) else {
                    continue;
                };
                match s.buffer().get(msg) {
                    Some(m) => {
                        s.wants_forward(m, p.view(), p.buffer().contains(&m.id), &self.weights)
                    }
                    None => false,
                }
            };
            if wants && let Some(s) = self.routers.get_mut(&node) {
                s.enqueue_attempt(msg.clone(), conn);
            }
        }
    }

    fn complete_transfers(&mut self, now: f64) -> Result<()> {
        let due: Vec<(ConnectionId, Transfer)> = self
            .connections
            .values_mut()
            .filter(|c| c.transfer.as_ref().is_some_and(|t| t.completes_at <= now))
            .filter_map(|c| c.transfer.take().map(|t| (c.id, t)))
            .collect();

        for (conn_id, transfer) in due {
            let sender = transfer.sender;
            let Some(receiver) = self.connections.get(&conn_id).map(|c| c.other(sender)) else {
                continue;
            };
            // the sender was busy with this transfer the whole time; the
            // message vanishing from its buffer means corrupted bookkeeping
            let msg = self
                .routers
                .get(&sender)
                .and_then(|r| r.buffer().get(&transfer.message).cloned())
                .ok_or_else(|| SimError::MissingMessage(transfer.message.clone()))?;

            self.metrics.transfers_completed += 1;
            let outcome = match self.routers.get_mut(&receiver) {
                Some(r) => r.message_transferred(msg, &self.weights),
                None => continue,
            };
            if outcome.first_delivery {
                self.metrics.first_deliveries += 1;
                self.metrics.delivered_ids.insert(transfer.message.clone());
            }
            if outcome.stored {
                self.scan_message_on_connections(receiver, &transfer.message, Some(conn_id));
            }

            let Some(receiver_interests) =
                self.routers.get(&receiver).map(|r| r.interests().clone())
            else {
                continue;
            };
            if let Some(r) = self.routers.get_mut(&sender) {
                r.transfer_done(
                    conn_id,
                    &transfer.message,
                    NodeView {
                        id: receiver,
                        interests: &receiver_interests,
                    },
                    &self.weights,
                )?;
            }
            tracing::debug!(msg = %transfer.message, from = %sender, to = %receiver, "transfer complete");
        }
        Ok(())
    }

    fn sweep_and_schedule(&mut self, now: f64) {
        let ids: Vec<NodeId> = self.routers.keys().copied().collect();
        for node in ids {
            if let Some(r) = self.routers.get_mut(&node) {
                let expired = r.ttl_sweep(now);
                self.metrics.expired_dropped += expired.len() as u64;
                r.purge_stale_attempts();
            }
            self.try_start_transfers(node, now);
        }
    }

    /// Walk the node's outgoing queue in order and start the first feasible
    /// transfer; a node carries at most one transfer at a time.
    fn try_start_transfers(&mut self, node: NodeId, now: f64) {
        let attempts: Vec<(MessageId, ConnectionId)> = match self.routers.get(&node) {
            Some(r) if !r.is_sending() => r.outgoing().to_vec(),
            _ => return,
        };

        for (msg_id, conn_id) in attempts {
            if self.routers.get(&node).is_none_or(|r| r.is_sending()) {
                break;
            }
            let Some(conn) = self.connections.get(&conn_id) else {
                continue;
            };
            if !conn.is_ready() {
                continue;
            }
            let receiver = conn.other(node);
            let Some(msg) = self
                .routers
                .get(&node)
                .and_then(|r| r.buffer().get(&msg_id).cloned())
            else {
                continue;
            };
            let verdict = match self.routers.get(&receiver) {
                Some(r) => r.receive_check(&msg, now),
                None => continue,
            };

            match verdict {
                ReceiveVerdict::Ok => {
                    let duration = f64::from(msg.size) / self.config.data_rate.max(1.0);
                    if let Some(c) = self.connections.get_mut(&conn_id) {
                        c.transfer = Some(Transfer {
                            message: msg_id.clone(),
                            sender: node,
                            completes_at: now + duration,
                        });
                    }
                    if let Some(r) = self.routers.get_mut(&node) {
                        r.mark_sending(conn_id);
                    }
                    self.metrics.transfers_started += 1;
                    tracing::debug!(msg = %msg_id, from = %node, to = %receiver, "transfer started");
                }
                ReceiveVerdict::DeniedDelivered | ReceiveVerdict::DeniedOld => {
                    match verdict {
                        ReceiveVerdict::DeniedDelivered => self.metrics.denied_delivered += 1,
                        _ => self.metrics.denied_old += 1,
                    }
                    if let Some(r) = self.routers.get_mut(&node) {
                        r.handle_denied(&msg_id, verdict, receiver);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{ClockConfig, ContactDecl, MessageDecl, NodeDecl};

    fn two_node_scenario() -> Scenario {
        Scenario {
            clock: ClockConfig {
                slots: vec![28_800, 57_600, 86_400],
            },
            sim: SimConfig {
                duration: 2_000.0,
                ..SimConfig::default()
            },
            nodes: vec![
                NodeDecl {
                    name: "alice".into(),
                    interests: vec!["sports".into()],
                },
                NodeDecl {
                    name: "bob".into(),
                    interests: vec!["news".into()],
                },
            ],
            contacts: vec![ContactDecl {
                a: "alice".into(),
                b: "bob".into(),
                from: 100.0,
                to: 1_500.0,
            }],
            messages: vec![MessageDecl {
                id: "M1".into(),
                from: "alice".into(),
                topic: "news".into(),
                size: 1_000,
                time: 200.0,
                ttl: None,
            }],
        }
    }

    #[test]
    fn test_direct_delivery_to_interested_peer() {
        let scenario = two_node_scenario();
        let mut world = World::from_scenario(&scenario).unwrap();
        world.run().unwrap();

        let metrics = world.metrics();
        assert_eq!(metrics.messages_created, 1);
        assert_eq!(metrics.first_deliveries, 1);
        assert!(metrics.delivered_ids.contains(&MessageId::from("M1")));
        assert!((metrics.delivery_ratio() - 1.0).abs() < 1e-12);

        let bob = world.node_id("bob").unwrap();
        assert!(world.router(bob).unwrap().has_delivered(&MessageId::from("M1")));
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut scenario = two_node_scenario();
        scenario.messages[0].from = "nobody".into();
        assert!(matches!(
            World::from_scenario(&scenario),
            Err(SimError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_bad_schedule_rejected() {
        let mut scenario = two_node_scenario();
        scenario.clock.slots.clear();
        assert!(matches!(
            World::from_scenario(&scenario),
            Err(SimError::Schedule(_))
        ));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let scenario = Scenario::synthetic(11, 6, 4, 30, 10);
        let run = |scenario: &Scenario| {
            let mut world = World::from_scenario(scenario).unwrap();
            world.run().unwrap();
            serde_json::to_string(world.metrics()).unwrap()
        };
        assert_eq!(run(&scenario), run(&scenario));
    }

    #[test]
    fn test_message_not_forwarded_to_uninterested_weightless_peer() {
        let mut scenario = two_node_scenario();
        scenario.messages[0].topic = "music".into();
        let mut world = World::from_scenario(&scenario).unwrap();
        world.run().unwrap();

        assert_eq!(world.metrics().first_deliveries, 0);
        assert_eq!(world.metrics().transfers_started, 0);
    }
}
