//! Pure routing of MQTT events
//!
//! The producer never subscribes, so the only incoming traffic it cares about
//! is ConnAck, PubAck and broker Disconnect. Outgoing publish and disconnect
//! events tell the session which packet ID a publish was given and when the
//! DISCONNECT packet left the socket.

use rumqttc::v5::mqttbytes::v5::{Packet, PubAckReason};
use std::collections::BTreeSet;
use rumqttc::v5::Event;
use rumqttc::Outgoing;

/// Routing decision for a single MQTT event
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    ConnectionAcknowledged,
    PublishSent(u16),
    PublishAcknowledged {
        packet_id: u16,
        rejection: Option<String>,
    },
    Disconnected,
    DisconnectSent,
    InfrastructureEvent(String),
    OutgoingEvent,
}

/// Notification from the network task to a waiting publish or disconnect
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    /// A publish was written with this packet ID
    Sent(u16),
    /// The broker acknowledged a packet; `rejection` holds a negative reason
    Acked {
        packet_id: u16,
        rejection: Option<String>,
    },
    /// The DISCONNECT packet was written
    DisconnectSent,
    /// The network link failed
    LinkLost(String),
}

/// Publishes that stopped waiting when the link dropped
///
/// rumqttc keeps their packets and writes them after a reconnect: packets
/// already written keep their packet ID, queued ones get fresh IDs in
/// request order ahead of any newer request. Those writes belong to no
/// waiting publish.
#[derive(Debug, Default)]
pub struct AbandonedPackets {
    ids: BTreeSet<u16>,
    unwritten: usize,
}

impl AbandonedPackets {
    /// The publish was written as `packet_id` but never acknowledged
    pub fn abandon(&mut self, packet_id: u16) {
        self.ids.insert(packet_id);
    }

    /// The publish was still queued when the link dropped
    pub fn abandon_unwritten(&mut self) {
        self.unwritten += 1;
    }

    /// Whether a write reported as `Sent(packet_id)` belongs to an abandoned
    /// publish. The first fresh writes are claimed by queued abandoned ones.
    pub fn claim_write(&mut self, packet_id: u16) -> bool {
        if self.ids.contains(&packet_id) {
            return true;
        }
        if self.unwritten > 0 {
            self.unwritten -= 1;
            self.ids.insert(packet_id);
            return true;
        }
        false
    }

    /// Forget a packet once the broker has acknowledged it
    pub fn observe(&mut self, event: &DeliveryEvent) {
        if let DeliveryEvent::Acked { packet_id, .. } = event {
            self.ids.remove(packet_id);
        }
    }
}

/// Pure routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::PubAck(puback) => EventRoute::PublishAcknowledged {
                    packet_id: puback.pkid,
                    rejection: Self::puback_rejection(&puback.reason),
                },
                Packet::Disconnect(_) => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Publish(pkid)) => EventRoute::PublishSent(*pkid),
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectSent,
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Reason text for a negative PubAck, `None` when the broker accepted it
    pub fn puback_rejection(reason: &PubAckReason) -> Option<String> {
        match reason {
            PubAckReason::Success | PubAckReason::NoMatchingSubscribers => None,
            other => Some(format!("{other:?}")),
        }
    }

    /// Notification a waiting publish/disconnect needs for this route, if any
    pub fn delivery_event(route: &EventRoute) -> Option<DeliveryEvent> {
        match route {
            EventRoute::PublishSent(pkid) => Some(DeliveryEvent::Sent(*pkid)),
            EventRoute::PublishAcknowledged {
                packet_id,
                rejection,
            } => Some(DeliveryEvent::Acked {
                packet_id: *packet_id,
                rejection: rejection.clone(),
            }),
            EventRoute::DisconnectSent => Some(DeliveryEvent::DisconnectSent),
            EventRoute::Disconnected => Some(DeliveryEvent::LinkLost(
                "Broker sent DISCONNECT".to_string(),
            )),
            _ => None,
        }
    }
}
