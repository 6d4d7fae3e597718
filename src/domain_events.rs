//! Domain events enum for the utility network domain

use crate::events::{NodeContainerEvent, SpanEquipmentEvent, TerminalEquipmentEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Common surface of every utility network event
pub trait DomainEvent {
    /// Id of the aggregate that raised the event
    fn aggregate_id(&self) -> Uuid;

    /// Short type name of the event
    fn event_type(&self) -> &'static str;

    /// Versioned subject the event is published under
    fn subject(&self) -> String;
}

/// Enum wrapper for utility network domain events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UtilityNetworkEvent {
    /// An event of a span equipment aggregate
    SpanEquipment(SpanEquipmentEvent),
    /// An event of a terminal equipment aggregate
    TerminalEquipment(TerminalEquipmentEvent),
    /// An event of a node container aggregate
    NodeContainer(NodeContainerEvent),
}

impl UtilityNetworkEvent {
    /// Category used when notifying listeners about the change
    pub fn category(&self) -> &'static str {
        match self {
            Self::SpanEquipment(_) => "SpanEquipment",
            Self::TerminalEquipment(_) => "TerminalEquipment",
            Self::NodeContainer(_) => "NodeContainer",
        }
    }
}

impl DomainEvent for UtilityNetworkEvent {
    fn aggregate_id(&self) -> Uuid {
        match self {
            Self::SpanEquipment(e) => e.aggregate_id(),
            Self::TerminalEquipment(e) => e.aggregate_id(),
            Self::NodeContainer(e) => e.aggregate_id(),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::SpanEquipment(e) => e.event_type(),
            Self::TerminalEquipment(e) => e.event_type(),
            Self::NodeContainer(e) => e.event_type(),
        }
    }

    fn subject(&self) -> String {
        match self {
            Self::SpanEquipment(e) => e.subject(),
            Self::TerminalEquipment(e) => e.subject(),
            Self::NodeContainer(e) => e.subject(),
        }
    }
}

impl From<SpanEquipmentEvent> for UtilityNetworkEvent {
    fn from(e: SpanEquipmentEvent) -> Self {
        Self::SpanEquipment(e)
    }
}

impl From<TerminalEquipmentEvent> for UtilityNetworkEvent {
    fn from(e: TerminalEquipmentEvent) -> Self {
        Self::TerminalEquipment(e)
    }
}

impl From<NodeContainerEvent> for UtilityNetworkEvent {
    fn from(e: NodeContainerEvent) -> Self {
        Self::NodeContainer(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SpanEquipmentRemoved, TerminalEquipmentRemoved};

    #[test]
    fn test_wrapper_delegates_to_inner_event() {
        let id = Uuid::new_v4();
        let event: UtilityNetworkEvent =
            SpanEquipmentEvent::from(SpanEquipmentRemoved { span_equipment_id: id }).into();

        assert_eq!(event.aggregate_id(), id);
        assert_eq!(event.event_type(), "SpanEquipmentRemoved");
        assert_eq!(event.subject(), "utility_network.span_equipment.removed.v1");
        assert_eq!(event.category(), "SpanEquipment");
    }

    #[test]
    fn test_event_json_roundtrip() {
        let event: UtilityNetworkEvent = TerminalEquipmentEvent::from(TerminalEquipmentRemoved {
            terminal_equipment_id: Uuid::new_v4(),
        })
        .into();

        let json = serde_json::to_string(&event).unwrap();
        let back: UtilityNetworkEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
