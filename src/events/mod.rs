//! Utility network domain events
//!
//! One struct per fact, grouped per aggregate into an event enum. Each event
//! carries the id of the aggregate that raised it.

pub mod node_container_events;
pub mod span_equipment_events;
pub mod terminal_equipment_events;

pub use node_container_events::*;
pub use span_equipment_events::*;
pub use terminal_equipment_events::*;

/// Implement [`crate::domain_events::DomainEvent`] for an event struct
macro_rules! impl_domain_event {
    ($ty:ident, $($id:ident).+, $subject:literal) => {
        impl $crate::domain_events::DomainEvent for $ty {
            fn aggregate_id(&self) -> uuid::Uuid {
                self.$($id).+
            }

            fn event_type(&self) -> &'static str {
                stringify!($ty)
            }

            fn subject(&self) -> String {
                $subject.to_string()
            }
        }
    };
}

/// Declare a per-aggregate event enum wrapping event structs
macro_rules! aggregate_event_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($variant($variant),)+
        }

        impl $crate::domain_events::DomainEvent for $name {
            fn aggregate_id(&self) -> uuid::Uuid {
                match self {
                    $(Self::$variant(e) => e.aggregate_id(),)+
                }
            }

            fn event_type(&self) -> &'static str {
                match self {
                    $(Self::$variant(e) => e.event_type(),)+
                }
            }

            fn subject(&self) -> String {
                match self {
                    $(Self::$variant(e) => e.subject(),)+
                }
            }
        }

        $(
            impl From<$variant> for $name {
                fn from(e: $variant) -> Self {
                    Self::$variant(e)
                }
            }
        )+
    };
}

pub(crate) use aggregate_event_enum;
pub(crate) use impl_domain_event;
