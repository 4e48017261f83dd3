pub mod broker;
pub mod event;
pub mod local;
pub mod patrol_events;

pub use broker::{create_message_broker, MessageBroker, MessageBrokerTrait, SharedBroker};
pub use event::{EventMessage, EventType};
pub use local::LocalBroker;
pub use patrol_events::PatrolEvents;
