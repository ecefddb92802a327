//! Entity lifecycle messages and the bus they are published on.
//!
//! Messages are emitted only after a transaction has been committed; a
//! rejected transaction publishes nothing.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod message;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use message::{EntityAction, EntityMessage};
