pub mod amqp;
pub mod error;
pub mod traits;

pub use amqp::AmqpBus;
pub use error::{BusError, BusResult};
pub use traits::{Delivery, MessageBus, NackAction};
