pub mod broker;
pub mod store;

pub use broker::{CheckBroker, CheckEnvelope, InflightRegistry};
pub use store::{CheckQueue, QueueError};
