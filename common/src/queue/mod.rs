// Queue plumbing for storage events

pub mod consumer;
pub mod nats;

pub use consumer::EventConsumer;
pub use nats::NatsClient;
