mod amqp;
mod cloud;
mod memory;

pub use amqp::AmqpQueue;
pub use cloud::CloudQueue;
pub use memory::MemoryQueue;
