//! 下单消息（eventing）
//!
//! 下单请求可以不在调用方同步执行，而是发布到 `order-create` 主题，
//! 由消费者异步落单。消息以用户为分区键，同一用户的请求在同一分区内保持顺序。
//!
mod producer;
mod producer_inmemory;

pub use producer::{ORDER_CREATE_TOPIC, OrderProducer, OrderSubscriber, QueueRecord};
pub use producer_inmemory::InMemoryOrderProducer;
