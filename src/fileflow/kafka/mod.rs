//! Broker publishing: sink abstraction, Kafka implementation, bounded retry

pub mod error;
pub mod publisher;
pub mod sink;

pub use error::SinkError;
pub use publisher::{BrokerPublisher, PublishOutcome, RetryPolicy};
pub use sink::{KafkaRecordSink, RecordSink};
