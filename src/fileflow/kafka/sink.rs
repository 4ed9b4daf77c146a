//! Record sink abstraction and the Kafka-backed implementation
//!
//! The publisher retries over this seam, so tests can swap in a scripted
//! fake without a broker. The Kafka sink wraps an rdkafka `FutureProducer`
//! and awaits per-record delivery confirmation.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;

use super::error::{classify, SinkError};

const SEND_WAIT: Duration = Duration::from_secs(30);

/// One-shot record delivery with confirmation.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Send one record and wait for the broker's ack or failure.
    async fn send(&self, key: Option<&str>, payload: &[u8]) -> Result<(), SinkError>;

    /// Flush any buffered records.
    fn flush(&self, timeout: Duration) -> Result<(), SinkError>;
}

/// Kafka-backed sink publishing to a single topic.
pub struct KafkaRecordSink {
    producer: FutureProducer,
    topic: String,
}

impl std::fmt::Debug for KafkaRecordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaRecordSink")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl KafkaRecordSink {
    /// Create a producer connected to `brokers` publishing to `topic`.
    ///
    /// Fails fast on an empty topic name: a misconfigured topic would
    /// otherwise surface only as per-record failures deep into a scan pass.
    pub fn new(brokers: &str, topic: &str, client_id: &str) -> Result<Self, SinkError> {
        if topic.is_empty() {
            return Err(SinkError::Permanent(
                "topic name is empty; set KAFKA_TOPIC or [kafka] topic".to_string(),
            ));
        }
        if brokers.is_empty() {
            return Err(SinkError::Permanent(
                "broker address is empty; set KAFKA_BROKER or [kafka] broker".to_string(),
            ));
        }

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", client_id)
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| classify(&e))?;

        log::info!(
            "created Kafka producer for topic '{}' on broker(s) '{}' (client.id={})",
            topic,
            brokers,
            client_id
        );

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl RecordSink for KafkaRecordSink {
    async fn send(&self, key: Option<&str>, payload: &[u8]) -> Result<(), SinkError> {
        let mut record = FutureRecord::to(&self.topic).payload(payload);
        if let Some(k) = key {
            record = record.key(k);
        }

        match self.producer.send(record, Timeout::After(SEND_WAIT)).await {
            Ok(delivery) => {
                log::debug!(
                    "delivered record to topic '{}' partition={} offset={}",
                    self.topic,
                    delivery.0,
                    delivery.1
                );
                Ok(())
            }
            Err((err, _)) => Err(classify(&err)),
        }
    }

    fn flush(&self, timeout: Duration) -> Result<(), SinkError> {
        self.producer
            .flush(Timeout::After(timeout))
            .map_err(|e| classify(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_topic_rejected() {
        let err = KafkaRecordSink::new("localhost:9092", "", "test").unwrap_err();
        assert!(matches!(err, SinkError::Permanent(_)));
    }

    #[test]
    fn test_empty_broker_rejected() {
        let err = KafkaRecordSink::new("", "orders", "test").unwrap_err();
        assert!(matches!(err, SinkError::Permanent(_)));
    }
}
