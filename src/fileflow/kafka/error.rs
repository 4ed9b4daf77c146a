//! Sink error classification
//!
//! The retry loop only needs one bit from the broker client: is this failure
//! worth retrying. Everything else about the wire protocol stays opaque.

use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::error::Error;
use std::fmt;

/// Outcome class of a single sink send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Expected to succeed if retried: network blip, timeout, queue pressure
    Transient(String),
    /// Retrying cannot help: oversized message, auth failure, bad topic
    Permanent(String),
}

impl SinkError {
    pub fn reason(&self) -> &str {
        match self {
            SinkError::Transient(r) | SinkError::Permanent(r) => r,
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Transient(r) => write!(f, "transient sink failure: {}", r),
            SinkError::Permanent(r) => write!(f, "permanent sink failure: {}", r),
        }
    }
}

impl Error for SinkError {}

/// Classify a Kafka client error as transient or permanent.
///
/// Unknown codes are treated as transient; the bounded retry loop caps the
/// damage either way.
pub fn classify(err: &KafkaError) -> SinkError {
    let reason = err.to_string();
    match err.rdkafka_error_code() {
        Some(code) => match code {
            RDKafkaErrorCode::MessageSizeTooLarge
            | RDKafkaErrorCode::InvalidMessage
            | RDKafkaErrorCode::InvalidMessageSize
            | RDKafkaErrorCode::UnknownTopic
            | RDKafkaErrorCode::UnknownTopicOrPartition
            | RDKafkaErrorCode::TopicAuthorizationFailed
            | RDKafkaErrorCode::ClusterAuthorizationFailed
            | RDKafkaErrorCode::SaslAuthenticationFailed
            | RDKafkaErrorCode::PolicyViolation
            | RDKafkaErrorCode::MessageBatchTooLarge => SinkError::Permanent(reason),

            RDKafkaErrorCode::BrokerNotAvailable
            | RDKafkaErrorCode::NetworkException
            | RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::QueueFull
            | RDKafkaErrorCode::MessageTimedOut
            | RDKafkaErrorCode::RequestTimedOut
            | RDKafkaErrorCode::OperationTimedOut
            | RDKafkaErrorCode::LeaderNotAvailable
            | RDKafkaErrorCode::NotLeaderForPartition
            | RDKafkaErrorCode::NotEnoughReplicas
            | RDKafkaErrorCode::NotEnoughReplicasAfterAppend => SinkError::Transient(reason),

            _ => SinkError::Transient(reason),
        },
        None => SinkError::Transient(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_rejection_is_permanent() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge);
        assert!(matches!(classify(&err), SinkError::Permanent(_)));
    }

    #[test]
    fn test_broker_outage_is_transient() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::AllBrokersDown);
        assert!(matches!(classify(&err), SinkError::Transient(_)));
    }

    #[test]
    fn test_unknown_code_defaults_to_transient() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::Fail);
        assert!(matches!(classify(&err), SinkError::Transient(_)));
    }
}
